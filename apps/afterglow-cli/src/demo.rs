use std::sync::Arc;

use afterglow_common::{Color, Transform};
use afterglow_scene::{Geometry, Light, Material, Scene};
use clap::ValueEnum;
use glam::Vec3;

/// Objects standing on the ground for shadow baking. The shadow catcher is
/// added by the baker.
pub fn shadow_scene() -> Scene {
    let mut scene = Scene::new();
    let clay = scene.add_material(Material::Lambert {
        color: Color::from_hex(0xd8c8b0),
    });
    scene.add_mesh(
        "sphere",
        Arc::new(Geometry::uv_sphere(0.75, 32, 16)),
        clay,
        Transform::from_position(Vec3::new(-1.0, 0.75, 0.0)),
    );
    scene.add_mesh(
        "crate",
        Arc::new(Geometry::cuboid(Vec3::new(1.0, 1.5, 1.0))),
        clay,
        Transform::from_position(Vec3::new(1.25, 0.75, -0.5)),
    );
    scene.add_light(
        "key",
        Light::directional(Vec3::ZERO, 1.0),
        Transform::from_position(Vec3::new(3.0, 6.0, 2.0)),
    );
    scene.add_light("fill", Light::ambient(0.3), Transform::default());
    scene
}

/// A glass ball hovering above the ground.
pub fn caustics_scene() -> Scene {
    let mut scene = Scene::new();
    let glass = scene.add_material(Material::Lambert {
        color: Color::rgba(0.9, 0.95, 1.0, 0.3),
    });
    scene.add_mesh(
        "lens",
        Arc::new(Geometry::uv_sphere(1.0, 48, 24)),
        glass,
        Transform::from_position(Vec3::new(0.0, 1.5, 0.0)),
    );
    scene
}

/// Portal outlines available from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PortalShape {
    #[default]
    Disc,
    Square,
}

impl PortalShape {
    pub fn geometry(self) -> Geometry {
        match self {
            Self::Disc => Geometry::circle(1.0, 64),
            Self::Square => Geometry::quad(2.0, 2.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scenes_have_visible_bounds() {
        let bounds = shadow_scene().bounding_box();
        assert!(!bounds.is_empty());
        assert!(bounds.min.y.abs() < 1e-5);

        let lens = caustics_scene().bounding_box();
        assert!((lens.center() - Vec3::new(0.0, 1.5, 0.0)).length() < 1e-4);
    }

    #[test]
    fn portal_shapes_face_the_camera() {
        for shape in [PortalShape::Disc, PortalShape::Square] {
            let g = shape.geometry();
            assert!(g.normals.iter().all(|n| *n == Vec3::Z));
        }
    }
}
