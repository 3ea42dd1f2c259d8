use afterglow_common::{Color, Transform};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::geometry::Geometry;

/// A handle referencing a material registered in a [`crate::Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialHandle(pub u64);

/// Surface programs a mesh can be drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Material {
    /// Diffuse surface lit by the scene's lights.
    Lambert { color: Color },
    /// Flat color, ignores lighting.
    Unlit { color: Color },
    /// Writes no color and no depth. Geometry still occludes light.
    Discard,
}

impl Default for Material {
    fn default() -> Self {
        Self::Lambert {
            color: Color::WHITE,
        }
    }
}

/// Whether a light belongs to the regular scene lighting or to an accumulation rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LightRole {
    /// Regular scene lighting; silenced while shadows are being captured.
    #[default]
    Display,
    /// Light that exists to be accumulated; never touched by the capture swap.
    Bake,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Parallel light travelling from the object's position toward `target`.
    Directional { target: Vec3 },
    /// Omnidirectional light at the object's position, inverse-square falloff.
    Point,
    /// Uniform, unshadowed fill light.
    Ambient,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub cast_shadow: bool,
    pub role: LightRole,
}

impl Light {
    pub fn directional(target: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional { target },
            color: Color::WHITE,
            intensity,
            cast_shadow: true,
            role: LightRole::Display,
        }
    }

    pub fn point(intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            color: Color::WHITE,
            intensity,
            cast_shadow: true,
            role: LightRole::Display,
        }
    }

    pub fn ambient(intensity: f32) -> Self {
        Self {
            kind: LightKind::Ambient,
            color: Color::WHITE,
            intensity,
            cast_shadow: false,
            role: LightRole::Display,
        }
    }

    pub fn with_role(mut self, role: LightRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: Arc<Geometry>,
    pub material: MaterialHandle,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(geometry: Arc<Geometry>, material: MaterialHandle) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: true,
            receive_shadow: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Mesh(Mesh),
    Light(Light),
}

/// One node of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub kind: ObjectKind,
}

impl SceneObject {
    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            ObjectKind::Mesh(m) => Some(m),
            ObjectKind::Light(_) => None,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            ObjectKind::Light(l) => Some(l),
            ObjectKind::Mesh(_) => None,
        }
    }

    /// Unit vector from a surface point toward a directional light.
    pub fn direction_to_light(&self) -> Option<Vec3> {
        match self.as_light()?.kind {
            LightKind::Directional { target } => {
                Some((self.transform.position - target).normalize_or_zero())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_light_points_back_toward_source() {
        let obj = SceneObject {
            name: "sun".into(),
            transform: Transform::from_position(Vec3::new(0.0, 10.0, 0.0)),
            visible: true,
            kind: ObjectKind::Light(Light::directional(Vec3::ZERO, 1.0)),
        };
        assert_eq!(obj.direction_to_light(), Some(Vec3::Y));
        assert!(obj.as_mesh().is_none());
    }

    #[test]
    fn light_builders() {
        let l = Light::point(2.0).with_role(LightRole::Bake);
        assert_eq!(l.role, LightRole::Bake);
        assert!(!Light::ambient(0.5).cast_shadow);
    }
}
