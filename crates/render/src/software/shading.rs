//! Lambert lighting with ray-traced shadows.

use afterglow_common::Aabb;
use afterglow_scene::{LightKind, Scene};
use glam::Vec3;

#[derive(Debug, Clone, Copy)]
enum Emitter {
    /// Unit vector toward the light.
    Directional(Vec3),
    Point(Vec3),
    Ambient,
}

#[derive(Debug, Clone, Copy)]
struct LightSample {
    emitter: Emitter,
    radiance: Vec3,
    cast_shadow: bool,
}

#[derive(Debug)]
struct Occluder {
    bounds: Aabb,
    triangles: Vec<[Vec3; 3]>,
}

/// Lights and shadow casters gathered once per pass.
#[derive(Debug)]
pub(crate) struct Lighting {
    lights: Vec<LightSample>,
    occluders: Vec<Occluder>,
    bias: f32,
}

impl Lighting {
    /// Collect visible lights and every visible shadow-casting mesh. A mesh's
    /// color material does not matter here; discarded meshes still occlude.
    pub(crate) fn gather(scene: &Scene, bias: f32) -> Self {
        let lights = scene
            .lights()
            .filter(|(_, obj, light)| obj.visible && light.intensity != 0.0)
            .map(|(_, obj, light)| {
                let emitter = match light.kind {
                    LightKind::Directional { target } => Emitter::Directional(
                        (obj.transform.position - target).normalize_or(Vec3::Y),
                    ),
                    LightKind::Point => Emitter::Point(obj.transform.position),
                    LightKind::Ambient => Emitter::Ambient,
                };
                LightSample {
                    emitter,
                    radiance: light.color.rgb_vec3() * light.intensity,
                    cast_shadow: light.cast_shadow,
                }
            })
            .collect();

        let occluders = scene
            .meshes()
            .filter(|(_, obj, mesh)| obj.visible && mesh.cast_shadow)
            .map(|(_, obj, mesh)| {
                let m = obj.transform.matrix();
                let world: Vec<Vec3> = mesh
                    .geometry
                    .positions
                    .iter()
                    .map(|p| m.transform_point3(*p))
                    .collect();
                Occluder {
                    bounds: Aabb::from_points(world.iter().copied()),
                    triangles: mesh
                        .geometry
                        .triangles()
                        .filter_map(|[a, b, c]| Some([*world.get(a)?, *world.get(b)?, *world.get(c)?]))
                        .collect(),
                }
            })
            .collect();

        Self {
            lights,
            occluders,
            bias,
        }
    }

    /// Diffuse irradiance arriving at `p` with unit normal `n`.
    pub(crate) fn irradiance(&self, p: Vec3, n: Vec3, receive_shadow: bool) -> Vec3 {
        let mut total = Vec3::ZERO;
        for light in &self.lights {
            let (to_light, distance, falloff) = match light.emitter {
                Emitter::Ambient => {
                    total += light.radiance;
                    continue;
                }
                Emitter::Directional(dir) => (dir, f32::INFINITY, 1.0),
                Emitter::Point(pos) => {
                    let d = pos - p;
                    let dist = d.length();
                    if dist <= f32::EPSILON {
                        continue;
                    }
                    (d / dist, dist, 1.0 / (dist * dist))
                }
            };
            let ndl = n.dot(to_light);
            if ndl <= 0.0 {
                continue;
            }
            if receive_shadow && light.cast_shadow && self.occluded(p + n * self.bias, to_light, distance)
            {
                continue;
            }
            total += light.radiance * ndl * falloff;
        }
        total
    }

    fn occluded(&self, origin: Vec3, dir: Vec3, t_max: f32) -> bool {
        let inv_dir = dir.recip();
        self.occluders.iter().any(|o| {
            o.bounds.hit(origin, inv_dir, t_max)
                && o
                    .triangles
                    .iter()
                    .any(|tri| ray_triangle(origin, dir, tri).is_some_and(|t| t < t_max))
        })
    }
}

/// Möller-Trumbore intersection, both faces.
pub(crate) fn ray_triangle(origin: Vec3, dir: Vec3, tri: &[Vec3; 3]) -> Option<f32> {
    const EPS: f32 = 1e-7;
    let e1 = tri[1] - tri[0];
    let e2 = tri[2] - tri[0];
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - tri[0];
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t > 1e-5).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_common::Transform;
    use afterglow_scene::{Geometry, Light, Material};
    use std::sync::Arc;

    fn scene_with_blocker(blocker_material_discard: bool) -> Scene {
        let mut scene = Scene::new();
        let white = scene.add_material(Material::default());
        let blocker_mat = if blocker_material_discard {
            scene.discard_material()
        } else {
            white
        };
        scene.add_mesh(
            "blocker",
            Arc::new(Geometry::cuboid(Vec3::ONE)),
            blocker_mat,
            Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
        );
        scene.add_light(
            "sun",
            Light::directional(Vec3::ZERO, 1.0),
            Transform::from_position(Vec3::new(0.0, 10.0, 0.0)),
        );
        scene
    }

    #[test]
    fn ray_hits_triangle_from_either_side() {
        let tri = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let t = ray_triangle(Vec3::new(0.2, 0.2, 1.0), Vec3::NEG_Z, &tri);
        assert!((t.unwrap() - 1.0).abs() < 1e-6);
        assert!(ray_triangle(Vec3::new(0.2, 0.2, -1.0), Vec3::Z, &tri).is_some());
        assert!(ray_triangle(Vec3::new(0.9, 0.9, 1.0), Vec3::NEG_Z, &tri).is_none());
    }

    #[test]
    fn blocker_casts_shadow_even_when_discarded() {
        for discard in [false, true] {
            let lighting = Lighting::gather(&scene_with_blocker(discard), 1e-3);
            let shadowed = lighting.irradiance(Vec3::ZERO, Vec3::Y, true);
            let lit = lighting.irradiance(Vec3::new(3.0, 0.0, 0.0), Vec3::Y, true);
            assert_eq!(shadowed, Vec3::ZERO);
            assert!((lit - Vec3::ONE).length() < 1e-6);
            // Receivers that ignore shadows see the light.
            assert!(lighting.irradiance(Vec3::ZERO, Vec3::Y, false).x > 0.99);
        }
    }

    #[test]
    fn ambient_and_point_contributions() {
        let mut scene = Scene::new();
        scene.add_light("fill", Light::ambient(0.25), Transform::default());
        scene.add_light(
            "bulb",
            Light::point(4.0),
            Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
        );
        let lighting = Lighting::gather(&scene, 1e-3);
        let e = lighting.irradiance(Vec3::ZERO, Vec3::Y, true);
        // 0.25 ambient + 4 / 2^2.
        assert!((e.x - 1.25).abs() < 1e-5);
        // Facing away: ambient only.
        let away = lighting.irradiance(Vec3::ZERO, Vec3::NEG_Y, true);
        assert!((away.x - 0.25).abs() < 1e-6);
    }
}
