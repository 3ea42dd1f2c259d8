use afterglow_common::{Aabb, Transform};
use glam::{Vec2, Vec3};
use std::f32::consts::PI;

/// Indexed triangle mesh data. Front faces wind counter-clockwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Horizontal plane in XZ facing +Y, centered at the origin.
    ///
    /// UVs follow a rotated XY plane: `u` grows along +X, `v` along -Z.
    pub fn plane(width: f32, depth: f32) -> Self {
        let (hw, hd) = (width * 0.5, depth * 0.5);
        Self {
            positions: vec![
                Vec3::new(-hw, 0.0, -hd),
                Vec3::new(hw, 0.0, -hd),
                Vec3::new(hw, 0.0, hd),
                Vec3::new(-hw, 0.0, hd),
            ],
            normals: vec![Vec3::Y; 4],
            uvs: vec![
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ],
            indices: vec![3, 2, 1, 3, 1, 0],
        }
    }

    /// Vertical quad in XY facing +Z, centered at the origin.
    pub fn quad(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self {
            positions: vec![
                Vec3::new(-hw, -hh, 0.0),
                Vec3::new(hw, -hh, 0.0),
                Vec3::new(hw, hh, 0.0),
                Vec3::new(-hw, hh, 0.0),
            ],
            normals: vec![Vec3::Z; 4],
            uvs: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Disc in XY facing +Z.
    pub fn circle(radius: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let mut g = Self {
            positions: vec![Vec3::ZERO],
            normals: vec![Vec3::Z],
            uvs: vec![Vec2::splat(0.5)],
            indices: Vec::new(),
        };
        for i in 0..=segments {
            let theta = 2.0 * PI * i as f32 / segments as f32;
            let (s, c) = theta.sin_cos();
            g.positions.push(Vec3::new(c * radius, s * radius, 0.0));
            g.normals.push(Vec3::Z);
            g.uvs.push(Vec2::new(c * 0.5 + 0.5, s * 0.5 + 0.5));
        }
        for i in 1..=segments {
            g.indices.extend_from_slice(&[0, i, i + 1]);
        }
        g
    }

    /// Axis-aligned box centered at the origin with one quad per face.
    pub fn cuboid(size: Vec3) -> Self {
        let half = size * 0.5;
        // (normal, u, v) with u x v == normal so each face winds outward.
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        let mut g = Self::default();
        for (normal, u, v) in faces {
            let center = normal * normal.abs().dot(half);
            let du = u * u.abs().dot(half);
            let dv = v * v.abs().dot(half);
            let base = g.positions.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                g.positions.push(center + du * su + dv * sv);
                g.normals.push(normal);
                g.uvs.push(Vec2::new((su + 1.0) * 0.5, (sv + 1.0) * 0.5));
            }
            g.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        g
    }

    /// Latitude/longitude sphere. `rings` splits the polar angle, `segments` the azimuth.
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut g = Self::default();
        let mut grid = Vec::with_capacity(rings as usize + 1);
        for iy in 0..=rings {
            let v = iy as f32 / rings as f32;
            let theta = v * PI;
            let mut row = Vec::with_capacity(segments as usize + 1);
            for ix in 0..=segments {
                let u = ix as f32 / segments as f32;
                let phi = u * 2.0 * PI;
                let dir = Vec3::new(
                    -phi.cos() * theta.sin(),
                    theta.cos(),
                    phi.sin() * theta.sin(),
                );
                row.push(g.positions.len() as u32);
                g.positions.push(dir * radius);
                g.normals.push(dir.normalize_or_zero());
                g.uvs.push(Vec2::new(u, 1.0 - v));
            }
            grid.push(row);
        }
        for iy in 0..rings as usize {
            for ix in 0..segments as usize {
                let a = grid[iy][ix + 1];
                let b = grid[iy][ix];
                let c = grid[iy + 1][ix];
                let d = grid[iy + 1][ix + 1];
                if iy != 0 {
                    g.indices.extend_from_slice(&[a, b, d]);
                }
                if iy != rings as usize - 1 {
                    g.indices.extend_from_slice(&[b, c, d]);
                }
            }
        }
        g
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }

    /// Local-space bounds.
    pub fn bounding_box(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().copied())
    }

    /// Exact world-space bounds of the transformed vertices.
    pub fn world_bounds(&self, transform: &Transform) -> Aabb {
        let m = transform.matrix();
        Aabb::from_points(self.positions.iter().map(|p| m.transform_point3(*p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(g: &Geometry, tri: [usize; 3]) -> Vec3 {
        let [a, b, c] = tri.map(|i| g.positions[i]);
        (b - a).cross(c - a).normalize()
    }

    fn assert_outward(g: &Geometry) {
        for tri in g.triangles() {
            let n = face_normal(g, tri);
            let avg = (g.normals[tri[0]] + g.normals[tri[1]] + g.normals[tri[2]]).normalize();
            assert!(n.dot(avg) > 0.0, "triangle {tri:?} winds inward");
        }
    }

    #[test]
    fn plane_faces_up() {
        let g = Geometry::plane(2.0, 2.0);
        assert_eq!(g.triangle_count(), 2);
        assert_outward(&g);
        let b = g.bounding_box();
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, -1.0));
        assert_eq!(b.max, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn quad_and_circle_face_forward() {
        assert_outward(&Geometry::quad(1.0, 2.0));
        let disc = Geometry::circle(1.0, 16);
        assert_eq!(disc.triangle_count(), 16);
        assert_outward(&disc);
    }

    #[test]
    fn cuboid_winds_outward() {
        let g = Geometry::cuboid(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(g.triangle_count(), 12);
        assert_outward(&g);
        assert_eq!(g.bounding_box().size(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn sphere_winds_outward() {
        let g = Geometry::uv_sphere(1.0, 12, 8);
        assert_outward(&g);
        for p in &g.positions {
            assert!((p.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn world_bounds_apply_transform() {
        let g = Geometry::cuboid(Vec3::ONE);
        let t = Transform::from_position(Vec3::new(0.0, 3.0, 0.0));
        let b = g.world_bounds(&t);
        assert_eq!(b.center(), Vec3::new(0.0, 3.0, 0.0));
    }
}
