//! Half-space triangle rasterizer.

use glam::{Vec2, Vec3, Vec4};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RasterVertex {
    pub clip: Vec4,
    pub world: Vec3,
    pub normal: Vec3,
}

/// One covered texel with perspective-correct varyings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fragment {
    pub x: u32,
    pub y: u32,
    /// Window depth in [0, 1].
    pub depth: f32,
    pub world: Vec3,
    pub normal: Vec3,
    pub front_facing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cull {
    None,
    Back,
    Front,
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Rasterize one triangle into a `width` x `height` grid, sampling at texel
/// centers. Triangles with a vertex behind the eye are dropped.
pub(crate) fn rasterize(
    width: u32,
    height: u32,
    tri: &[RasterVertex; 3],
    cull: Cull,
    mut emit: impl FnMut(&Fragment),
) {
    if tri.iter().any(|v| v.clip.w <= f32::EPSILON) {
        return;
    }
    let screen = tri.map(|v| {
        let ndc = v.clip.truncate() / v.clip.w;
        Vec3::new(
            (ndc.x * 0.5 + 0.5) * width as f32,
            (ndc.y * 0.5 + 0.5) * height as f32,
            ndc.z,
        )
    });
    let [s0, s1, s2] = screen.map(|s| s.truncate());
    let area = edge(s0, s1, s2);
    if area.abs() < 1e-12 || !area.is_finite() {
        return;
    }
    let front_facing = area > 0.0;
    match cull {
        Cull::Back if !front_facing => return,
        Cull::Front if front_facing => return,
        _ => {}
    }

    let min = s0.min(s1).min(s2);
    let max = s0.max(s1).max(s2);
    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = max.x.ceil().min(width as f32).max(0.0) as u32;
    let y1 = max.y.ceil().min(height as f32).max(0.0) as u32;

    let inv_w = tri.map(|v| 1.0 / v.clip.w);
    for y in y0..y1 {
        for x in x0..x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let b = [
                edge(s1, s2, p) / area,
                edge(s2, s0, p) / area,
                edge(s0, s1, p) / area,
            ];
            if b.iter().any(|w| *w < 0.0) {
                continue;
            }
            let z = b[0] * screen[0].z + b[1] * screen[1].z + b[2] * screen[2].z;
            if !(-1.0..=1.0).contains(&z) {
                continue;
            }
            let pw = [b[0] * inv_w[0], b[1] * inv_w[1], b[2] * inv_w[2]];
            let sum = pw[0] + pw[1] + pw[2];
            let pw = pw.map(|w| w / sum);
            emit(&Fragment {
                x,
                y,
                depth: z * 0.5 + 0.5,
                world: tri[0].world * pw[0] + tri[1].world * pw[1] + tri[2].world * pw[2],
                normal: tri[0].normal * pw[0] + tri[1].normal * pw[1] + tri[2].normal * pw[2],
                front_facing,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32) -> RasterVertex {
        RasterVertex {
            clip: Vec4::new(x, y, 0.0, 1.0),
            world: Vec3::new(x, y, 0.0),
            normal: Vec3::Z,
        }
    }

    #[test]
    fn full_screen_quad_covers_every_texel_once() {
        let (a, b, c, d) = (
            vertex(-1.0, -1.0),
            vertex(1.0, -1.0),
            vertex(1.0, 1.0),
            vertex(-1.0, 1.0),
        );
        let mut hits = vec![0u32; 16];
        for tri in [[a, b, c], [a, c, d]] {
            rasterize(4, 4, &tri, Cull::Back, |f| {
                assert!(f.front_facing);
                assert_eq!(f.depth, 0.5);
                hits[(f.y * 4 + f.x) as usize] += 1;
            });
        }
        // Texel centers on the shared diagonal are claimed by both triangles.
        assert!(hits.iter().all(|h| *h >= 1));
        assert_eq!(hits.iter().filter(|h| **h == 2).count(), 4);
    }

    #[test]
    fn culling_follows_winding() {
        let tri = [vertex(-1.0, -1.0), vertex(1.0, 1.0), vertex(1.0, -1.0)];
        let mut count = 0;
        rasterize(4, 4, &tri, Cull::Back, |_| count += 1);
        assert_eq!(count, 0);
        rasterize(4, 4, &tri, Cull::Front, |f| {
            assert!(!f.front_facing);
            count += 1;
        });
        assert!(count > 0);
    }

    #[test]
    fn varyings_interpolate_at_texel_centers() {
        let tri = [vertex(-1.0, -1.0), vertex(1.0, -1.0), vertex(-1.0, 1.0)];
        rasterize(2, 2, &tri, Cull::None, |f| {
            let expected = Vec2::new(f.x as f32 + 0.5, f.y as f32 + 0.5) - Vec2::ONE;
            assert!((f.world.truncate() - expected).length() < 1e-5);
        });
    }

    #[test]
    fn vertex_behind_eye_drops_triangle() {
        let mut tri = [vertex(-1.0, -1.0), vertex(1.0, -1.0), vertex(1.0, 1.0)];
        tri[1].clip.w = -1.0;
        let mut count = 0;
        rasterize(4, 4, &tri, Cull::None, |_| count += 1);
        assert_eq!(count, 0);
    }
}
