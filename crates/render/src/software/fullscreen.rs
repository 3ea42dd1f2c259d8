//! Per-texel kernels for [`FullscreenPass`](crate::FullscreenPass) programs.

use afterglow_common::{Color, refract};
use glam::{Vec2, Vec3, Vec4};

use crate::image::ImageBuffer;
use crate::pass::CausticsUniforms;

/// Quad of sample offsets around each texel, in units of the sample radius.
const CAUSTIC_OFFSETS: [Vec2; 4] = [
    Vec2::new(-0.5, -0.5),
    Vec2::new(-0.5, 0.5),
    Vec2::new(0.5, 0.5),
    Vec2::new(0.5, -0.5),
];

/// Distance the refracted ray is pushed off the surface before tracing.
const REFRACT_OFFSET: f32 = 0.1;

fn world_from_depth(u: &CausticsUniforms, depth: f32, uv: Vec2) -> Vec3 {
    let clip = Vec4::new(uv.x * 2.0 - 1.0, uv.y * 2.0 - 1.0, depth * 2.0 - 1.0, 1.0);
    let view = u.projection_inverse * clip;
    let view = view / view.w;
    (u.camera_world * view).truncate()
}

fn quad_area(p: &[Vec3; 4]) -> f32 {
    (p[1] - p[0]).cross(p[2] - p[0]).length() + (p[2] - p[0]).cross(p[3] - p[0]).length()
}

/// Ratio of the area a texel's footprint covers at the light to the area it
/// covers on the receiver after refraction, scaled by intensity.
fn caustic_at(normals: &ImageBuffer, u: &CausticsUniforms, uv: Vec2, sample_radius: f32) -> f32 {
    if normals.sample_depth(uv) >= 1.0 {
        return 0.0;
    }
    let mut origins = [Vec3::ZERO; 4];
    let mut landed = [Vec3::ZERO; 4];
    for (i, offset) in CAUSTIC_OFFSETS.iter().enumerate() {
        let suv = uv + *offset * sample_radius;
        let depth = normals.sample_depth(suv);
        if depth >= 1.0 {
            return 0.0;
        }
        let normal = (normals.sample_bilinear(suv).rgb_vec3() * 2.0 - Vec3::ONE).normalize_or_zero();
        let surface = world_from_depth(u, depth, suv);
        origins[i] = world_from_depth(u, 0.0, suv);

        let dir = refract(u.light_dir, normal, 1.0 / u.ior);
        let start = surface + dir * REFRACT_OFFSET;
        let t = u.receiver.intersect_ray(start, dir);
        landed[i] = start + dir * t;
    }
    let caustic = u.intensity * (quad_area(&origins) / quad_area(&landed));
    if caustic.is_finite() { caustic.max(0.0) } else { 0.0 }
}

pub(crate) fn caustics(out: &mut ImageBuffer, normals: &ImageBuffer, u: &CausticsUniforms) {
    let texel_size = (1.0 / u.resolution) * u.size * 2.0;
    let sample_radius = (u.world_radius / texel_size) / u.resolution;
    for y in 0..out.height() {
        for x in 0..out.width() {
            let uv = out.texel_center_uv(x, y);
            let c = caustic_at(normals, u, uv, sample_radius);
            out.set_texel(x, y, Color::rgba(c, c, c, 1.0));
        }
    }
}

fn covered(c: Color) -> bool {
    c.r >= 0.5
}

/// Seeds carry their own uv in `rg`; `a == 1` marks a seed.
pub(crate) fn jump_flood_seed(out: &mut ImageBuffer, mask: &ImageBuffer, seed_covered: bool) {
    for y in 0..out.height() {
        for x in 0..out.width() {
            let uv = out.texel_center_uv(x, y);
            let seed = covered(mask.sample_nearest(uv)) == seed_covered;
            let c = if seed {
                Color::rgba(uv.x, uv.y, 0.0, 1.0)
            } else {
                Color::TRANSPARENT
            };
            out.set_texel(x, y, c);
        }
    }
}

fn seed_position(c: Color, w: f32, h: f32) -> Option<Vec2> {
    (c.a >= 0.5).then(|| Vec2::new(c.r * w, c.g * h))
}

/// One jump-flood round: each texel keeps the nearest seed among its 3x3
/// neighbours spaced `offset` texels apart.
pub(crate) fn jump_flood_step(out: &mut ImageBuffer, source: &ImageBuffer, offset: u32) {
    let (w, h) = (source.width() as i64, source.height() as i64);
    let (wf, hf) = (w as f32, h as f32);
    let step = offset as i64;
    for y in 0..out.height() {
        for x in 0..out.width() {
            let here = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let mut best: Option<(f32, Color)> = None;
            for dy in -1..=1i64 {
                for dx in -1..=1i64 {
                    let (sx, sy) = (x as i64 + dx * step, y as i64 + dy * step);
                    if sx < 0 || sy < 0 || sx >= w || sy >= h {
                        continue;
                    }
                    let c = source.texel(sx as u32, sy as u32);
                    let Some(seed) = seed_position(c, wf, hf) else {
                        continue;
                    };
                    let d = seed.distance_squared(here);
                    if best.is_none_or(|(bd, _)| d < bd) {
                        best = Some((d, c));
                    }
                }
            }
            out.set_texel(x, y, best.map_or(Color::TRANSPARENT, |(_, c)| c));
        }
    }
}

/// Texel-space distance to the stored seed. Texels no seed reached get the
/// image diagonal.
pub(crate) fn distance_field(out: &mut ImageBuffer, source: &ImageBuffer) {
    let (w, h) = (source.width() as f32, source.height() as f32);
    let unreached = w.hypot(h);
    for y in 0..out.height() {
        for x in 0..out.width() {
            let here = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let d = seed_position(source.texel(x, y), w, h).map_or(unreached, |s| s.distance(here));
            out.set_texel(x, y, Color::rgba(d, 0.0, 0.0, 1.0));
        }
    }
}

pub(crate) fn sdf_composite(
    out: &mut ImageBuffer,
    mask: &ImageBuffer,
    inside: &ImageBuffer,
    outside: &ImageBuffer,
) {
    for y in 0..out.height() {
        for x in 0..out.width() {
            let d = if covered(mask.texel(x, y)) {
                -inside.texel(x, y).r
            } else {
                outside.texel(x, y).r
            };
            out.set_texel(x, y, Color::rgba(d, 0.0, 0.0, 1.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Full jump flood over `mask` with the given seed side.
    fn flood(mask: &ImageBuffer, seed_covered: bool) -> ImageBuffer {
        let (w, h) = mask.size();
        let mut a = ImageBuffer::new(w, h, Color::TRANSPARENT);
        let mut b = a.clone();
        jump_flood_seed(&mut a, mask, seed_covered);
        let passes = (w.max(h) as f32).log2().ceil() as u32;
        for i in 0..passes {
            jump_flood_step(&mut b, &a, 1 << (passes - i - 1));
            std::mem::swap(&mut a, &mut b);
        }
        let mut dist = ImageBuffer::new(w, h, Color::TRANSPARENT);
        distance_field(&mut dist, &a);
        dist
    }

    fn single_texel_mask(size: u32, x: u32, y: u32) -> ImageBuffer {
        let mut mask = ImageBuffer::new(size, size, Color::BLACK);
        mask.set_texel(x, y, Color::WHITE);
        mask
    }

    #[test]
    fn jump_flood_finds_single_seed() {
        let mask = single_texel_mask(8, 2, 5);
        let dist = flood(&mask, true);
        for y in 0..8 {
            for x in 0..8 {
                let exact = Vec2::new(x as f32 - 2.0, y as f32 - 5.0).length();
                assert!(
                    (dist.texel(x, y).r - exact).abs() < 1e-3,
                    "texel ({x}, {y}) got {} want {exact}",
                    dist.texel(x, y).r
                );
            }
        }
    }

    #[test]
    fn missing_seeds_give_diagonal() {
        let mask = ImageBuffer::new(4, 3, Color::BLACK);
        let dist = flood(&mask, true);
        assert!(dist.pixels().iter().all(|c| (c.r - 5.0).abs() < 1e-6));
    }

    #[test]
    fn composite_signs_inside_negative() {
        let mut mask = ImageBuffer::new(8, 8, Color::BLACK);
        for y in 2..6 {
            for x in 2..6 {
                mask.set_texel(x, y, Color::WHITE);
            }
        }
        let outside = flood(&mask, true);
        let inside = flood(&mask, false);
        let mut sdf = ImageBuffer::new(8, 8, Color::TRANSPARENT);
        sdf_composite(&mut sdf, &mask, &inside, &outside);
        assert_eq!(sdf.texel(0, 4).r, 2.0);
        assert_eq!(sdf.texel(2, 4).r, -1.0);
        assert_eq!(sdf.texel(3, 4).r, -2.0);
        let min = sdf.pixels().iter().map(|c| c.r).fold(f32::INFINITY, f32::min);
        assert_eq!(min, -2.0);
    }
}
