use afterglow_common::Color;
use afterglow_render::ImageBuffer;
use serde::{Deserialize, Serialize};

/// Display program for an accumulated shadow map.
///
/// Bright texels (fully lit) fade out, dark ones keep `opacity`:
/// `rgb = color * r * blend`, `a = max(0, 1 - (r + g + b) / alpha_test) * opacity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftShadowMaterial {
    pub color: Color,
    pub blend: f32,
    pub alpha_test: f32,
    pub opacity: f32,
}

impl Default for SoftShadowMaterial {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            blend: 2.0,
            alpha_test: 0.75,
            opacity: 0.0,
        }
    }
}

impl SoftShadowMaterial {
    pub fn shade(&self, sample: Color) -> Color {
        let rgb = self.color.rgb_vec3() * sample.r * self.blend;
        let coverage = (1.0 - (sample.r + sample.g + sample.b) / self.alpha_test).max(0.0);
        Color::from_rgb_vec3(rgb, coverage * self.opacity)
    }

    /// Shade every texel of a light map.
    pub fn apply(&self, lightmap: &ImageBuffer) -> ImageBuffer {
        let mut out = ImageBuffer::new(lightmap.width(), lightmap.height(), Color::TRANSPARENT);
        for y in 0..lightmap.height() {
            for x in 0..lightmap.width() {
                out.set_texel(x, y, self.shade(lightmap.texel(x, y)));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible() -> SoftShadowMaterial {
        SoftShadowMaterial {
            opacity: 1.0,
            ..SoftShadowMaterial::default()
        }
    }

    #[test]
    fn dark_texels_are_opaque_lit_ones_vanish() {
        let m = visible();
        assert_eq!(m.shade(Color::BLACK).a, 1.0);
        assert_eq!(m.shade(Color::WHITE).a, 0.0);
        let half = m.shade(Color::rgb(0.125, 0.125, 0.125));
        assert!((half.a - 0.5).abs() < 1e-6);
    }

    #[test]
    fn tint_scales_with_red_channel() {
        let m = SoftShadowMaterial {
            color: Color::rgb(0.5, 0.25, 1.0),
            ..visible()
        };
        let c = m.shade(Color::rgb(0.5, 0.0, 0.0));
        assert_eq!((c.r, c.g, c.b), (0.5, 0.25, 1.0));
    }

    #[test]
    fn zero_alpha_test_hides_everything() {
        let m = SoftShadowMaterial {
            alpha_test: 0.0,
            ..visible()
        };
        assert_eq!(m.shade(Color::BLACK).a, 0.0);
        assert_eq!(m.shade(Color::WHITE).a, 0.0);
    }

    #[test]
    fn default_opacity_starts_hidden() {
        let img = ImageBuffer::new(2, 2, Color::BLACK);
        let out = SoftShadowMaterial::default().apply(&img);
        assert!(out.pixels().iter().all(|c| c.a == 0.0));
    }
}
