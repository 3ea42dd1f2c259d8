use afterglow_common::Color;
use afterglow_render::{ImageBuffer, TargetId};
use serde::{Deserialize, Serialize};

/// Settings for generating and applying a portal edge mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Side of the square SDF texture.
    pub resolution: u32,
    /// Edge fade as a fraction of the deepest inside distance. 0 disables it.
    pub blur: f32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            resolution: 512,
            blur: 0.5,
        }
    }
}

/// Displays a portal's content with edges faded by its signed distance field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshPortalMaterial {
    pub blur: f32,
    /// Deepest inside distance of `sdf`, in texels. Set by [`crate::apply_sdf`].
    pub size: f32,
    pub sdf: Option<TargetId>,
}

impl MeshPortalMaterial {
    pub fn new(blur: f32) -> Self {
        Self {
            blur,
            ..Self::default()
        }
    }

    /// Opacity at a texel whose signed distance is `sdf`.
    pub fn alpha(&self, sdf: f32) -> f32 {
        if self.blur == 0.0 || self.size <= 0.0 {
            return 1.0;
        }
        let d = sdf / self.size;
        1.0 - smoothstep(0.0, 1.0, (d / self.blur + 1.0).clamp(0.0, 1.0))
    }

    pub fn shade(&self, content: Color, sdf: f32) -> Color {
        Color {
            a: content.a * self.alpha(sdf),
            ..content
        }
    }

    /// Fade `content` by the field in `sdf`, sampled at each texel's uv.
    pub fn apply(&self, content: &ImageBuffer, sdf: &ImageBuffer) -> ImageBuffer {
        let (w, h) = content.size();
        let mut out = content.clone();
        for y in 0..h {
            for x in 0..w {
                let d = sdf.sample_nearest(content.texel_center_uv(x, y)).r;
                out.set_texel(x, y, self.shade(content.texel(x, y), d));
            }
        }
        out
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
