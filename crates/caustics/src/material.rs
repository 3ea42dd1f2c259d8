use afterglow_common::Color;
use afterglow_render::ImageBuffer;
use glam::{Mat4, Vec2, Vec3};

use crate::fit::ReceiverPlane;

/// Projects front and back caustics onto receiving surfaces through the
/// light camera's view and projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CausticsProjectionMaterial {
    pub color: Color,
    pub light_view: Mat4,
    pub light_projection: Mat4,
}

impl CausticsProjectionMaterial {
    /// Light-space texture coordinate of a world point.
    pub fn light_uv(&self, world: Vec3) -> Vec2 {
        let ndc = (self.light_projection * self.light_view).project_point3(world);
        Vec2::new(ndc.x, ndc.y) * 0.5 + Vec2::splat(0.5)
    }

    /// `(front + back) * color`, opaque. Samples clamp to the edge.
    pub fn shade(&self, world: Vec3, front: &ImageBuffer, back: &ImageBuffer) -> Color {
        let uv = self.light_uv(world);
        let sum = front.sample_bilinear(uv).rgb_vec3() + back.sample_bilinear(uv).rgb_vec3();
        Color::from_rgb_vec3(sum * self.color.rgb_vec3(), 1.0)
    }

    /// Shade a `resolution`-square image of the receiver patch.
    pub fn render_receiver(
        &self,
        receiver: &ReceiverPlane,
        front: &ImageBuffer,
        back: &ImageBuffer,
        resolution: u32,
    ) -> ImageBuffer {
        let mut out = ImageBuffer::new(resolution, resolution, Color::BLACK);
        for y in 0..resolution {
            for x in 0..resolution {
                let world = receiver.world_at(out.texel_center_uv(x, y));
                out.set_texel(x, y, self.shade(world, front, back));
            }
        }
        out
    }
}
