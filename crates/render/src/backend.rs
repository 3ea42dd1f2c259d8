use afterglow_common::Color;
use afterglow_scene::Scene;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::error::RenderError;
use crate::image::{ImageBuffer, TargetDesc};
use crate::pass::{FullscreenPass, ScenePass};

/// Opaque handle to an off-screen render target owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub u32);

/// Renderer-agnostic interface. Every accumulation helper drives one of these.
///
/// Implementations read the scene and write render targets; they never
/// mutate the scene. Calls are frame-synchronous: each returns once the pass
/// has been fully written.
pub trait RenderBackend {
    /// Allocate a target. Allocation failure is surfaced as
    /// [`RenderError::ResourceExhaustion`].
    fn create_target(&mut self, desc: TargetDesc) -> Result<TargetId, RenderError>;

    /// Release a target. Returns false if it was already gone.
    fn destroy_target(&mut self, id: TargetId) -> bool;

    fn target_desc(&self, id: TargetId) -> Option<TargetDesc>;

    /// Fill color with `color` and reset depth (if any) to the far plane.
    fn clear(&mut self, target: TargetId, color: Color) -> Result<(), RenderError>;

    fn render_scene(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        target: TargetId,
        pass: &ScenePass,
    ) -> Result<(), RenderError>;

    fn render_fullscreen(
        &mut self,
        target: TargetId,
        pass: &FullscreenPass,
    ) -> Result<(), RenderError>;

    /// Copy a target's contents back to the caller.
    fn read_pixels(&self, id: TargetId) -> Result<ImageBuffer, RenderError>;
}
