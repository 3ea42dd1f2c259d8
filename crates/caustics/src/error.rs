use afterglow_common::ObjectId;
use afterglow_render::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CausticsError {
    #[error("caster bounds are empty, non-finite or collapsed to a point")]
    DegenerateBounds,

    #[error("light direction {0:?} is parallel to the ground; set an explicit far plane")]
    GrazingLight([f32; 3]),

    #[error("light source has no usable direction")]
    InvalidLightDirection,

    #[error("light source object {0:?} is not in the scene")]
    MissingLightObject(ObjectId),

    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

impl CausticsError {
    /// Failures a refresh recovers from by keeping the previous result.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DegenerateBounds | Self::GrazingLight(_))
    }
}
