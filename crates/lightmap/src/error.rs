use afterglow_common::ObjectId;
use afterglow_render::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum LightMapError {
    #[error("light map updated before clear()")]
    NotCleared,
    #[error("no target object configured")]
    NotConfigured,
    #[error("blend window must be at least 1, got {0}")]
    InvalidBlendWindow(f32),
    #[error("object {0:?} is not a mesh in this scene")]
    UnknownObject(ObjectId),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
}
