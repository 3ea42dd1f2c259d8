use afterglow_render::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("portal geometry has no vertices")]
    EmptyGeometry,
    #[error("portal silhouette covers no texels at {0}x{0}")]
    EmptyMask(u32),
    #[error("mask is {actual:?}, generator expects {expected:?}")]
    MaskSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("render error: {0}")]
    Render(#[from] RenderError),
}
