use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("readback mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("readback channel closed before the map callback ran")]
    ReadbackLost,

    #[error("accumulation size {width}x{height} is not allowed")]
    InvalidSize { width: u32, height: u32 },

    #[error("sample is {actual:?}, accumulator is {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("blend window must be at least 1, got {0}")]
    InvalidBlendWindow(f32),
}
