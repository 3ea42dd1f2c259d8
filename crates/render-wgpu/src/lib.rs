//! Headless wgpu backend for progressive accumulation.
//!
//! Runs the ping-pong blend `mix(previous, sample, 1 / window)` on the GPU
//! with two `Rgba32Float` textures and reads the running average back into an
//! [`afterglow_render::ImageBuffer`].
//!
//! # Invariants
//! - The pass never samples the texture it renders into; roles flip after
//!   every accumulate.
//! - Texel `(x, y)` of an uploaded sample lands on texel `(x, y)` of the
//!   readback. Row order is never flipped.

mod accumulator;
mod context;
mod error;
mod shaders;

pub use accumulator::GpuAccumulator;
pub use context::GpuContext;
pub use error::GpuError;

pub fn crate_info() -> &'static str {
    "afterglow-render-wgpu v0.1.0"
}
