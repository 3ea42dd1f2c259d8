//! Progressive light maps: ping-pong accumulation of UV-space lighting into a
//! running average, and the soft shadow baking built on top of it.
//!
//! # Invariants
//! - Exactly one buffer is written per update; the other holds the previous
//!   average. Roles alternate on every update.
//! - Everything a capture session swaps out is swapped back, on `finish()`,
//!   on early return and on panic.
//! - `update` before `clear` is an error, never undefined behaviour.

mod accumulator;
mod error;
mod randomized;
mod shadows;
mod soft_shadow;
mod swap;
mod timing;

pub use accumulator::{AccumulationState, LightMapConfig, ProgressiveLightMap};
pub use error::LightMapError;
pub use randomized::{RandomizedLight, RandomizedLightConfig};
pub use shadows::{AccumulativeShadows, ShadowsConfig};
pub use soft_shadow::SoftShadowMaterial;
pub use swap::{CaptureList, LightCaptureSession};
pub use timing::PassTimer;

pub fn crate_info() -> &'static str {
    "afterglow-lightmap v0.1.0"
}
