//! Rendering adapter: renderer-agnostic render-target interface.
//!
//! # Invariants
//! - The backend owns every render target; callers hold opaque [`TargetId`]s.
//! - A pass never reads the target it writes.
//! - Rendering never mutates the scene.
//!
//! The [`RenderBackend`] trait is the seam the accumulation helpers are written
//! against. [`SoftwareRenderer`] is the CPU reference implementation used by the
//! CLI and by every test in the workspace.

mod backend;
mod camera;
mod disposal;
mod error;
mod image;
mod pass;
mod software;

pub use backend::{RenderBackend, TargetId};
pub use camera::{Camera, Projection};
pub use disposal::DisposalRegistry;
pub use error::RenderError;
pub use image::{ImageBuffer, TargetDesc, TargetFormat};
pub use pass::{CausticsUniforms, FaceSide, FullscreenPass, ScenePass};
pub use software::{SoftwareConfig, SoftwareRenderer};

pub fn crate_info() -> &'static str {
    "afterglow-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
