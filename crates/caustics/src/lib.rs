//! Refraction caustics projected from a light through transmissive casters.
//!
//! Each refresh fits an orthographic light camera to the casters' bounds,
//! captures front (and optionally back) face normals with depth from that
//! camera, and runs the caustics kernel into a pair of targets that a
//! [`CausticsProjectionMaterial`] projects onto receiving surfaces.
//!
//! # Invariants
//! - A refresh with degenerate bounds or a grazing light renders nothing and
//!   leaves the previous caustics in place.
//! - The light camera always looks at the center of the casters' bounds and
//!   its frustum contains every bounds corner.
//! - The frame budget counts refresh attempts, not successful renders.

mod config;
mod error;
mod fit;
mod material;
mod projector;

pub use config::{CausticsConfig, LightSource};
pub use error::CausticsError;
pub use fit::{FitOutcome, ProjectionFit, ProjectionFitter, ReceiverPlane, fit_projection, receiver_plane};
pub use material::CausticsProjectionMaterial;
pub use projector::{CausticsProjector, RefreshOutcome, RefreshStage};

pub fn crate_info() -> &'static str {
    "afterglow-caustics v0.1.0"
}
