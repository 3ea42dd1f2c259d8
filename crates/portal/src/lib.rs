//! Portal masks: jump-flood signed distance fields of a mesh silhouette and
//! the material that fades a portal's edges with them.
//!
//! # Invariants
//! - Fields are in texels, positive outside the silhouette and negative
//!   inside.
//! - A flood round never reads the target it writes; rounds ping-pong
//!   between two targets.
//! - A material with zero blur, or no field yet, is fully opaque.

mod apply;
mod error;
mod material;
mod sdf;

pub use apply::apply_sdf;
pub use error::PortalError;
pub use material::{MeshPortalMaterial, PortalConfig};
pub use sdf::SdfGenerator;

pub fn crate_info() -> &'static str {
    "afterglow-portal v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("portal"));
    }
}
