//! Scene graph consumed by the accumulation helpers.
//!
//! # Invariants
//! - All state mutations flow through explicit operations; nothing is retained
//!   per mutation.
//! - Iteration order is deterministic (BTreeMap keyed by object id).
//! - Materials are referenced by handle; every scene owns one discard material.

pub mod geometry;
pub mod object;
pub mod scene;

pub use geometry::Geometry;
pub use object::{Light, LightKind, LightRole, Material, MaterialHandle, Mesh, ObjectKind, SceneObject};
pub use scene::Scene;
