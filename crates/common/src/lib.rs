//! Shared types: object ids, transforms, linear colors, bounds and plane math.

mod bounds;
mod types;

pub use bounds::{Aabb, Plane, refract};
pub use types::{Color, ObjectId, Transform};
