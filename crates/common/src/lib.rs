//! Shared types for the wheelie course workspace.
//!
//! Kept dependency-light so every other crate can use it: poses, boxes and
//! run identity only.

mod types;

pub use types::{Aabb, Pose, RunId};
