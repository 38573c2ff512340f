//! Course streaming: an endless track materialized around the bike.
//!
//! # Invariants
//! - After every update, everything live lies in
//!   `[z - trailing_window, z + leading_window]` for vehicle coordinate `z`.
//! - Segments tile the course contiguously in creation order; the frontier
//!   always sits one segment past the newest live segment. A jump past the
//!   whole window skips the stretch in between, still in whole segments.
//! - Object ids are never reused, not even across resets.
//! - Given the same seed and the same sequence of vehicle positions, the
//!   course is identical.

mod arena;
mod objects;
mod streamer;
mod window;

pub use arena::Arena;
pub use objects::{
    DecorKind, DecorObject, ObjectId, Obstacle, ObstacleKind, Placed, Side, Spawned, TrackSegment,
};
pub use streamer::{CourseLayout, StreamDelta, WorldStreamer};
pub use window::{FrameTimer, StreamConfig, StreamConfigError, StreamStats};
