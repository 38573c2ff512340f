//! Game session: the run lifecycle wrapped around the bike and the course.
//!
//! # Invariants
//! - Simulation only advances while `Active`. Paused, menu and game-over
//!   frames change neither the bike, the course nor the score.
//! - Score never decreases during a run; the final score of a run is the
//!   score at the instant it ended.
//! - The high score is only raised, and only on game over.
//! - Commands queued with `submit` run at the top of the next frame, in
//!   order; a queued return to the main menu ends that frame.

mod config;
mod events;
mod score;
mod session;
mod store;

pub use config::{ConfigError, SessionConfig};
pub use events::{GameOverCause, SessionEvent};
pub use score::ScoreParams;
pub use session::{FrameReport, GameSession, SessionSnapshot, SessionState, TransitionError};
pub use store::{HighScoreStore, MemoryHighScore};
