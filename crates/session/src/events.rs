use serde::Serialize;
use wheelie_common::RunId;
use wheelie_kernel::CrashCause;
use wheelie_stream::ObjectId;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameOverCause {
    Crash(CrashCause),
    /// The bike hit the obstacle with this id.
    Collision(ObjectId),
}

impl std::fmt::Display for GameOverCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crash(cause) => write!(f, "{cause}"),
            Self::Collision(id) => write!(f, "hit obstacle {id}"),
        }
    }
}

/// Notification for collaborators (UI, audio, persistence), queued by the
/// session and drained by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    GameOver {
        run: RunId,
        final_score: u64,
        cause: GameOverCause,
    },
    NewHighScore(u64),
    /// The wheelie angle crossed above the active threshold.
    WheelieStarted,
    /// The wheelie angle fell back to or below the active threshold.
    WheelieEnded,
}
