use serde::{Deserialize, Serialize};

/// The rider's held controls for the current presentation frame.
///
/// Consumed by every fixed physics step until the host replaces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlIntent {
    pub accelerate: bool,
    pub brake: bool,
    pub wheelie: bool,
}

impl ControlIntent {
    /// Nothing held.
    pub const IDLE: Self = Self {
        accelerate: false,
        brake: false,
        wheelie: false,
    };

    pub fn new(accelerate: bool, brake: bool, wheelie: bool) -> Self {
        Self {
            accelerate,
            brake,
            wheelie,
        }
    }

    /// Throttle only.
    pub fn throttle() -> Self {
        Self {
            accelerate: true,
            ..Self::IDLE
        }
    }

    pub fn with_wheelie(mut self, held: bool) -> Self {
        self.wheelie = held;
        self
    }

    /// Combine two sources (e.g. keyboard and touch): a control is held if
    /// either source holds it.
    pub fn merge(self, other: Self) -> Self {
        Self {
            accelerate: self.accelerate || other.accelerate,
            brake: self.brake || other.brake,
            wheelie: self.wheelie || other.wheelie,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::IDLE
    }
}

/// A session command issued by menus, hotkeys or scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Begin a fresh run from the menu or the game-over screen.
    StartGame,
    /// Freeze an active run.
    Pause,
    /// Continue a paused run.
    Resume,
    /// Pause when active, resume when paused.
    TogglePause,
    /// Abandon whatever is running and return to the menu.
    ShowMainMenu,
    /// Rebuild the streamed course from its starting layout.
    ResetEnvironment,
}
