/// Where the best score lives between sessions.
///
/// Saving is fire-and-forget: the session never waits on or inspects the
/// outcome of a save.
pub trait HighScoreStore {
    /// Best score recorded so far, 0 if none.
    fn load(&self) -> u64;
    fn save(&mut self, value: u64);
}

/// In-process high score, lost when the process exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryHighScore {
    value: u64,
    saves: u32,
}

impl MemoryHighScore {
    pub fn new(initial: u64) -> Self {
        Self {
            value: initial,
            saves: 0,
        }
    }

    /// Number of saves received.
    pub fn saves(&self) -> u32 {
        self.saves
    }
}

impl HighScoreStore for MemoryHighScore {
    fn load(&self) -> u64 {
        self.value
    }

    fn save(&mut self, value: u64) {
        self.value = value;
        self.saves += 1;
    }
}
