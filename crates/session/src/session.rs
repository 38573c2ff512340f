use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use wheelie_common::RunId;
use wheelie_input::{Command, ControlIntent};
use wheelie_kernel::{Disturbance, FixedStep, VehicleDynamics};
use wheelie_stream::{StreamDelta, WorldStreamer};

use crate::config::{ConfigError, SessionConfig, validate_fixed_dt, validate_scoring};
use crate::events::{GameOverCause, SessionEvent};
use crate::score::ScoreParams;
use crate::store::HighScoreStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    MainMenu,
    Active,
    Paused,
    GameOver,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::MainMenu => "main menu",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::GameOver => "game over",
        };
        f.write_str(text)
    }
}

/// A command that does not apply in the current state. Nothing was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} from {state}")]
pub struct TransitionError {
    pub action: &'static str,
    pub state: SessionState,
}

/// What one presentation frame did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Fixed physics steps run.
    pub steps: u32,
    /// Course changes since the previous frame, including any from
    /// commands applied in between.
    pub delta: StreamDelta,
    /// Set when the run ended during this frame.
    pub game_over: Option<GameOverCause>,
}

/// Read-only view polled by the HUD once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub score: u64,
    pub high_score: u64,
    /// Logical forward speed, metres per second.
    pub current_speed: f32,
    pub wheelie_angle: f32,
    pub is_wheelie_active: bool,
}

impl SessionSnapshot {
    pub fn speed_kmh(&self) -> u32 {
        (self.current_speed * 3.6).round() as u32
    }
}

impl std::fmt::Display for SessionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] score {} (best {}) | {} km/h | wheelie {:.1}°{}",
            self.state,
            self.score,
            self.high_score,
            self.speed_kmh(),
            self.wheelie_angle,
            if self.is_wheelie_active { " *" } else { "" },
        )
    }
}

/// One player's session: menu, runs, pauses and game over.
///
/// Owns the bike and the streamed course. Each [`frame`](Self::frame) applies
/// queued commands, runs the fixed physics steps that are due, streams the
/// course to the bike's new position, checks for obstacle hits and scores.
pub struct GameSession {
    dynamics: VehicleDynamics,
    streamer: WorldStreamer,
    scoring: ScoreParams,
    clock: FixedStep,
    store: Box<dyn HighScoreStore>,
    state: SessionState,
    score: u64,
    high_score: u64,
    run: Option<RunId>,
    intent: ControlIntent,
    wheelie_active: bool,
    pending: VecDeque<Command>,
    outbox: StreamDelta,
    events: Vec<SessionEvent>,
}

impl GameSession {
    /// Build a session from configuration. The course is primed around the
    /// start position; its spawns arrive with the first frame's delta.
    pub fn new(config: &SessionConfig, store: Box<dyn HighScoreStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        let dynamics = VehicleDynamics::with_vehicle(config.vehicle.clone(), config.start_position());
        let streamer = WorldStreamer::new(config.stream.clone(), config.seed)?;
        Self::from_parts(dynamics, streamer, config.scoring.clone(), config.fixed_dt, store)
    }

    /// Wire a session from already-built collaborators.
    pub fn from_parts(
        dynamics: VehicleDynamics,
        mut streamer: WorldStreamer,
        scoring: ScoreParams,
        fixed_dt: f32,
        store: Box<dyn HighScoreStore>,
    ) -> Result<Self, ConfigError> {
        validate_fixed_dt(fixed_dt)?;
        validate_scoring(&scoring)?;
        dynamics.params().validate()?;
        let outbox = streamer.reset_environment_at(dynamics.forward_z());
        let high_score = store.load();
        tracing::info!(high_score, seed = streamer.seed(), "session ready");
        Ok(Self {
            dynamics,
            streamer,
            scoring,
            clock: FixedStep::new(fixed_dt),
            store,
            state: SessionState::MainMenu,
            score: 0,
            high_score,
            run: None,
            intent: ControlIntent::IDLE,
            wheelie_active: false,
            pending: VecDeque::new(),
            outbox,
            events: Vec::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn high_score(&self) -> u64 {
        self.high_score
    }

    /// The current run, or the one that just ended. `None` in the menu.
    pub fn run(&self) -> Option<RunId> {
        self.run
    }

    pub fn dynamics(&self) -> &VehicleDynamics {
        &self.dynamics
    }

    pub fn streamer(&self) -> &WorldStreamer {
        &self.streamer
    }

    pub fn clock(&self) -> &FixedStep {
        &self.clock
    }

    pub fn store(&self) -> &dyn HighScoreStore {
        self.store.as_ref()
    }

    pub fn intent(&self) -> ControlIntent {
        self.intent
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let (current_speed, wheelie_angle) = self
            .dynamics
            .vehicle()
            .map_or((0.0, 0.0), |v| (v.speed, v.wheelie_angle));
        SessionSnapshot {
            state: self.state,
            score: self.score,
            high_score: self.high_score,
            current_speed,
            wheelie_angle,
            is_wheelie_active: self.scoring.is_wheelie_active(wheelie_angle),
        }
    }

    /// Read-only access to queued notifications.
    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// Take all queued notifications.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Held controls, used by every fixed step until replaced.
    pub fn set_control_intent(&mut self, intent: ControlIntent) {
        self.intent = intent;
    }

    /// Contact event from the track surface.
    pub fn set_grounded(&mut self, grounded: bool) {
        self.dynamics.set_grounded(grounded);
    }

    pub fn set_disturbance(&mut self, disturbance: Disturbance) {
        self.dynamics.set_disturbance(disturbance);
    }

    /// Queue a command for the top of the next frame.
    pub fn submit(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    /// Apply a command now.
    pub fn apply(&mut self, command: Command) -> Result<(), TransitionError> {
        match command {
            Command::StartGame => self.start_game(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::TogglePause => self.toggle_pause(),
            Command::ShowMainMenu => {
                self.show_main_menu();
                Ok(())
            }
            Command::ResetEnvironment => {
                self.reset_environment();
                Ok(())
            }
        }
    }

    /// Begin a fresh run from the menu or the game-over screen.
    pub fn start_game(&mut self) -> Result<(), TransitionError> {
        if !matches!(self.state, SessionState::MainMenu | SessionState::GameOver) {
            return Err(self.refuse("start a game"));
        }
        self.score = 0;
        self.wheelie_active = false;
        self.dynamics.reset();
        self.clock.reset();
        let primed = self.streamer.reset_environment_at(self.dynamics.forward_z());
        self.outbox.merge(primed);
        let run = RunId::new();
        self.run = Some(run);
        self.state = SessionState::Active;
        tracing::info!(%run, "run started");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TransitionError> {
        if self.state != SessionState::Active {
            return Err(self.refuse("pause"));
        }
        self.state = SessionState::Paused;
        tracing::info!(score = self.score, "paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), TransitionError> {
        if self.state != SessionState::Paused {
            return Err(self.refuse("resume"));
        }
        self.state = SessionState::Active;
        tracing::info!("resumed");
        Ok(())
    }

    pub fn toggle_pause(&mut self) -> Result<(), TransitionError> {
        match self.state {
            SessionState::Active => self.pause(),
            SessionState::Paused => self.resume(),
            _ => Err(self.refuse("toggle pause")),
        }
    }

    /// Abandon whatever is running without scoring it. Valid from any state.
    pub fn show_main_menu(&mut self) {
        if matches!(self.state, SessionState::Active | SessionState::Paused) {
            tracing::info!(score = self.score, "run abandoned");
        }
        self.end_wheelie();
        self.state = SessionState::MainMenu;
        self.run = None;
    }

    /// Rebuild the course from its starting layout, primed around the bike.
    /// The bike is not moved.
    pub fn reset_environment(&mut self) {
        let delta = self
            .streamer
            .reset_environment_at(self.dynamics.forward_z());
        self.outbox.merge(delta);
    }

    /// Run one presentation frame of `dt` seconds.
    pub fn frame(&mut self, dt: f32) -> FrameReport {
        let mut report = FrameReport::default();
        if self.drain_commands() {
            report.delta = std::mem::take(&mut self.outbox);
            return report;
        }
        if self.state != SessionState::Active {
            report.delta = std::mem::take(&mut self.outbox);
            return report;
        }
        let span = match self.run {
            Some(run) => tracing::debug_span!("run", %run),
            None => tracing::Span::none(),
        };
        let _guard = span.enter();

        let swept_from = self.dynamics.bounds();
        report.steps = self.clock.advance(dt);
        let step = self.clock.step();
        for _ in 0..report.steps {
            let outcome = self.dynamics.step(step, self.intent);
            self.track_wheelie(outcome.wheelie_angle);
            if let Some(cause) = outcome.crash {
                report.game_over = Some(self.game_over(GameOverCause::Crash(cause)));
                report.delta = std::mem::take(&mut self.outbox);
                return report;
            }
        }

        let delta = self.streamer.advance(self.dynamics.forward_z());
        self.outbox.merge(delta);
        report.delta = std::mem::take(&mut self.outbox);

        // Sweep from the pre-frame box so a long frame cannot tunnel through.
        let swept = match (swept_from, self.dynamics.bounds()) {
            (Some(from), Some(to)) => Some(from.union(&to)),
            (from, to) => to.or(from),
        };
        if let Some(hit) = swept.and_then(|bounds| self.streamer.check_collision(&bounds)) {
            report.game_over = Some(self.game_over(GameOverCause::Collision(hit)));
            return report;
        }

        let (speed, angle) = self
            .dynamics
            .vehicle()
            .map_or((0.0, 0.0), |v| (v.speed, v.wheelie_angle));
        self.score += self.scoring.frame_points(speed, angle, dt);
        tracing::trace!(
            steps = report.steps,
            score = self.score,
            z = self.dynamics.forward_z(),
            "frame complete"
        );
        report
    }

    /// Apply queued commands in order. Returns true when a queued main-menu
    /// request ended the frame; anything queued after it is dropped.
    fn drain_commands(&mut self) -> bool {
        while let Some(command) = self.pending.pop_front() {
            if command == Command::ShowMainMenu {
                self.show_main_menu();
                if !self.pending.is_empty() {
                    tracing::debug!(dropped = self.pending.len(), "commands dropped after menu request");
                    self.pending.clear();
                }
                return true;
            }
            if let Err(err) = self.apply(command) {
                tracing::debug!(%err, "queued command ignored");
            }
        }
        false
    }

    fn track_wheelie(&mut self, angle: f32) {
        let active = self.scoring.is_wheelie_active(angle);
        if active && !self.wheelie_active {
            self.wheelie_active = true;
            self.events.push(SessionEvent::WheelieStarted);
        } else if !active {
            self.end_wheelie();
        }
    }

    fn end_wheelie(&mut self) {
        if self.wheelie_active {
            self.wheelie_active = false;
            self.events.push(SessionEvent::WheelieEnded);
        }
    }

    fn game_over(&mut self, cause: GameOverCause) -> GameOverCause {
        self.end_wheelie();
        self.state = SessionState::GameOver;
        let final_score = self.score;
        let run = self.run.unwrap_or_default();
        tracing::info!(%run, final_score, %cause, "game over");
        self.events.push(SessionEvent::GameOver {
            run,
            final_score,
            cause,
        });
        if final_score > self.high_score {
            self.high_score = final_score;
            self.store.save(final_score);
            self.events.push(SessionEvent::NewHighScore(final_score));
            tracing::debug!(final_score, "new high score");
        }
        cause
    }

    fn refuse(&self, action: &'static str) -> TransitionError {
        TransitionError {
            action,
            state: self.state,
        }
    }
}
