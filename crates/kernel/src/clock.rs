/// Slack absorbed when deciding whether a whole step is due, in seconds.
///
/// Frame times summed in different orders drift by a few ulps; without slack
/// two dt sequences with equal totals could disagree on the final step count.
const STEP_EPSILON: f64 = 1e-6;

/// Fixed-timestep accumulator.
///
/// Presentation frames arrive at whatever rate the host manages; physics runs
/// in whole steps of `step` seconds. Leftover time carries to the next frame
/// and no elapsed time is ever dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedStep {
    step: f64,
    accumulator: f64,
    total_steps: u64,
}

impl FixedStep {
    /// Create an accumulator for steps of `step` seconds.
    ///
    /// `step` must be positive and finite; session configuration rejects
    /// anything else before a clock is built.
    pub fn new(step: f32) -> Self {
        debug_assert!(step.is_finite() && step > 0.0, "fixed step must be positive");
        Self {
            step: f64::from(step),
            accumulator: 0.0,
            total_steps: 0,
        }
    }

    /// Step length in seconds.
    pub fn step(&self) -> f32 {
        self.step as f32
    }

    /// Add a presentation frame's elapsed time and return how many fixed
    /// steps are now due. Non-finite or negative frame times add nothing.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        if frame_dt.is_finite() && frame_dt > 0.0 {
            self.accumulator += f64::from(frame_dt);
        }
        // Saturates at u32::MAX; the remainder stays in the accumulator.
        let whole = ((self.accumulator + STEP_EPSILON) / self.step).floor();
        let due = whole.clamp(0.0, f64::from(u32::MAX)) as u32;
        self.accumulator = (self.accumulator - f64::from(due) * self.step).max(0.0);
        self.total_steps += u64::from(due);
        due
    }

    /// Fraction of a step left over, for interpolating presentation.
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.step) as f32
    }

    /// Steps issued since construction or the last reset.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Simulated seconds issued since construction or the last reset.
    pub fn simulated_time(&self) -> f64 {
        self.total_steps as f64 * self.step
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.total_steps = 0;
    }
}
