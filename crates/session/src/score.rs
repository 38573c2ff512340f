use serde::{Deserialize, Serialize};

/// How distance and wheelies turn into points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreParams {
    /// Points per metre travelled.
    pub speed_to_score_factor: f32,
    /// Bonus points per second spent in a wheelie.
    pub wheelie_bonus_rate: f32,
    /// Wheelie angle, in degrees, above which the bonus applies.
    pub wheelie_active_threshold: f32,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            speed_to_score_factor: 10.0,
            wheelie_bonus_rate: 20.0,
            wheelie_active_threshold: 5.0,
        }
    }
}

impl ScoreParams {
    pub fn is_wheelie_active(&self, wheelie_angle: f32) -> bool {
        wheelie_angle > self.wheelie_active_threshold
    }

    /// Points earned over one presentation frame of `dt` seconds.
    ///
    /// Each term is rounded on its own, so short frames can round a small
    /// bonus down to nothing.
    pub fn frame_points(&self, speed: f32, wheelie_angle: f32, dt: f32) -> u64 {
        if !(dt.is_finite() && dt > 0.0) {
            return 0;
        }
        let distance = (speed * dt * self.speed_to_score_factor).round().max(0.0);
        let bonus = if self.is_wheelie_active(wheelie_angle) {
            (self.wheelie_bonus_rate * dt).round().max(0.0)
        } else {
            0.0
        };
        distance as u64 + bonus as u64
    }
}
