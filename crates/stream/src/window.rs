use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::objects::{DecorKind, ObstacleKind};

/// Streaming configuration: window extents, spawn odds and spacing.
///
/// Distances are metres along the course (+Z).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Forward coordinate of the first segment after a reset.
    pub course_start_z: f32,
    pub segment_length: f32,
    /// How far ahead of the bike content must exist.
    pub leading_window: f32,
    /// How far behind the bike content is kept before retirement.
    pub trailing_window: f32,
    /// Probability that an obstacle candidate actually spawns.
    pub obstacle_spawn_chance: f32,
    /// Bounds for the distance between consecutive obstacle candidates.
    pub min_gap: f32,
    pub max_gap: f32,
    /// The next candidate is resolved once the bike is within this distance.
    pub lookahead_margin: f32,
    /// Forward coordinate of the first obstacle candidate after a reset.
    pub first_obstacle_z: f32,
    /// Obstacles are placed with `|lateral| <= road_half_width`.
    pub road_half_width: f32,
    pub obstacle_kinds: Vec<ObstacleKind>,
    /// Probability, per segment and side, of placing one decor object.
    pub decor_spawn_chance: f32,
    /// Minimum and maximum distance of decor from the centre line.
    pub decor_offset_range: [f32; 2],
    pub decor_kinds: Vec<DecorKind>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            course_start_z: 0.0,
            segment_length: 50.0,
            leading_window: 250.0,
            trailing_window: 100.0,
            obstacle_spawn_chance: 0.3,
            min_gap: 20.0,
            max_gap: 40.0,
            lookahead_margin: 100.0,
            first_obstacle_z: 60.0,
            road_half_width: 3.0,
            obstacle_kinds: ObstacleKind::ALL.to_vec(),
            decor_spawn_chance: 0.5,
            decor_offset_range: [5.0, 10.0],
            decor_kinds: vec![
                DecorKind::Tree,
                DecorKind::Building,
                DecorKind::Rock,
                DecorKind::Sign,
            ],
        }
    }
}

/// Rejected streaming configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamConfigError {
    #[error("{name} must be positive and finite, got {value}")]
    NotPositive { name: &'static str, value: f32 },
    #[error("{name} must be a probability in [0, 1], got {value}")]
    Probability { name: &'static str, value: f32 },
    #[error("min_gap ({min}) must not exceed max_gap ({max})")]
    GapOrder { min: f32, max: f32 },
    #[error("lookahead_margin ({margin}) must lie in [0, leading_window ({leading})]")]
    Lookahead { margin: f32, leading: f32 },
    #[error("road_half_width must be non-negative, got {0}")]
    RoadWidth(f32),
    #[error("decor_offset_range must be ordered and non-negative, got {0:?}")]
    DecorRange([f32; 2]),
    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f32 },
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), StreamConfigError> {
        for (name, value) in [
            ("segment_length", self.segment_length),
            ("leading_window", self.leading_window),
            ("trailing_window", self.trailing_window),
            ("min_gap", self.min_gap),
            ("max_gap", self.max_gap),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(StreamConfigError::NotPositive { name, value });
            }
        }
        for (name, value) in [
            ("course_start_z", self.course_start_z),
            ("first_obstacle_z", self.first_obstacle_z),
        ] {
            if !value.is_finite() {
                return Err(StreamConfigError::NotFinite { name, value });
            }
        }
        for (name, value) in [
            ("obstacle_spawn_chance", self.obstacle_spawn_chance),
            ("decor_spawn_chance", self.decor_spawn_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(StreamConfigError::Probability { name, value });
            }
        }
        if self.min_gap > self.max_gap {
            return Err(StreamConfigError::GapOrder {
                min: self.min_gap,
                max: self.max_gap,
            });
        }
        if !(0.0..=self.leading_window).contains(&self.lookahead_margin) {
            return Err(StreamConfigError::Lookahead {
                margin: self.lookahead_margin,
                leading: self.leading_window,
            });
        }
        if !(self.road_half_width.is_finite() && self.road_half_width >= 0.0) {
            return Err(StreamConfigError::RoadWidth(self.road_half_width));
        }
        let [near, far] = self.decor_offset_range;
        if !(near.is_finite() && far.is_finite() && 0.0 <= near && near <= far) {
            return Err(StreamConfigError::DecorRange(self.decor_offset_range));
        }
        Ok(())
    }
}

/// Per-frame streaming statistics for instrumentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStats {
    pub spawned_this_frame: usize,
    pub retired_this_frame: usize,
    pub live_segments: usize,
    pub live_obstacles: usize,
    pub live_decor: usize,
    pub frame_time: Duration,
}

impl StreamStats {
    pub fn live_total(&self) -> usize {
        self.live_segments + self.live_obstacles + self.live_decor
    }
}

/// Rolling window of update durations.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    history: Vec<Duration>,
    next: usize,
    filled: bool,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![Duration::ZERO; capacity.max(1)],
            next: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.next] = dt;
        self.next = (self.next + 1) % self.history.len();
        if self.next == 0 {
            self.filled = true;
        }
    }

    fn recorded(&self) -> &[Duration] {
        if self.filled {
            &self.history
        } else {
            &self.history[..self.next]
        }
    }

    pub fn count(&self) -> usize {
        self.recorded().len()
    }

    pub fn average(&self) -> Duration {
        let recorded = self.recorded();
        if recorded.is_empty() {
            return Duration::ZERO;
        }
        recorded.iter().sum::<Duration>() / recorded.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or_default()
    }

    pub fn min(&self) -> Duration {
        self.recorded().iter().copied().min().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_config_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.segment_length, 50.0);
        assert_eq!(config.leading_window, 250.0);
        assert_eq!(config.trailing_window, 100.0);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_trailing_window() {
        let config = StreamConfig {
            trailing_window: 0.0,
            ..StreamConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(StreamConfigError::NotPositive {
                name: "trailing_window",
                value: 0.0
            })
        );
    }

    #[test]
    fn rejects_inverted_gaps() {
        let config = StreamConfig {
            min_gap: 50.0,
            max_gap: 40.0,
            ..StreamConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(StreamConfigError::GapOrder {
                min: 50.0,
                max: 40.0
            })
        );
    }

    #[test]
    fn rejects_lookahead_beyond_leading_edge() {
        let config = StreamConfig {
            lookahead_margin: 300.0,
            ..StreamConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StreamConfigError::Lookahead { .. })
        ));
    }

    #[test]
    fn rejects_bad_probability() {
        let config = StreamConfig {
            decor_spawn_chance: 1.5,
            ..StreamConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StreamConfigError::Probability {
                name: "decor_spawn_chance",
                ..
            })
        ));
    }

    #[test]
    fn empty_kind_lists_are_allowed() {
        let config = StreamConfig {
            obstacle_kinds: Vec::new(),
            decor_kinds: Vec::new(),
            ..StreamConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn timer_keeps_only_the_most_recent_updates() {
        let mut timer = FrameTimer::new(4);
        for ms in 1..=6 {
            timer.record(Duration::from_millis(ms));
        }
        assert_eq!(timer.count(), 4);
        assert_eq!(timer.min(), Duration::from_millis(3));
        assert_eq!(timer.max(), Duration::from_millis(6));
        assert_eq!(timer.average(), Duration::from_micros(4_500));
    }

    #[test]
    fn zero_capacity_timer_holds_one_update() {
        let mut timer = FrameTimer::new(0);
        timer.record(Duration::from_millis(7));
        timer.record(Duration::from_millis(2));
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.average(), Duration::from_millis(2));
    }

    #[test]
    fn empty_frame_timer_reports_zero() {
        let timer = FrameTimer::new(4);
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.average(), Duration::ZERO);
        assert_eq!(timer.max(), Duration::ZERO);
    }
}
