use serde::{Deserialize, Serialize};

/// Tuning for the bike. Angles are in degrees, distances in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Speed gained per second of throttle.
    pub accel_rate: f32,
    /// Speed lost per second of braking.
    pub brake_rate: f32,
    pub max_speed: f32,
    /// Degrees per second the front wheel rises while the wheelie is held.
    pub wheelie_speed: f32,
    /// Degrees per second the front wheel settles once released.
    pub return_speed: f32,
    pub max_wheelie_angle: f32,
    /// Allowance above `max_wheelie_angle` before the bike is considered flipped.
    pub overshoot_tolerance: f32,
    /// Absolute roll beyond which the bike has tipped over.
    pub roll_crash_threshold: f32,
    /// Height below which the bike has left the track.
    pub fall_threshold: f32,
    /// Half extents of the bike's collision box.
    pub half_extents: [f32; 3],
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            accel_rate: 10.0,
            brake_rate: 15.0,
            max_speed: 20.0,
            wheelie_speed: 50.0,
            return_speed: 30.0,
            max_wheelie_angle: 45.0,
            overshoot_tolerance: 5.0,
            roll_crash_threshold: 90.0,
            fall_threshold: -5.0,
            half_extents: [0.5, 0.5, 1.0],
        }
    }
}

/// Rejected vehicle tuning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VehicleConfigError {
    #[error("max_wheelie_angle must be positive, got {0}")]
    MaxWheelieAngle(f32),
    #[error("max_speed must be positive, got {0}")]
    MaxSpeed(f32),
    #[error("{name} must be non-negative and finite, got {value}")]
    Rate { name: &'static str, value: f32 },
    #[error("roll_crash_threshold must be in (0, 180], got {0}")]
    RollThreshold(f32),
    #[error("half extents must be positive, got {0:?}")]
    HalfExtents([f32; 3]),
}

impl VehicleParams {
    pub fn validate(&self) -> Result<(), VehicleConfigError> {
        if !positive(self.max_wheelie_angle) {
            return Err(VehicleConfigError::MaxWheelieAngle(self.max_wheelie_angle));
        }
        if !positive(self.max_speed) {
            return Err(VehicleConfigError::MaxSpeed(self.max_speed));
        }
        for (name, value) in [
            ("accel_rate", self.accel_rate),
            ("brake_rate", self.brake_rate),
            ("wheelie_speed", self.wheelie_speed),
            ("return_speed", self.return_speed),
            ("overshoot_tolerance", self.overshoot_tolerance),
        ] {
            if !non_negative(value) {
                return Err(VehicleConfigError::Rate { name, value });
            }
        }
        if !positive(self.roll_crash_threshold) || self.roll_crash_threshold > 180.0 {
            return Err(VehicleConfigError::RollThreshold(self.roll_crash_threshold));
        }
        if !self.half_extents.iter().all(|h| positive(*h)) {
            return Err(VehicleConfigError::HalfExtents(self.half_extents));
        }
        Ok(())
    }

    pub fn half_extents(&self) -> glam::Vec3 {
        glam::Vec3::from_array(self.half_extents)
    }
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f32) -> bool {
    v.is_finite() && v >= 0.0
}
