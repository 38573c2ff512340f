use glam::Vec3;
use serde::{Deserialize, Serialize};
use wheelie_common::{Aabb, Pose};
use wheelie_input::ControlIntent;

use crate::params::VehicleParams;

/// Live state of the bike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Heading about +Y in degrees; 0 faces down the course (+Z).
    pub yaw_deg: f32,
    /// Lean about the forward axis in degrees.
    pub roll_deg: f32,
    /// Front-wheel lift in degrees.
    pub wheelie_angle: f32,
    pub grounded: bool,
    /// Logical forward speed along the heading.
    pub speed: f32,
}

impl Vehicle {
    /// A bike at rest on the ground.
    pub fn at_rest(position: Vec3, yaw_deg: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            yaw_deg,
            roll_deg: 0.0,
            wheelie_angle: 0.0,
            grounded: true,
            speed: 0.0,
        }
    }

    /// Horizontal unit vector of travel.
    pub fn heading(&self) -> Vec3 {
        let yaw = self.yaw_deg.to_radians();
        Vec3::new(yaw.sin(), 0.0, yaw.cos())
    }

    pub fn pose(&self) -> Pose {
        Pose::from_euler_degrees(self.position, self.yaw_deg, self.wheelie_angle, self.roll_deg)
    }

    pub fn bounds(&self, half_extents: Vec3) -> Aabb {
        Aabb::from_center_half_extents(self.position, half_extents)
    }
}

/// External influences the host feeds in: terrain knocks, scripted torque.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Disturbance {
    /// Roll rate applied every step, degrees per second.
    pub roll_rate_deg: f32,
    /// Vertical velocity, metres per second. Downward motion is absorbed
    /// by the ground while the bike is grounded.
    pub vertical_velocity: f32,
}

/// Why the crash predicate fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrashCause {
    /// Tipped past the roll threshold.
    RolledOver,
    /// Front wheel lifted past the wheelie limit plus tolerance.
    WheelieOvershoot,
    /// Dropped below the fall threshold.
    FellOffTrack,
}

impl std::fmt::Display for CrashCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::RolledOver => "rolled over",
            Self::WheelieOvershoot => "flipped backwards",
            Self::FellOffTrack => "fell off the track",
        };
        f.write_str(text)
    }
}

/// Outcome of one fixed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub pose: Pose,
    pub speed: f32,
    pub wheelie_angle: f32,
    pub grounded: bool,
    pub crash: Option<CrashCause>,
}

impl StepReport {
    /// Report for a dynamics model with no bike attached.
    pub fn idle() -> Self {
        Self {
            pose: Pose::default(),
            speed: 0.0,
            wheelie_angle: 0.0,
            grounded: false,
            crash: None,
        }
    }

    fn from_vehicle(vehicle: &Vehicle, crash: Option<CrashCause>) -> Self {
        Self {
            pose: vehicle.pose(),
            speed: vehicle.speed,
            wheelie_angle: vehicle.wheelie_angle,
            grounded: vehicle.grounded,
            crash,
        }
    }

    pub fn crashed(&self) -> bool {
        self.crash.is_some()
    }
}

/// Evaluate the crash conditions for `vehicle` without touching it.
///
/// Conditions are checked in order: roll, wheelie overshoot, fall.
pub fn crash_check(vehicle: &Vehicle, params: &VehicleParams) -> Option<CrashCause> {
    if normalize_degrees(vehicle.roll_deg).abs() > params.roll_crash_threshold {
        return Some(CrashCause::RolledOver);
    }
    if vehicle.wheelie_angle > params.max_wheelie_angle + params.overshoot_tolerance {
        return Some(CrashCause::WheelieOvershoot);
    }
    if vehicle.position.y < params.fall_threshold {
        return Some(CrashCause::FellOffTrack);
    }
    None
}

/// Map an angle in degrees into (-180, 180].
fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Integrates the bike one fixed step at a time.
///
/// Without an attached vehicle every step is a no-op reporting zero motion
/// and no crash.
#[derive(Debug, Clone)]
pub struct VehicleDynamics {
    params: VehicleParams,
    start: Option<(Vec3, f32)>,
    vehicle: Option<Vehicle>,
    disturbance: Disturbance,
}

impl VehicleDynamics {
    /// A dynamics model with no bike attached yet.
    pub fn new(params: VehicleParams) -> Self {
        Self {
            params,
            start: None,
            vehicle: None,
            disturbance: Disturbance::default(),
        }
    }

    /// A dynamics model with a bike resting at `position`, facing down the course.
    pub fn with_vehicle(params: VehicleParams, position: Vec3) -> Self {
        let mut dynamics = Self::new(params);
        dynamics.attach(position, 0.0);
        dynamics
    }

    /// Attach a bike at rest. The position and heading become the reset pose.
    pub fn attach(&mut self, position: Vec3, yaw_deg: f32) {
        self.start = Some((position, yaw_deg));
        self.vehicle = Some(Vehicle::at_rest(position, yaw_deg));
        self.disturbance = Disturbance::default();
    }

    /// Remove the bike and forget its reset pose.
    pub fn detach(&mut self) -> Option<Vehicle> {
        self.start = None;
        self.vehicle.take()
    }

    pub fn is_attached(&self) -> bool {
        self.vehicle.is_some()
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    pub fn vehicle(&self) -> Option<&Vehicle> {
        self.vehicle.as_ref()
    }

    pub fn disturbance(&self) -> Disturbance {
        self.disturbance
    }

    /// Put the bike back at its attach pose with no motion and no disturbance.
    pub fn reset(&mut self) {
        if let Some((position, yaw)) = self.start {
            self.vehicle = Some(Vehicle::at_rest(position, yaw));
        }
        self.disturbance = Disturbance::default();
    }

    /// Contact event from the environment.
    pub fn set_grounded(&mut self, grounded: bool) {
        if let Some(vehicle) = self.vehicle.as_mut() {
            if vehicle.grounded != grounded {
                tracing::debug!(grounded, z = vehicle.position.z, "ground contact changed");
            }
            vehicle.grounded = grounded;
        }
    }

    pub fn set_disturbance(&mut self, disturbance: Disturbance) {
        self.disturbance = disturbance;
    }

    /// Forward coordinate of the bike, 0 when detached.
    pub fn forward_z(&self) -> f32 {
        self.vehicle.as_ref().map_or(0.0, |v| v.position.z)
    }

    /// Collision box of the bike, if one is attached.
    pub fn bounds(&self) -> Option<Aabb> {
        self.vehicle
            .as_ref()
            .map(|v| v.bounds(self.params.half_extents()))
    }

    /// Crash predicate for the current state.
    pub fn crash(&self) -> Option<CrashCause> {
        self.vehicle
            .as_ref()
            .and_then(|v| crash_check(v, &self.params))
    }

    /// Advance one fixed step of `dt` seconds under `intent`.
    pub fn step(&mut self, dt: f32, intent: ControlIntent) -> StepReport {
        let params = &self.params;
        let Some(vehicle) = self.vehicle.as_mut() else {
            return StepReport::idle();
        };
        if !(dt.is_finite() && dt > 0.0) {
            let crash = crash_check(vehicle, params);
            return StepReport::from_vehicle(vehicle, crash);
        }

        // Traction only while the wheels are on the track.
        if vehicle.grounded {
            if intent.accelerate {
                vehicle.speed += params.accel_rate * dt;
            }
            if intent.brake {
                vehicle.speed -= params.brake_rate * dt;
            }
        }
        vehicle.speed = vehicle.speed.clamp(0.0, params.max_speed);

        let rate = if intent.wheelie && vehicle.grounded {
            params.wheelie_speed
        } else {
            -params.return_speed
        };
        vehicle.wheelie_angle =
            (vehicle.wheelie_angle + rate * dt).clamp(0.0, params.max_wheelie_angle);

        vehicle.roll_deg += self.disturbance.roll_rate_deg * dt;
        let mut vertical = self.disturbance.vertical_velocity;
        if vehicle.grounded && vertical < 0.0 {
            vertical = 0.0;
        }
        vehicle.velocity = vehicle.heading() * vehicle.speed + Vec3::Y * vertical;
        vehicle.position += vehicle.velocity * dt;

        let crash = crash_check(vehicle, params);
        if let Some(cause) = crash {
            tracing::debug!(%cause, z = vehicle.position.z, "crash predicate fired");
        }
        StepReport::from_vehicle(vehicle, crash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedStep;

    const DT: f32 = 1.0 / 64.0;

    fn bike() -> VehicleDynamics {
        VehicleDynamics::with_vehicle(VehicleParams::default(), Vec3::new(0.0, 1.0, 0.0))
    }

    fn run(dynamics: &mut VehicleDynamics, seconds: f32, intent: ControlIntent) -> StepReport {
        let steps = (seconds / DT).round() as u32;
        let mut report = StepReport::idle();
        for _ in 0..steps {
            report = dynamics.step(DT, intent);
        }
        report
    }

    #[test]
    fn throttle_saturates_at_max_speed() {
        let mut d = bike();
        let r = run(&mut d, 1.0, ControlIntent::throttle());
        assert!((r.speed - 10.0).abs() < 1e-3);
        let r = run(&mut d, 5.0, ControlIntent::throttle());
        assert_eq!(r.speed, 20.0);
    }

    #[test]
    fn brake_floors_at_zero() {
        let mut d = bike();
        run(&mut d, 0.5, ControlIntent::throttle());
        let r = run(&mut d, 2.0, ControlIntent::new(false, true, false));
        assert_eq!(r.speed, 0.0);
    }

    #[test]
    fn bike_moves_along_heading() {
        let mut d = bike();
        run(&mut d, 2.0, ControlIntent::throttle());
        let v = d.vehicle().unwrap();
        assert!(v.position.z > 15.0);
        assert!(v.position.x.abs() < 1e-4);
        assert_eq!(v.position.y, 1.0);
    }

    #[test]
    fn wheelie_caps_at_max_angle() {
        let mut d = bike();
        let r = run(&mut d, 1.0, ControlIntent::IDLE.with_wheelie(true));
        assert_eq!(r.wheelie_angle, 45.0);
        assert!(!r.crashed());
    }

    #[test]
    fn wheelie_rises_then_decays_to_zero() {
        let mut d = bike();
        let r = run(&mut d, 0.5, ControlIntent::IDLE.with_wheelie(true));
        assert!((r.wheelie_angle - 25.0).abs() < 1e-3);
        let r = run(&mut d, 0.5, ControlIntent::IDLE);
        assert!((r.wheelie_angle - 10.0).abs() < 1e-3);
        let r = run(&mut d, 1.0, ControlIntent::IDLE);
        assert_eq!(r.wheelie_angle, 0.0);
    }

    #[test]
    fn airborne_bike_cannot_lift_or_accelerate() {
        let mut d = bike();
        run(&mut d, 0.5, ControlIntent::throttle().with_wheelie(true));
        let before = d.vehicle().unwrap().clone();
        d.set_grounded(false);
        let r = run(&mut d, 0.25, ControlIntent::throttle().with_wheelie(true));
        assert_eq!(r.speed, before.speed, "airborne bike coasts");
        assert!(r.wheelie_angle < before.wheelie_angle, "airborne wheelie decays");
        assert!(!r.grounded);
    }

    #[test]
    fn roll_past_threshold_crashes_on_that_step() {
        let mut d = bike();
        d.set_disturbance(Disturbance {
            roll_rate_deg: 64.0 * 10.0,
            vertical_velocity: 0.0,
        });
        // 10 degrees per step: step 9 reaches 90 (not past), step 10 reaches 100.
        for _ in 0..9 {
            assert!(!d.step(DT, ControlIntent::IDLE).crashed());
        }
        let r = d.step(DT, ControlIntent::IDLE);
        assert_eq!(r.crash, Some(CrashCause::RolledOver));
    }

    #[test]
    fn grounded_bike_ignores_downward_push() {
        let mut d = bike();
        d.set_disturbance(Disturbance {
            roll_rate_deg: 0.0,
            vertical_velocity: -20.0,
        });
        let r = run(&mut d, 1.0, ControlIntent::IDLE);
        assert!(!r.crashed());
        assert_eq!(d.vehicle().unwrap().position.y, 1.0);
    }

    #[test]
    fn airborne_bike_falls_off_the_track() {
        let mut d = bike();
        d.set_grounded(false);
        d.set_disturbance(Disturbance {
            roll_rate_deg: 0.0,
            vertical_velocity: -10.0,
        });
        let r = run(&mut d, 1.0, ControlIntent::IDLE);
        assert_eq!(r.crash, Some(CrashCause::FellOffTrack));
    }

    #[test]
    fn crash_check_is_pure_and_ordered() {
        let params = VehicleParams::default();
        let mut v = Vehicle::at_rest(Vec3::ZERO, 0.0);
        assert_eq!(crash_check(&v, &params), None);

        v.wheelie_angle = 49.0;
        assert_eq!(crash_check(&v, &params), None);
        v.wheelie_angle = 51.0;
        assert_eq!(crash_check(&v, &params), Some(CrashCause::WheelieOvershoot));

        v.roll_deg = -120.0;
        assert_eq!(crash_check(&v, &params), Some(CrashCause::RolledOver));
        assert_eq!(v.roll_deg, -120.0);
    }

    #[test]
    fn roll_is_normalised_before_comparison() {
        let params = VehicleParams::default();
        let mut v = Vehicle::at_rest(Vec3::ZERO, 0.0);
        v.roll_deg = 350.0;
        assert_eq!(crash_check(&v, &params), None);
        v.roll_deg = 200.0;
        assert_eq!(crash_check(&v, &params), Some(CrashCause::RolledOver));
    }

    #[test]
    fn detached_dynamics_is_idle() {
        let mut d = VehicleDynamics::new(VehicleParams::default());
        let r = d.step(DT, ControlIntent::throttle().with_wheelie(true));
        assert_eq!(r, StepReport::idle());
        assert!(d.bounds().is_none());
        assert_eq!(d.forward_z(), 0.0);
    }

    #[test]
    fn detach_leaves_an_idle_model() {
        let mut d = bike();
        run(&mut d, 0.5, ControlIntent::throttle());
        let taken = d.detach().unwrap();
        assert!(taken.speed > 0.0);
        assert!(!d.is_attached());
        assert_eq!(d.step(DT, ControlIntent::throttle()), StepReport::idle());

        d.reset();
        assert!(!d.is_attached());
        assert!(d.detach().is_none());

        d.attach(Vec3::ZERO, 0.0);
        assert!(d.is_attached());
    }

    #[test]
    fn reset_restores_attach_pose() {
        let mut d = bike();
        d.set_disturbance(Disturbance {
            roll_rate_deg: 5.0,
            vertical_velocity: 0.0,
        });
        run(&mut d, 1.0, ControlIntent::throttle().with_wheelie(true));
        d.reset();
        assert_eq!(
            d.vehicle().unwrap(),
            &Vehicle::at_rest(Vec3::new(0.0, 1.0, 0.0), 0.0)
        );
        assert_eq!(d.disturbance(), Disturbance::default());
    }

    #[test]
    fn pose_reflects_wheelie() {
        let mut d = bike();
        let r = run(&mut d, 0.5, ControlIntent::IDLE.with_wheelie(true));
        assert!(r.pose.forward().y > 0.3);
    }

    /// Drive two bikes with different presentation frame sequences of equal
    /// total length; the fixed-step accumulator must make them agree exactly.
    #[test]
    fn frame_rate_does_not_change_the_outcome() {
        let script = |t: f64| {
            let wheelie = (t * 2.0).fract() < 0.6;
            ControlIntent::new(t < 3.0, t >= 3.5, wheelie)
        };
        let drive = |frames: &[f32]| {
            let mut d = bike();
            let mut clock = FixedStep::new(DT);
            let mut issued = 0u32;
            for &frame in frames {
                for _ in 0..clock.advance(frame) {
                    let intent = script(f64::from(issued) * f64::from(DT));
                    d.step(DT, intent);
                    issued += 1;
                }
            }
            assert_eq!(issued, 256);
            d.vehicle().unwrap().clone()
        };

        let uniform: Vec<f32> = vec![1.0 / 60.0; 240];
        let total: f64 = uniform.iter().map(|f| f64::from(*f)).sum();
        // Irregular frames made of binary fractions, topped up to the same total.
        let mut jittery = Vec::new();
        let pattern = [1.0 / 32.0, 1.0 / 128.0, 3.0 / 256.0, 1.0 / 16.0];
        let mut acc = 0.0f64;
        let mut i = 0;
        while acc + f64::from(pattern[i % pattern.len()]) < total {
            jittery.push(pattern[i % pattern.len()]);
            acc += f64::from(pattern[i % pattern.len()]);
            i += 1;
        }
        jittery.push((total - acc) as f32);

        let a = drive(&uniform[..]);
        let b = drive(&jittery[..]);
        assert_eq!(a.wheelie_angle, b.wheelie_angle);
        assert_eq!(a.speed, b.speed);
        assert_eq!(a.position, b.position);
    }

    #[test]
    fn state_stays_within_limits() {
        let mut d = bike();
        let params = d.params().clone();
        for n in 0..2000u32 {
            let intent = ControlIntent::new(n % 7 < 4, n % 11 == 0, n % 5 < 3);
            if n % 97 == 0 {
                d.set_grounded(n % 194 != 0);
            }
            let r = d.step(DT, intent);
            assert!((0.0..=params.max_wheelie_angle).contains(&r.wheelie_angle));
            assert!((0.0..=params.max_speed).contains(&r.speed));
        }
    }
}
