use std::collections::HashSet;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use wheelie_common::Aabb;

use crate::arena::Arena;
use crate::objects::{DecorObject, ObjectId, Obstacle, Side, Spawned, TrackSegment};
use crate::window::{StreamConfig, StreamConfigError, StreamStats};

/// What changed in one streamer update.
///
/// Objects created and retired within the same update appear in neither list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDelta {
    pub spawned: Vec<Spawned>,
    pub retired: Vec<ObjectId>,
}

impl StreamDelta {
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.retired.is_empty()
    }

    /// Fold a later delta into this one. Objects this delta spawned and the
    /// later one retired cancel out.
    pub fn merge(&mut self, later: StreamDelta) {
        let spawned_here: HashSet<ObjectId> = self.spawned.iter().map(Spawned::id).collect();
        let (cancelled, retired): (Vec<ObjectId>, Vec<ObjectId>) = later
            .retired
            .into_iter()
            .partition(|id| spawned_here.contains(id));
        if !cancelled.is_empty() {
            let cancelled: HashSet<ObjectId> = cancelled.into_iter().collect();
            self.spawned.retain(|s| !cancelled.contains(&s.id()));
        }
        self.retired.extend(retired);
        self.spawned.extend(later.spawned);
    }

    /// Drop objects that were both created and retired in this update.
    /// Ids at or above `first_new` were allocated during the update.
    fn cancel_transients(&mut self, first_new: ObjectId) {
        let transient: HashSet<ObjectId> = self
            .retired
            .iter()
            .copied()
            .filter(|id| *id >= first_new)
            .collect();
        if transient.is_empty() {
            return;
        }
        self.retired.retain(|id| !transient.contains(id));
        self.spawned.retain(|s| !transient.contains(&s.id()));
    }
}

/// Id-free copy of everything materialized, for comparing two courses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseLayout {
    pub segments: Vec<TrackSegment>,
    pub obstacles: Vec<Obstacle>,
    pub decor: Vec<DecorObject>,
}

/// Streams the course around the bike's forward coordinate.
///
/// Segments are laid contiguously from a frontier that always covers the
/// leading window; obstacle candidates are resolved at randomized gaps; decor
/// rides along with each new segment. Everything falling behind the trailing
/// window is retired. All randomness comes from a ChaCha stream seeded at
/// construction and reseeded on every reset.
#[derive(Debug, Clone)]
pub struct WorldStreamer {
    config: StreamConfig,
    seed: u64,
    rng: ChaCha8Rng,
    frontier_z: f32,
    next_obstacle_z: f32,
    next_id: u64,
    segments: Arena<TrackSegment>,
    obstacles: Arena<Obstacle>,
    decor: Arena<DecorObject>,
    stats: StreamStats,
}

impl WorldStreamer {
    /// Build an empty streamer. Nothing is materialized until the first
    /// [`advance`](Self::advance) or [`reset_environment`](Self::reset_environment).
    pub fn new(config: StreamConfig, seed: u64) -> Result<Self, StreamConfigError> {
        config.validate()?;
        let per_window = ((config.leading_window + config.trailing_window) / config.segment_length)
            .ceil() as usize
            + 2;
        Ok(Self {
            frontier_z: config.course_start_z,
            next_obstacle_z: config.first_obstacle_z,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            next_id: 0,
            segments: Arena::with_capacity(per_window),
            obstacles: Arena::new(),
            decor: Arena::with_capacity(per_window * 2),
            stats: StreamStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Forward coordinate of the next segment to be placed.
    pub fn frontier_z(&self) -> f32 {
        self.frontier_z
    }

    /// Forward coordinate of the next obstacle candidate.
    pub fn next_obstacle_z(&self) -> f32 {
        self.next_obstacle_z
    }

    pub fn segments(&self) -> &Arena<TrackSegment> {
        &self.segments
    }

    pub fn obstacles(&self) -> &Arena<Obstacle> {
        &self.obstacles
    }

    pub fn decor(&self) -> &Arena<DecorObject> {
        &self.decor
    }

    pub fn live_count(&self) -> usize {
        self.segments.len() + self.obstacles.len() + self.decor.len()
    }

    /// Statistics from the last update.
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn layout(&self) -> CourseLayout {
        CourseLayout {
            segments: self.segments.iter().map(|(_, s)| *s).collect(),
            obstacles: self.obstacles.iter().map(|(_, o)| *o).collect(),
            decor: self.decor.iter().map(|(_, d)| *d).collect(),
        }
    }

    /// Bring the materialized set in line with a bike at `vehicle_z`.
    pub fn advance(&mut self, vehicle_z: f32) -> StreamDelta {
        let _span = tracing::info_span!("stream_advance", z = vehicle_z).entered();
        let started = Instant::now();
        let mut delta = StreamDelta::default();
        if !vehicle_z.is_finite() {
            tracing::warn!(vehicle_z, "ignoring non-finite vehicle position");
            return delta;
        }
        let first_new = ObjectId(self.next_id);

        self.skip_behind(vehicle_z);
        self.extend_frontier(vehicle_z, &mut delta.spawned);
        self.resolve_obstacles(vehicle_z, &mut delta.spawned);
        self.retire_behind(vehicle_z, &mut delta.retired);
        delta.cancel_transients(first_new);

        self.stats = StreamStats {
            spawned_this_frame: delta.spawned.len(),
            retired_this_frame: delta.retired.len(),
            live_segments: self.segments.len(),
            live_obstacles: self.obstacles.len(),
            live_decor: self.decor.len(),
            frame_time: started.elapsed(),
        };
        tracing::trace!(
            spawned = delta.spawned.len(),
            retired = delta.retired.len(),
            live = self.stats.live_total(),
            frontier = self.frontier_z,
            "stream advance complete"
        );
        delta
    }

    /// Destroy everything, rewind to the start of the course and re-prime
    /// the leading window around `course_start_z`.
    pub fn reset_environment(&mut self) -> StreamDelta {
        self.reset_environment_at(self.config.course_start_z)
    }

    /// As [`reset_environment`](Self::reset_environment), priming the window
    /// around `vehicle_z` instead of the course start.
    pub fn reset_environment_at(&mut self, vehicle_z: f32) -> StreamDelta {
        let mut cleared = Vec::with_capacity(self.live_count());
        self.segments.clear(&mut cleared);
        self.obstacles.clear(&mut cleared);
        self.decor.clear(&mut cleared);

        self.frontier_z = self.config.course_start_z;
        self.next_obstacle_z = self.config.first_obstacle_z;
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        tracing::debug!(cleared = cleared.len(), seed = self.seed, "environment reset");

        let mut delta = self.advance(vehicle_z);
        cleared.append(&mut delta.retired);
        delta.retired = cleared;
        delta
    }

    /// First obstacle overlapping `bounds`, in creation order.
    pub fn check_collision(&self, bounds: &Aabb) -> Option<ObjectId> {
        self.obstacles
            .iter()
            .find(|(_, obstacle)| obstacle.bounds().overlaps(bounds))
            .map(|(id, _)| id)
    }

    fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Move the frontier, in whole segments, and the next obstacle candidate
    /// up to the trailing edge. Course behind it would be retired in the same
    /// update, so it is never built.
    fn skip_behind(&mut self, vehicle_z: f32) {
        let trail_edge = vehicle_z - self.config.trailing_window;
        let length = self.config.segment_length;
        let behind = trail_edge - self.frontier_z;
        if behind >= length {
            let whole = (behind / length).floor();
            self.frontier_z += whole * length;
            tracing::debug!(
                skipped = whole as u64,
                frontier = self.frontier_z,
                "frontier skipped ahead"
            );
        }
        if self.next_obstacle_z < trail_edge {
            self.next_obstacle_z = trail_edge;
        }
    }

    fn extend_frontier(&mut self, vehicle_z: f32, spawned: &mut Vec<Spawned>) {
        let lead_edge = vehicle_z + self.config.leading_window;
        while self.frontier_z < lead_edge {
            let next = self.frontier_z + self.config.segment_length;
            if next <= self.frontier_z {
                tracing::warn!(frontier = self.frontier_z, "course too far out to extend");
                break;
            }
            let segment = TrackSegment {
                z: self.frontier_z,
                length: self.config.segment_length,
            };
            let id = self.allocate();
            self.segments.insert(id, segment);
            spawned.push(Spawned::Segment(id, segment));
            tracing::debug!(%id, z = segment.z, "segment spawned");

            self.place_decor(&segment, lead_edge, spawned);
            self.frontier_z = next;
        }
    }

    /// Roll for one decor object per side of `segment`. Forward jitter is
    /// clipped at `lead_edge`; the batch is inserted in z order.
    fn place_decor(&mut self, segment: &TrackSegment, lead_edge: f32, spawned: &mut Vec<Spawned>) {
        if self.config.decor_kinds.is_empty() {
            return;
        }
        let [near, far] = self.config.decor_offset_range;
        let room = segment.length.min(lead_edge - segment.z).max(0.0);
        let mut batch: Vec<DecorObject> = Vec::with_capacity(2);
        for side in [Side::Left, Side::Right] {
            if self.rng.random::<f32>() >= self.config.decor_spawn_chance {
                continue;
            }
            let kind =
                self.config.decor_kinds[self.rng.random_range(0..self.config.decor_kinds.len())];
            let offset = self.rng.random_range(near..=far);
            let jitter = self.rng.random::<f32>() * room;
            let heading_deg = self.rng.random_range(0.0..360.0);
            batch.push(DecorObject {
                z: segment.z + jitter,
                side,
                lateral: side.sign() * offset,
                heading_deg,
                kind,
            });
        }
        batch.sort_by(|a, b| a.z.total_cmp(&b.z));
        for decor in batch {
            let id = self.allocate();
            self.decor.insert(id, decor);
            spawned.push(Spawned::Decor(id, decor));
        }
    }

    /// Resolve every obstacle candidate the bike has come within
    /// `lookahead_margin` of. The gap to the next candidate advances whether
    /// or not anything was placed.
    fn resolve_obstacles(&mut self, vehicle_z: f32, spawned: &mut Vec<Spawned>) {
        let trail_edge = vehicle_z - self.config.trailing_window;
        while vehicle_z > self.next_obstacle_z - self.config.lookahead_margin {
            if self.next_obstacle_z + self.config.min_gap <= self.next_obstacle_z {
                tracing::warn!(next = self.next_obstacle_z, "course too far out to place obstacles");
                break;
            }
            let candidate = self.next_obstacle_z;
            let hit = self.rng.random::<f32>() < self.config.obstacle_spawn_chance;
            if hit && !self.config.obstacle_kinds.is_empty() && candidate >= trail_edge {
                let kinds = &self.config.obstacle_kinds;
                let kind = kinds[self.rng.random_range(0..kinds.len())];
                let half_width = self.config.road_half_width;
                let lateral = self.rng.random_range(-half_width..=half_width);
                let obstacle = Obstacle {
                    z: candidate,
                    lateral,
                    kind,
                };
                let id = self.allocate();
                self.obstacles.insert(id, obstacle);
                spawned.push(Spawned::Obstacle(id, obstacle));
                tracing::debug!(%id, z = candidate, ?kind, "obstacle spawned");
            }
            self.next_obstacle_z += self
                .rng
                .random_range(self.config.min_gap..=self.config.max_gap);
        }
    }

    fn retire_behind(&mut self, vehicle_z: f32, retired: &mut Vec<ObjectId>) {
        let min_z = vehicle_z - self.config.trailing_window;
        let n = self.segments.retire_behind(min_z, retired)
            + self.obstacles.retire_behind(min_z, retired)
            + self.decor.retire_behind(min_z, retired);
        if n > 0 {
            tracing::debug!(retired = n, min_z, "retired objects behind window");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{DecorKind, ObstacleKind, Placed};
    use glam::Vec3;

    fn streamer(config: StreamConfig) -> WorldStreamer {
        WorldStreamer::new(config, 42).unwrap()
    }

    fn assert_window(s: &WorldStreamer, vehicle_z: f32) {
        let lo = vehicle_z - s.config().trailing_window;
        let hi = vehicle_z + s.config().leading_window;
        let zs = s
            .segments()
            .iter()
            .map(|(_, o)| o.z())
            .chain(s.obstacles().iter().map(|(_, o)| o.z()))
            .chain(s.decor().iter().map(|(_, o)| o.z()));
        for z in zs {
            assert!(lo <= z && z <= hi, "z={z} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn first_advance_primes_five_segments() {
        let mut s = streamer(StreamConfig::default());
        s.advance(0.0);
        let zs: Vec<f32> = s.segments().iter().map(|(_, seg)| seg.z).collect();
        assert_eq!(zs, vec![0.0, 50.0, 100.0, 150.0, 200.0]);
        assert_eq!(s.frontier_z(), 250.0);
    }

    #[test]
    fn segments_are_contiguous_in_creation_order() {
        let mut s = streamer(StreamConfig::default());
        let mut spawned = Vec::new();
        let mut z = 0.0;
        while z < 5_000.0 {
            for item in s.advance(z).spawned {
                if let Spawned::Segment(id, seg) = item {
                    spawned.push((id, seg));
                }
            }
            z += 7.5;
        }
        assert!(spawned.len() > 100);
        for pair in spawned.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert_eq!(pair[1].1.z, pair[0].1.z + 50.0);
        }
    }

    #[test]
    fn everything_stays_inside_the_window() {
        let mut s = streamer(StreamConfig::default());
        let mut z = 0.0;
        for frame in 0..3_000u32 {
            // Mostly smooth with the occasional long hitch.
            z += if frame % 500 == 499 { 180.0 } else { 0.37 };
            s.advance(z);
            assert_window(&s, z);
        }
    }

    #[test]
    fn large_jump_catches_up_and_nets_out_transients() {
        let mut s = streamer(StreamConfig::default());
        s.advance(0.0);
        let delta = s.advance(10_000.0);
        assert_window(&s, 10_000.0);
        for item in &delta.spawned {
            assert!(!delta.retired.contains(&item.id()));
            assert!(s.segments().contains(item.id())
                || s.obstacles().contains(item.id())
                || s.decor().contains(item.id()));
        }
        assert_eq!(s.segments().len(), 7);
    }

    #[test]
    fn far_jump_builds_only_the_window() {
        let mut s = streamer(StreamConfig::default());
        s.advance(0.0);
        let delta = s.advance(5_000_000.0);
        assert_window(&s, 5_000_000.0);
        assert_eq!(s.segments().len(), 7);
        assert!(delta.spawned.len() < 40, "spawned {}", delta.spawned.len());
        assert!(s.next_obstacle_z() >= 5_000_000.0 - 100.0);

        // Segments stay on the original grid.
        let (_, first) = s.segments().iter().next().unwrap();
        assert_eq!(first.z % 50.0, 0.0);
    }

    #[test]
    fn coordinates_past_float_precision_do_not_hang() {
        let config = StreamConfig {
            obstacle_spawn_chance: 1.0,
            ..StreamConfig::default()
        };
        let mut s = streamer(config);
        s.advance(0.0);
        s.advance(2.0e9);
        s.advance(2.0e9 + 1_000.0);
        assert!(s.live_count() < 100);
    }

    #[test]
    fn update_times_feed_a_frame_timer() {
        let mut s = streamer(StreamConfig::default());
        let mut timer = crate::FrameTimer::new(16);
        for i in 0..100 {
            s.advance(i as f32 * 7.5);
            timer.record(s.stats().frame_time);
        }
        assert_eq!(timer.count(), 16);
        assert!(timer.min() <= timer.average());
        assert!(timer.average() <= timer.max());
    }

    #[test]
    fn obstacle_candidates_respect_gap_bounds() {
        let config = StreamConfig {
            obstacle_spawn_chance: 1.0,
            ..StreamConfig::default()
        };
        let mut s = streamer(config);
        let mut zs = Vec::new();
        let mut z = 0.0;
        while z < 4_000.0 {
            for item in s.advance(z).spawned {
                if let Spawned::Obstacle(_, o) = item {
                    zs.push(o.z);
                }
            }
            z += 1.0;
        }
        assert!(zs.len() > 50);
        assert_eq!(zs[0], 60.0);
        for pair in zs.windows(2) {
            let gap = pair[1] - pair[0];
            assert!((20.0 - 1e-3..=40.0 + 1e-3).contains(&gap), "gap {gap}");
        }
    }

    #[test]
    fn obstacles_stay_on_the_road() {
        let config = StreamConfig {
            obstacle_spawn_chance: 1.0,
            ..StreamConfig::default()
        };
        let mut s = streamer(config);
        for step in 0..1_000 {
            s.advance(step as f32 * 2.0);
            for (_, o) in s.obstacles().iter() {
                assert!(o.lateral.abs() <= 3.0);
            }
        }
    }

    #[test]
    fn no_kinds_means_no_obstacles_or_decor() {
        let config = StreamConfig {
            obstacle_spawn_chance: 1.0,
            decor_spawn_chance: 1.0,
            obstacle_kinds: Vec::new(),
            decor_kinds: Vec::new(),
            ..StreamConfig::default()
        };
        let mut s = streamer(config);
        for step in 0..500 {
            s.advance(step as f32 * 3.0);
        }
        assert!(s.obstacles().is_empty());
        assert!(s.decor().is_empty());
        assert!(!s.segments().is_empty());
    }

    #[test]
    fn decor_flanks_the_road_within_its_segment() {
        let config = StreamConfig {
            decor_spawn_chance: 1.0,
            decor_kinds: vec![DecorKind::Tree],
            ..StreamConfig::default()
        };
        let mut s = streamer(config);
        s.advance(0.0);
        assert_eq!(s.decor().len(), 10);
        for (_, d) in s.decor().iter() {
            assert!((5.0..=10.0).contains(&d.lateral.abs()));
            assert_eq!(d.lateral.signum(), d.side.sign());
            assert!((0.0..360.0).contains(&d.heading_deg));
            assert!(d.z < 250.0);
            assert_eq!(d.kind, DecorKind::Tree);
        }
        let zs: Vec<f32> = s.decor().iter().map(|(_, d)| d.z).collect();
        assert!(zs.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn reset_twice_equals_reset_once() {
        let mut s = streamer(StreamConfig::default());
        for step in 0..400 {
            s.advance(step as f32 * 4.0);
        }
        s.reset_environment();
        let once = s.layout();
        s.reset_environment();
        let twice = s.layout();
        assert_eq!(once, twice);

        let mut fresh = streamer(StreamConfig::default());
        fresh.reset_environment();
        assert_eq!(fresh.layout(), once);
        assert_eq!(s.frontier_z(), 250.0);
    }

    #[test]
    fn reset_reports_everything_it_destroyed() {
        let mut s = streamer(StreamConfig::default());
        s.advance(0.0);
        let before: Vec<ObjectId> = s.segments().iter().map(|(id, _)| id).collect();
        let delta = s.reset_environment();
        for id in before {
            assert!(delta.retired.contains(&id));
        }
        assert_eq!(
            delta
                .spawned
                .iter()
                .filter(|x| matches!(x, Spawned::Segment(..)))
                .count(),
            5
        );
    }

    #[test]
    fn merged_deltas_cancel_short_lived_objects() {
        let mut s = streamer(StreamConfig::default());
        let mut outbox = s.advance(0.0);
        let first_ids: Vec<ObjectId> = outbox.spawned.iter().map(Spawned::id).collect();
        outbox.merge(s.reset_environment());

        for id in &first_ids {
            assert!(!outbox.retired.contains(id));
            assert!(outbox.spawned.iter().all(|x| x.id() != *id));
        }
        let live: usize = outbox.spawned.len();
        assert_eq!(live, s.live_count());
    }

    #[test]
    fn same_seed_same_course() {
        let mut a = streamer(StreamConfig::default());
        let mut b = streamer(StreamConfig::default());
        let mut c = WorldStreamer::new(StreamConfig::default(), 7).unwrap();
        for step in 0..300 {
            let z = step as f32 * 5.0;
            a.advance(z);
            b.advance(z);
            c.advance(z);
        }
        assert_eq!(a.layout(), b.layout());
        assert_ne!(a.layout(), c.layout());
    }

    #[test]
    fn collision_hits_overlapping_obstacle_only() {
        let config = StreamConfig {
            obstacle_spawn_chance: 1.0,
            obstacle_kinds: vec![ObstacleKind::Crate],
            ..StreamConfig::default()
        };
        let mut s = streamer(config);
        s.advance(0.0);
        let (id, obstacle) = s.obstacles().iter().next().map(|(id, o)| (id, *o)).unwrap();

        let on_it = Aabb::from_center_half_extents(
            Vec3::new(obstacle.lateral, 0.5, obstacle.z),
            Vec3::new(0.5, 0.5, 1.0),
        );
        assert_eq!(s.check_collision(&on_it), Some(id));

        let beside = Aabb::from_center_half_extents(
            Vec3::new(obstacle.lateral + 5.0, 0.5, obstacle.z),
            Vec3::new(0.5, 0.5, 1.0),
        );
        assert_eq!(s.check_collision(&beside), None);
    }

    #[test]
    fn storage_stays_bounded_over_a_long_ride() {
        let mut s = streamer(StreamConfig::default());
        let mut z = 0.0;
        while z < 50_000.0 {
            s.advance(z);
            z += 0.5;
        }
        assert!(s.segments().capacity() <= 9);
        assert!(s.live_count() < 60);
        assert_eq!(s.stats().live_total(), s.live_count());
    }

    #[test]
    fn non_finite_position_is_ignored() {
        let mut s = streamer(StreamConfig::default());
        assert!(s.advance(f32::NAN).is_empty());
        assert_eq!(s.live_count(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StreamConfig {
            min_gap: 50.0,
            max_gap: 10.0,
            ..StreamConfig::default()
        };
        assert!(WorldStreamer::new(config, 1).is_err());
    }
}
