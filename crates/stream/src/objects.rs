use glam::Vec3;
use serde::{Deserialize, Serialize};
use wheelie_common::Aabb;

/// Identity of a streamed object. Never reused, not even across resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything placed along the course.
pub trait Placed {
    /// Forward coordinate.
    fn z(&self) -> f32;
}

/// One contiguous slab of road.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub z: f32,
    pub length: f32,
}

impl Placed for TrackSegment {
    fn z(&self) -> f32 {
        self.z
    }
}

/// The fixed set of things that can block the road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObstacleKind {
    Cone,
    Barrier,
    Crate,
    Rock,
}

impl ObstacleKind {
    pub const ALL: [ObstacleKind; 4] = [Self::Cone, Self::Barrier, Self::Crate, Self::Rock];

    pub fn half_extents(&self) -> Vec3 {
        match self {
            Self::Cone => Vec3::new(0.3, 0.4, 0.3),
            Self::Barrier => Vec3::new(1.0, 0.5, 0.25),
            Self::Crate => Vec3::new(0.5, 0.5, 0.5),
            Self::Rock => Vec3::new(0.6, 0.35, 0.6),
        }
    }
}

/// Something on the road the bike must not touch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub z: f32,
    /// Offset from the road centre line.
    pub lateral: f32,
    pub kind: ObstacleKind,
}

impl Obstacle {
    /// Collision box, resting on the road surface.
    pub fn bounds(&self) -> Aabb {
        let half = self.kind.half_extents();
        Aabb::from_center_half_extents(Vec3::new(self.lateral, half.y, self.z), half)
    }
}

impl Placed for Obstacle {
    fn z(&self) -> f32 {
        self.z
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// -1 for left, +1 for right.
    pub fn sign(&self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecorKind {
    Tree,
    Building,
    Rock,
    Sign,
}

/// Roadside scenery. No collision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecorObject {
    pub z: f32,
    pub side: Side,
    /// Signed distance from the centre line.
    pub lateral: f32,
    /// Heading about +Y in degrees, [0, 360).
    pub heading_deg: f32,
    pub kind: DecorKind,
}

impl Placed for DecorObject {
    fn z(&self) -> f32 {
        self.z
    }
}

/// A newly materialized object, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Spawned {
    Segment(ObjectId, TrackSegment),
    Obstacle(ObjectId, Obstacle),
    Decor(ObjectId, DecorObject),
}

impl Spawned {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Segment(id, _) | Self::Obstacle(id, _) | Self::Decor(id, _) => *id,
        }
    }

    pub fn z(&self) -> f32 {
        match self {
            Self::Segment(_, s) => s.z,
            Self::Obstacle(_, o) => o.z,
            Self::Decor(_, d) => d.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obstacle_rests_on_the_road() {
        let o = Obstacle {
            z: 40.0,
            lateral: 1.0,
            kind: ObstacleKind::Crate,
        };
        let b = o.bounds();
        assert_eq!(b.min.y, 0.0);
        assert_eq!(b.center(), Vec3::new(1.0, 0.5, 40.0));
    }

    #[test]
    fn side_sign() {
        assert_eq!(Side::Left.sign(), -1.0);
        assert_eq!(Side::Right.sign(), 1.0);
    }

    #[test]
    fn spawned_exposes_id_and_z() {
        let s = Spawned::Segment(
            ObjectId(7),
            TrackSegment {
                z: 50.0,
                length: 50.0,
            },
        );
        assert_eq!(s.id(), ObjectId(7));
        assert_eq!(s.z(), 50.0);
    }
}
