use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Stable integer identifier for an entity known to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Axis-aligned bounding box in world space.
///
/// Callers must keep `min <= max` on every axis. Boxes violating that are not
/// rejected; they simply intersect nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Box centered on `center` reaching `half_extents` along each axis.
    pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Closed-interval overlap test: touching faces count as intersecting.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains_point(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn translated(&self, offset: DVec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}

/// The capability set the grid needs from a host entity.
///
/// The grid only reads these values while indexing; it never keeps a
/// reference to the entity itself, only its id.
pub trait Spatial {
    fn id(&self) -> EntityId;

    fn position(&self) -> DVec3;

    /// Current world-space bounds. Read synchronously at index time.
    fn bounding_box(&self) -> BoundingBox;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_orders_numerically() {
        assert!(EntityId(2) < EntityId(10));
        assert_eq!(EntityId(7).to_string(), "#7");
    }

    #[test]
    fn center_and_half_extents_round_trip() {
        let b = BoundingBox::from_center_half_extents(DVec3::new(1.0, 2.0, 3.0), DVec3::splat(0.5));
        assert_eq!(b.min, DVec3::new(0.5, 1.5, 2.5));
        assert_eq!(b.max, DVec3::new(1.5, 2.5, 3.5));
        assert_eq!(b.center(), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.size(), DVec3::ONE);
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = BoundingBox::new(DVec3::ZERO, DVec3::ONE);
        let b = BoundingBox::new(DVec3::new(1.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn separated_on_one_axis_does_not_intersect() {
        let a = BoundingBox::new(DVec3::ZERO, DVec3::ONE);
        let b = a.translated(DVec3::new(0.0, 0.0, 1.5));
        assert!(!a.intersects(&b));
    }

    #[test]
    fn contains_point_is_inclusive() {
        let b = BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        assert!(b.contains_point(DVec3::ZERO));
        assert!(b.contains_point(DVec3::splat(1.0)));
        assert!(!b.contains_point(DVec3::new(0.0, 1.01, 0.0)));
    }
}
