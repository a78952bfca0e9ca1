use std::collections::BTreeMap;

use glam::DVec3;
use gridspace_common::{BoundingBox, EntityId, Spatial};
use gridspace_partition::{GridConfig, GridError, SpatialGrid};

use crate::rng::SplitMix64;

/// Errors from world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("grid error: {0}")]
    Grid(#[from] GridError),
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),
}

/// A moving axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub id: EntityId,
    pub position: DVec3,
    pub half_extents: DVec3,
    pub velocity: DVec3,
}

impl Spatial for Body {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> DVec3 {
        self.position
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_center_half_extents(self.position, self.half_extents)
    }
}

/// The simulation state: bodies plus the grid that indexes them.
///
/// Bodies live in a BTreeMap so iteration, and therefore index order and
/// broad-phase output, is deterministic.
#[derive(Debug, Clone)]
pub struct World {
    bodies: BTreeMap<EntityId, Body>,
    grid: SpatialGrid,
    tick: u64,
    next_id: u64,
    /// Seed the world was created with; `rng` is derived from it.
    seed: u64,
    rng: SplitMix64,
}

impl World {
    /// Create an empty world with seed 0 over a grid built from `config`.
    pub fn new(config: &GridConfig) -> Result<Self, WorldError> {
        Self::with_seed(config, 0)
    }

    /// Create a world with a specific seed for deterministic scattering.
    pub fn with_seed(config: &GridConfig, seed: u64) -> Result<Self, WorldError> {
        Ok(Self {
            bodies: BTreeMap::new(),
            grid: SpatialGrid::from_config(config)?,
            tick: 0,
            next_id: 0,
            seed,
            rng: SplitMix64::new(seed),
        })
    }

    /// Seed the world was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current simulation tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn entity_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn bodies(&self) -> &BTreeMap<EntityId, Body> {
        &self.bodies
    }

    pub fn get(&self, id: EntityId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    /// Read-only access to the grid, for queries and stats.
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Add a body and index it right away. Ids are handed out sequentially.
    pub fn spawn(&mut self, position: DVec3, half_extents: DVec3, velocity: DVec3) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        let body = Body {
            id,
            position,
            half_extents,
            velocity,
        };
        self.grid.index_entities([&body]);
        self.bodies.insert(id, body);
        id
    }

    /// Scatter `count` bodies uniformly inside the grid with random velocities
    /// up to `max_speed` per axis, drawing from the world's seeded generator.
    pub fn scatter(
        &mut self,
        count: usize,
        half_extents: DVec3,
        max_speed: f64,
    ) -> Vec<EntityId> {
        let bounds = self.grid.bounds();
        let lo = bounds.min + half_extents;
        let hi = bounds.max - half_extents;
        (0..count)
            .map(|_| {
                let position = DVec3::new(
                    self.rng.range(lo.x, hi.x),
                    self.rng.range(lo.y, hi.y),
                    self.rng.range(lo.z, hi.z),
                );
                let velocity = DVec3::new(
                    self.rng.range(-max_speed, max_speed),
                    self.rng.range(-max_speed, max_speed),
                    self.rng.range(-max_speed, max_speed),
                );
                self.spawn(position, half_extents, velocity)
            })
            .collect()
    }

    /// Remove a body from the world and the grid.
    pub fn despawn(&mut self, id: EntityId) -> Option<Body> {
        let body = self.bodies.remove(&id)?;
        self.grid.remove_entity(id);
        Some(body)
    }

    /// Teleport a body and re-index it.
    pub fn set_position(&mut self, id: EntityId, position: DVec3) -> Result<(), WorldError> {
        let body = self
            .bodies
            .get_mut(&id)
            .ok_or(WorldError::UnknownEntity(id))?;
        body.position = position;
        self.grid.index_entities([&*body]);
        Ok(())
    }

    pub fn set_velocity(&mut self, id: EntityId, velocity: DVec3) -> Result<(), WorldError> {
        let body = self
            .bodies
            .get_mut(&id)
            .ok_or(WorldError::UnknownEntity(id))?;
        body.velocity = velocity;
        Ok(())
    }

    /// Advance every body by `velocity * dt` and re-index the ones that moved.
    ///
    /// Bodies that cross a grid wall are pushed back to it and bounce, so they
    /// stay queryable. Returns the ids handed to the index pass.
    pub fn step(&mut self, dt: f64) -> Vec<EntityId> {
        self.tick += 1;
        let _span = tracing::info_span!("world_step", tick = self.tick).entered();

        let bounds = self.grid.bounds();
        let mut moved = Vec::new();
        for body in self.bodies.values_mut() {
            if body.velocity == DVec3::ZERO {
                continue;
            }
            body.position += body.velocity * dt;
            confine(body, &bounds);
            moved.push(body.id);
        }

        self.grid
            .index_entities(moved.iter().filter_map(|id| self.bodies.get(id)));

        tracing::debug!(moved = moved.len(), "bodies re-indexed");
        moved
    }

    /// Broad-phase candidates for an arbitrary box.
    pub fn query(&self, bounding_box: &BoundingBox) -> Vec<EntityId> {
        self.grid.query_entities(bounding_box)
    }

    /// Broad-phase candidates near a body, excluding the body itself.
    pub fn neighbors(&self, id: EntityId) -> Result<Vec<EntityId>, WorldError> {
        let body = self.bodies.get(&id).ok_or(WorldError::UnknownEntity(id))?;
        let mut found = self.grid.query_entities(&body.bounding_box());
        found.retain(|&other| other != id);
        Ok(found)
    }

    /// Pairs of bodies whose boxes overlap, as `(a, b)` with `a < b`, sorted.
    ///
    /// The grid narrows each body's candidates; an exact AABB test confirms them.
    pub fn candidate_pairs(&self) -> Vec<(EntityId, EntityId)> {
        let mut pairs = Vec::new();
        for (&id, body) in &self.bodies {
            let bounds = body.bounding_box();
            for other in self.grid.query_entities(&bounds) {
                if other <= id {
                    continue;
                }
                let Some(other_body) = self.bodies.get(&other) else {
                    continue;
                };
                if bounds.intersects(&other_body.bounding_box()) {
                    pairs.push((id, other));
                }
            }
        }
        pairs.sort();
        pairs
    }
}

/// Push a body back inside the walls and reflect its velocity on each axis
/// where it crossed one.
fn confine(body: &mut Body, bounds: &BoundingBox) {
    let lo = bounds.min + body.half_extents;
    let hi = bounds.max - body.half_extents;
    for axis in 0..3 {
        if body.position[axis] < lo[axis] {
            body.position[axis] = lo[axis];
            body.velocity[axis] = body.velocity[axis].abs();
        } else if body.position[axis] > hi[axis] {
            body.position[axis] = hi[axis];
            body.velocity[axis] = -body.velocity[axis].abs();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(&GridConfig::new(10, 4)).unwrap()
    }

    #[test]
    fn world_starts_empty() {
        let w = world();
        assert_eq!(w.tick(), 0);
        assert_eq!(w.entity_count(), 0);
        assert_eq!(w.grid().stats().placements, 0);
    }

    #[test]
    fn invalid_config_is_grid_error() {
        let err = World::new(&GridConfig::new(0, 4)).unwrap_err();
        assert!(matches!(
            err,
            WorldError::Grid(GridError::InvalidPartitionDimension(0))
        ));
    }

    #[test]
    fn spawn_indexes_immediately() {
        let mut w = world();
        let id = w.spawn(DVec3::ZERO, DVec3::ONE, DVec3::ZERO);
        assert!(w.grid().contains(id));
        assert_eq!(w.grid().partitions_of(id).len(), 8);
        assert_eq!(
            w.query(&BoundingBox::new(DVec3::splat(-5.0), DVec3::splat(5.0))),
            vec![id]
        );
    }

    #[test]
    fn spawn_ids_are_sequential() {
        let mut w = world();
        let a = w.spawn(DVec3::ZERO, DVec3::ONE, DVec3::ZERO);
        let b = w.spawn(DVec3::ZERO, DVec3::ONE, DVec3::ZERO);
        assert_eq!(a, EntityId(0));
        assert_eq!(b, EntityId(1));
    }

    #[test]
    fn despawn_removes_from_grid() {
        let mut w = world();
        let id = w.spawn(DVec3::ZERO, DVec3::ONE, DVec3::ZERO);
        assert!(w.despawn(id).is_some());
        assert!(!w.grid().contains(id));
        assert!(w.query(&w.grid().bounds()).is_empty());
        assert!(w.despawn(id).is_none());
    }

    #[test]
    fn step_reindexes_only_moving_bodies() {
        let mut w = world();
        let still = w.spawn(DVec3::splat(-15.0), DVec3::splat(0.5), DVec3::ZERO);
        let mover = w.spawn(DVec3::splat(-15.0), DVec3::splat(0.5), DVec3::new(10.0, 0.0, 0.0));

        let moved = w.step(2.0);
        assert_eq!(moved, vec![mover]);
        assert_eq!(w.tick(), 1);
        assert_eq!(w.get(mover).unwrap().position.x, 5.0);

        let old_cell = BoundingBox::new(DVec3::splat(-19.0), DVec3::splat(-11.0));
        assert_eq!(w.query(&old_cell), vec![still]);
        let new_cell = BoundingBox::new(
            DVec3::new(1.0, -19.0, -19.0),
            DVec3::new(9.0, -11.0, -11.0),
        );
        assert_eq!(w.query(&new_cell), vec![mover]);
    }

    #[test]
    fn step_bounces_off_walls() {
        let mut w = world();
        let id = w.spawn(DVec3::new(18.0, 0.0, 0.0), DVec3::ONE, DVec3::new(5.0, 0.0, 0.0));
        w.step(1.0);
        let body = *w.get(id).unwrap();
        assert_eq!(body.position.x, 19.0);
        assert_eq!(body.velocity.x, -5.0);
        assert!(w.query(&body.bounding_box()).contains(&id));
        assert_eq!(w.query(&w.grid().bounds()), vec![id]);

        w.step(1.0);
        assert_eq!(w.get(id).unwrap().position.x, 14.0);
    }

    #[test]
    fn fast_body_stays_inside_after_bounce() {
        let mut w = world();
        let id = w.spawn(DVec3::new(5.0, 0.0, 5.0), DVec3::ONE, DVec3::new(0.0, -200.0, 0.0));
        w.step(1.0);

        let body = *w.get(id).unwrap();
        assert_eq!(body.position.y, -19.0);
        assert_eq!(body.velocity.y, 200.0);
        assert_eq!(w.grid().partitions_of(id).len(), 1);
        assert_eq!(w.query(&w.grid().bounds()), vec![id]);
    }

    #[test]
    fn set_position_reindexes() {
        let mut w = world();
        let id = w.spawn(DVec3::ZERO, DVec3::splat(0.5), DVec3::ZERO);
        w.set_position(id, DVec3::splat(15.0)).unwrap();

        let mut keys = w.grid().partitions_of(id);
        keys.sort();
        assert_eq!(keys, vec![gridspace_partition::PartitionKey::new(3, 3, 3)]);
    }

    #[test]
    fn unknown_entity_errors() {
        let mut w = world();
        let ghost = EntityId(99);
        assert!(matches!(
            w.set_position(ghost, DVec3::ZERO),
            Err(WorldError::UnknownEntity(id)) if id == ghost
        ));
        assert!(w.set_velocity(ghost, DVec3::ONE).is_err());
        assert!(w.neighbors(ghost).is_err());
    }

    #[test]
    fn neighbors_exclude_self() {
        let mut w = world();
        let a = w.spawn(DVec3::splat(1.0), DVec3::splat(0.5), DVec3::ZERO);
        let b = w.spawn(DVec3::splat(3.0), DVec3::splat(0.5), DVec3::ZERO);
        let far = w.spawn(DVec3::splat(-15.0), DVec3::splat(0.5), DVec3::ZERO);

        let found = w.neighbors(a).unwrap();
        assert_eq!(found, vec![b]);
        assert!(!found.contains(&far));
    }

    #[test]
    fn candidate_pairs_need_real_overlap() {
        let mut w = world();
        let a = w.spawn(DVec3::splat(1.0), DVec3::splat(1.0), DVec3::ZERO);
        let b = w.spawn(DVec3::splat(2.5), DVec3::splat(1.0), DVec3::ZERO);
        // Same partition as a and b, but not touching either
        let c = w.spawn(DVec3::splat(8.0), DVec3::splat(0.5), DVec3::ZERO);
        let d = w.spawn(DVec3::splat(8.5), DVec3::splat(0.5), DVec3::ZERO);

        assert_eq!(w.candidate_pairs(), vec![(a, b), (c, d)]);
    }

    #[test]
    fn scatter_is_deterministic() {
        let config = GridConfig::new(10, 4);
        let mut w1 = World::with_seed(&config, 42).unwrap();
        let mut w2 = World::with_seed(&config, 42).unwrap();
        assert_eq!(w1.seed(), 42);
        w1.scatter(25, DVec3::splat(0.5), 2.0);
        w2.scatter(25, DVec3::splat(0.5), 2.0);

        for _ in 0..10 {
            w1.step(0.5);
            w2.step(0.5);
        }
        assert_eq!(w1.bodies(), w2.bodies());
        assert_eq!(w1.candidate_pairs(), w2.candidate_pairs());
    }

    #[test]
    fn scattered_bodies_stay_queryable() {
        let mut w = World::with_seed(&GridConfig::new(10, 4), 3).unwrap();
        let ids = w.scatter(40, DVec3::splat(0.5), 4.0);
        for _ in 0..50 {
            w.step(0.25);
        }
        for id in ids {
            let body = w.get(id).unwrap();
            assert!(w.query(&body.bounding_box()).contains(&id));
        }
    }
}
