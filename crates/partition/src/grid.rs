use std::collections::{HashMap, HashSet};

use glam::DVec3;
use gridspace_common::{BoundingBox, EntityId, Spatial};

use crate::config::GridConfig;
use crate::error::GridError;

/// Integer coordinates of a partition, each in `[0, partition_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub i: u32,
    pub j: u32,
    pub k: u32,
}

impl PartitionKey {
    pub fn new(i: u32, j: u32, k: u32) -> Self {
        Self { i, j, k }
    }

    /// Position of this key in the flat partition array of a grid with
    /// `count` partitions per axis.
    fn linear(self, count: u32) -> usize {
        let n = count as usize;
        (self.i as usize * n + self.j as usize) * n + self.k as usize
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Partition ({}, {}, {})", self.i, self.j, self.k)
    }
}

/// How [`SpatialGrid::vertex_to_partition`] treats a point outside the grid.
///
/// A side that is not allowed to clamp makes the mapping fail instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampMode {
    /// Snap coordinates below the grid minimum to index 0.
    pub clamp_min: bool,
    /// Snap coordinates above the grid maximum to `partition_count - 1`.
    pub clamp_max: bool,
}

impl ClampMode {
    /// Fail on either side.
    pub const NONE: Self = Self {
        clamp_min: false,
        clamp_max: false,
    };
    /// Mapping for a box's minimum corner.
    pub const LOW: Self = Self {
        clamp_min: true,
        clamp_max: false,
    };
    /// Mapping for a box's maximum corner.
    pub const HIGH: Self = Self {
        clamp_min: false,
        clamp_max: true,
    };
    /// Never fail: snap both sides.
    pub const BOTH: Self = Self {
        clamp_min: true,
        clamp_max: true,
    };
}

/// One cube of the grid and the entities whose boxes currently overlap it.
#[derive(Debug, Clone)]
pub struct Partition {
    key: PartitionKey,
    aabb: BoundingBox,
    entities: HashSet<EntityId>,
}

impl Partition {
    pub fn key(&self) -> PartitionKey {
        self.key
    }

    pub fn aabb(&self) -> &BoundingBox {
        &self.aabb
    }

    /// Member entities in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Occupancy summary of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridStats {
    pub partitions: usize,
    pub occupied_partitions: usize,
    /// Entities present in the reverse index, including ones outside the grid.
    pub indexed_entities: usize,
    /// Total entity memberships summed over all partitions.
    pub placements: usize,
}

impl std::fmt::Display for GridStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Grid: partitions={} occupied={} entities={} placements={}",
            self.partitions, self.occupied_partitions, self.indexed_entities, self.placements
        )
    }
}

/// Fixed-resolution uniform grid over a cube centered on the world origin.
///
/// The grid spans `[-D/2, D/2]` on every axis with
/// `D = partition_dimension * partition_count`. Partitions are stored in a
/// flat array addressed by their linearized key; the reverse index maps each
/// entity id to the array slots it occupies so re-indexing only touches the
/// partitions an entity left or entered.
///
/// Entities are referenced by id only. Hosts must call
/// [`SpatialGrid::remove_entity`] (or re-index with an out-of-grid box) before
/// discarding an entity, otherwise its id lingers in the partitions.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    partition_dimension: u32,
    partition_count: u32,
    bounds: BoundingBox,
    partitions: Vec<Partition>,
    entity_partitions: HashMap<EntityId, Vec<usize>>,
}

impl SpatialGrid {
    /// Build every partition up front. Fails if either parameter is zero or the
    /// partitions cannot be allocated.
    pub fn new(partition_dimension: u32, partition_count: u32) -> Result<Self, GridError> {
        Self::from_config(&GridConfig::new(partition_dimension, partition_count))
    }

    pub fn from_config(config: &GridConfig) -> Result<Self, GridError> {
        config.validate()?;
        let total = config.total_partitions()?;
        let count = config.partition_count;
        let dim = config.partition_dimension as f64;
        let half = config.world_extent() / 2.0;
        let bounds = BoundingBox::new(DVec3::splat(-half), DVec3::splat(half));

        let mut partitions = Vec::new();
        partitions
            .try_reserve_exact(total)
            .map_err(|_| GridError::TooManyPartitions { count })?;
        for i in 0..count {
            for j in 0..count {
                for k in 0..count {
                    let min = bounds.min + DVec3::new(i as f64, j as f64, k as f64) * dim;
                    partitions.push(Partition {
                        key: PartitionKey::new(i, j, k),
                        aabb: BoundingBox::new(min, min + DVec3::splat(dim)),
                        entities: HashSet::new(),
                    });
                }
            }
        }

        tracing::info!(
            partition_dimension = config.partition_dimension,
            partition_count = count,
            partitions = total,
            "spatial grid created"
        );

        Ok(Self {
            partition_dimension: config.partition_dimension,
            partition_count: count,
            bounds,
            partitions,
            entity_partitions: HashMap::new(),
        })
    }

    pub fn partition_dimension(&self) -> u32 {
        self.partition_dimension
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// The world-space volume covered by the grid.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn partition(&self, key: PartitionKey) -> Option<&Partition> {
        let n = self.partition_count;
        if key.i >= n || key.j >= n || key.k >= n {
            return None;
        }
        self.partitions.get(key.linear(n))
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    /// Map a world-space point to partition coordinates.
    ///
    /// Each axis is handled independently. Below the grid, the axis snaps to 0
    /// if `mode.clamp_min` is set; above it, to `partition_count - 1` if
    /// `mode.clamp_max` is set. Otherwise an out-of-grid axis returns `None`.
    /// Points exactly on the upper face map to the last partition.
    pub fn vertex_to_partition(&self, vertex: DVec3, mode: ClampMode) -> Option<PartitionKey> {
        let i = self.axis_to_index(vertex.x, self.bounds.min.x, self.bounds.max.x, mode)?;
        let j = self.axis_to_index(vertex.y, self.bounds.min.y, self.bounds.max.y, mode)?;
        let k = self.axis_to_index(vertex.z, self.bounds.min.z, self.bounds.max.z, mode)?;
        Some(PartitionKey::new(i, j, k))
    }

    fn axis_to_index(&self, value: f64, min: f64, max: f64, mode: ClampMode) -> Option<u32> {
        let last = self.partition_count - 1;
        if value < min {
            return mode.clamp_min.then_some(0);
        }
        if value > max {
            return mode.clamp_max.then_some(last);
        }
        let index = ((value - min) / self.partition_dimension as f64).floor() as u32;
        Some(index.min(last))
    }

    /// Slots of the partitions in the block between the box's mapped corners.
    fn intersecting_indices(&self, bounding_box: &BoundingBox) -> Vec<usize> {
        let Some(lo) = self.vertex_to_partition(bounding_box.min, ClampMode::LOW) else {
            return Vec::new();
        };
        let Some(hi) = self.vertex_to_partition(bounding_box.max, ClampMode::HIGH) else {
            return Vec::new();
        };

        let span = |a: u32, b: u32| (b + 1).saturating_sub(a) as usize;
        let mut indices = Vec::with_capacity(span(lo.i, hi.i) * span(lo.j, hi.j) * span(lo.k, hi.k));
        for i in lo.i..=hi.i {
            for j in lo.j..=hi.j {
                for k in lo.k..=hi.k {
                    indices.push(PartitionKey::new(i, j, k).linear(self.partition_count));
                }
            }
        }
        indices
    }

    /// Every partition in the closed block spanned by the box's corners.
    ///
    /// The min corner may clamp low and the max corner may clamp high, so a
    /// box partially inside the grid still finds the partitions it overlaps.
    /// Empty when the box lies wholly outside the grid.
    pub fn intersecting_partitions(&self, bounding_box: &BoundingBox) -> Vec<&Partition> {
        self.intersecting_indices(bounding_box)
            .into_iter()
            .map(|index| &self.partitions[index])
            .collect()
    }

    /// Entities in any partition the box overlaps, each listed once.
    ///
    /// These are broad-phase candidates; the caller filters out the querying
    /// entity and runs any exact overlap test itself.
    pub fn query_entities(&self, bounding_box: &BoundingBox) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for index in self.intersecting_indices(bounding_box) {
            for &id in &self.partitions[index].entities {
                if seen.insert(id) {
                    candidates.push(id);
                }
            }
        }
        candidates
    }

    /// Re-index each entity from its current bounding box, in input order.
    ///
    /// The entity leaves every partition it occupied before and joins every
    /// partition its box overlaps now. An entity whose box misses the grid
    /// stays in the reverse index with no partitions until it comes back.
    pub fn index_entities<'a, E, I>(&mut self, entities: I)
    where
        E: Spatial + ?Sized + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        let _span = tracing::debug_span!("index_entities").entered();
        let mut indexed = 0usize;
        let mut relocated = 0usize;

        for entity in entities {
            let id = entity.id();
            let next = self.intersecting_indices(&entity.bounding_box());
            let previous = self.entity_partitions.remove(&id).unwrap_or_default();

            for &index in &previous {
                self.partitions[index].entities.remove(&id);
            }
            for &index in &next {
                self.partitions[index].entities.insert(id);
            }

            if previous != next {
                relocated += 1;
            }
            indexed += 1;
            self.entity_partitions.insert(id, next);
        }

        tracing::trace!(indexed, relocated, "index pass complete");
    }

    /// Drop an entity from every partition and from the reverse index.
    /// Returns false if the entity was never indexed.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let Some(indices) = self.entity_partitions.remove(&id) else {
            return false;
        };
        for index in indices {
            self.partitions[index].entities.remove(&id);
        }
        tracing::debug!(%id, "entity removed from grid");
        true
    }

    /// Empty every partition. Partitions themselves are kept.
    pub fn clear(&mut self) {
        for partition in &mut self.partitions {
            partition.entities.clear();
        }
        self.entity_partitions.clear();
    }

    /// Whether the entity has been indexed (it may still occupy no partitions).
    pub fn contains(&self, id: EntityId) -> bool {
        self.entity_partitions.contains_key(&id)
    }

    /// Keys of the partitions the entity occupied after its last index pass.
    pub fn partitions_of(&self, id: EntityId) -> Vec<PartitionKey> {
        self.entity_partitions
            .get(&id)
            .map(|indices| indices.iter().map(|&i| self.partitions[i].key).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> GridStats {
        GridStats {
            partitions: self.partitions.len(),
            occupied_partitions: self.partitions.iter().filter(|p| !p.is_empty()).count(),
            indexed_entities: self.entity_partitions.len(),
            placements: self.partitions.iter().map(|p| p.len()).sum(),
        }
    }
}
