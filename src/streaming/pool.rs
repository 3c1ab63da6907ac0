// src/streaming/pool.rs

use crate::generation::populate::LevelPlacement;
use crate::grid::cell_world_position;
use crate::host::InstanceId;
use crate::utils::geometry::WorldPoint;
use std::collections::HashMap;

/// Idle level instances keyed by level table row, ready to be moved and
/// shown instead of loading a fresh copy.
#[derive(Debug, Default)]
pub struct LevelPool {
    instances: HashMap<usize, Vec<InstanceId>>,
}

impl LevelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an instance to the pool. A duplicate id is ignored.
    pub fn add(&mut self, level_data_index: usize, instance: InstanceId) {
        let row = self.instances.entry(level_data_index).or_default();
        if !row.contains(&instance) {
            row.push(instance);
        }
    }

    /// Takes the oldest pooled instance for a row, if any.
    pub fn take(&mut self, level_data_index: usize) -> Option<InstanceId> {
        let row = self.instances.get_mut(&level_data_index)?;
        if row.is_empty() {
            return None;
        }
        Some(row.remove(0))
    }

    pub fn is_available(&self, level_data_index: usize) -> bool {
        self.instances
            .get(&level_data_index)
            .is_some_and(|row| !row.is_empty())
    }

    /// Drops an instance from whichever row holds it.
    pub fn remove_instance(&mut self, instance: InstanceId) {
        for row in self.instances.values_mut() {
            row.retain(|&id| id != instance);
        }
    }

    pub fn total(&self) -> usize {
        self.instances.values().map(Vec::len).sum()
    }

    pub fn drain_all(&mut self) -> Vec<InstanceId> {
        let all = self.instances.values().flatten().copied().collect();
        self.instances.clear();
        all
    }
}

/// How many pooled instances a level row needs so the streamer never runs
/// dry: the densest placement of that row plus every same-row placement
/// inside the streaming radius around it.
pub fn min_pool_size(
    level_data_index: usize,
    placements: &[LevelPlacement],
    cell_size: f64,
    origin: &WorldPoint,
    radius: f64,
) -> usize {
    let positions: Vec<WorldPoint> = placements
        .iter()
        .filter(|p| p.level_data_index == level_data_index)
        .map(|p| cell_world_position(p.grid_position, cell_size, origin))
        .collect();

    let mut needed = 0usize;
    for center in &positions {
        let nearby = positions
            .iter()
            .filter(|other| center.distance_2d(other) <= radius)
            .count();
        needed = needed.max(nearby);
    }
    needed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridPoint;

    #[test]
    fn test_take_consumes_oldest_and_empties() {
        let mut pool = LevelPool::new();
        pool.add(0, 11);
        pool.add(0, 12);
        pool.add(0, 12);
        assert_eq!(pool.total(), 2);

        assert_eq!(pool.take(0), Some(11));
        assert!(pool.is_available(0));
        assert_eq!(pool.take(0), Some(12));
        assert!(!pool.is_available(0));
        assert_eq!(pool.take(0), None);
        assert_eq!(pool.take(5), None);
    }

    #[test]
    fn test_remove_instance_makes_row_unavailable() {
        let mut pool = LevelPool::new();
        pool.add(2, 40);
        assert!(pool.is_available(2));
        pool.remove_instance(40);
        assert!(!pool.is_available(2));
    }

    fn placement(row: usize, x: i32, y: i32) -> LevelPlacement {
        LevelPlacement {
            level_data_index: row,
            grid_position: GridPoint::new(x, y),
            rotation: 0,
        }
    }

    #[test]
    fn test_min_pool_size_counts_clustered_placements() {
        let origin = WorldPoint::zero();
        let placements = vec![
            placement(0, 0, 0),
            placement(0, 1, 0),
            placement(0, 100, 100),
            placement(1, 0, 1),
        ];
        // Radius covers adjacent cells but not the far outlier.
        assert_eq!(min_pool_size(0, &placements, 700.0, &origin, 1000.0), 2);
        assert_eq!(min_pool_size(1, &placements, 700.0, &origin, 1000.0), 1);
        assert_eq!(min_pool_size(3, &placements, 700.0, &origin, 1000.0), 0);
    }
}
