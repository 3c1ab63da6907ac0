// src/grid/grid.rs

use crate::grid::cell::{CellData, GridPoint};
use crate::utils::geometry::{Anchor, WorldPoint};
use parking_lot::RwLock;
use std::sync::Arc;

/// The shared store of occupied grid cells.
///
/// Only occupied cells are stored; an absent id means an empty cell. The
/// store is shared between the tick thread and background workers, so all
/// access goes through the lock.
#[derive(Default, Clone)]
pub struct Grid {
    cells: Arc<RwLock<Vec<CellData>>>,
    size: Arc<RwLock<GridPoint>>,
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: Arc::new(RwLock::new(Vec::new())),
            size: Arc::new(RwLock::new(GridPoint::zero())),
        }
    }

    pub fn cells(&self) -> Arc<RwLock<Vec<CellData>>> {
        Arc::clone(&self.cells)
    }

    /// Copies the current cell list out of the lock.
    pub fn snapshot(&self) -> Vec<CellData> {
        self.cells.read().clone()
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    pub fn size(&self) -> GridPoint {
        *self.size.read()
    }

    pub fn set_size(&self, size: GridPoint) {
        *self.size.write() = size;
    }

    pub fn clear(&self) {
        self.cells.write().clear();
        *self.size.write() = GridPoint::zero();
    }

    pub fn append(&self, new_cells: Vec<CellData>) {
        self.cells.write().extend(new_cells);
    }

    /// Replaces cells that already exist (matched by id) and appends the
    /// rest.
    pub fn upsert(&self, new_cells: Vec<CellData>) {
        let mut cells = self.cells.write();
        for cell in new_cells {
            match cells.iter_mut().find(|c| c.id == cell.id) {
                Some(existing) => *existing = cell,
                None => cells.push(cell),
            }
        }
    }

    pub fn cell_at(&self, id: GridPoint) -> Option<CellData> {
        self.cells.read().iter().find(|c| c.id == id).cloned()
    }
}

pub fn find_cell_index(id: GridPoint, cells: &[CellData]) -> Option<usize> {
    cells.iter().position(|c| c.id == id)
}

/// Occupied orthogonal neighbors of `id`, in direction order.
pub fn adjacent_cells<'a>(id: GridPoint, cells: &'a [CellData]) -> Vec<&'a CellData> {
    crate::grid::cell::Direction::ALL
        .iter()
        .filter_map(|dir| {
            let neighbor = id.neighbor(*dir);
            cells.iter().find(|c| c.id == neighbor)
        })
        .collect()
}

/// Minimum and extent of the occupied cells, or `None` when empty.
pub fn cells_bounds(cells: &[CellData]) -> Option<(GridPoint, GridPoint)> {
    let first = cells.first()?;
    let mut min = first.id;
    let mut max = first.id;
    for cell in cells {
        min.x = min.x.min(cell.id.x);
        min.y = min.y.min(cell.id.y);
        max.x = max.x.max(cell.id.x);
        max.y = max.y.max(cell.id.y);
    }
    Some((min, GridPoint::new(max.x - min.x + 1, max.y - min.y + 1)))
}

/// Minimum ring distance from `origin` to any occupied cell, capped at
/// `max_distance`. Returns `max_distance + 1` when no occupied cell lies
/// within the cap, and 0 when `origin` itself is occupied.
pub fn min_distance_to_cells(origin: GridPoint, max_distance: i32, cells: &[CellData]) -> i32 {
    let mut best = max_distance + 1;
    for cell in cells {
        let d = origin.ring_distance(&cell.id);
        if d < best {
            best = d;
            if best == 0 {
                break;
            }
        }
    }
    best
}

/// World position of a cell's center.
pub fn cell_world_position(id: GridPoint, cell_size: f64, origin: &WorldPoint) -> WorldPoint {
    cell_world_position_at_anchor(id, cell_size, origin, (0.5, 0.5))
}

/// World position of a point inside a cell, given a fractional anchor.
pub fn cell_world_position_at_anchor(
    id: GridPoint,
    cell_size: f64,
    origin: &WorldPoint,
    anchor: Anchor,
) -> WorldPoint {
    WorldPoint::new(
        origin.x + (id.x as f64 + anchor.0 as f64) * cell_size,
        origin.y + (id.y as f64 + anchor.1 as f64) * cell_size,
        origin.z,
    )
}

/// Planar world distance between two cell centers.
pub fn cell_world_distance(a: GridPoint, b: GridPoint, cell_size: f64, origin: &WorldPoint) -> f64 {
    cell_world_position(a, cell_size, origin).distance_2d(&cell_world_position(b, cell_size, origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::cell::CellKind;
    use assert_approx_eq::assert_approx_eq;

    fn cell(x: i32, y: i32) -> CellData {
        CellData::new(GridPoint::new(x, y), CellKind::Room)
    }

    #[test]
    fn test_default_grid_starts_empty() {
        let grid = Grid::default();
        assert!(grid.is_empty());
        assert_eq!(grid.size(), GridPoint::zero());
        assert_eq!(GridPoint::default(), GridPoint::zero());
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let grid = Grid::new();
        grid.append(vec![cell(0, 0), cell(1, 0)]);

        let mut updated = cell(1, 0);
        updated.kind = CellKind::Corridor;
        grid.upsert(vec![updated, cell(2, 0)]);

        assert_eq!(grid.len(), 3);
        assert_eq!(grid.cell_at(GridPoint::new(1, 0)).unwrap().kind, CellKind::Corridor);
    }

    #[test]
    fn test_adjacent_cells_orthogonal_only() {
        let cells = vec![cell(0, 1), cell(1, 1), cell(1, 0), cell(2, 2)];
        let adjacent = adjacent_cells(GridPoint::new(1, 1), &cells);
        // Up (1,2) and diagonal (2,2) are not neighbors of (1,1).
        assert_eq!(adjacent.len(), 2);
    }

    #[test]
    fn test_cells_bounds() {
        let cells = vec![cell(-1, 2), cell(3, 0), cell(0, 0)];
        let (min, size) = cells_bounds(&cells).unwrap();
        assert_eq!(min, GridPoint::new(-1, 0));
        assert_eq!(size, GridPoint::new(5, 3));
        assert!(cells_bounds(&[]).is_none());
    }

    #[test]
    fn test_min_distance_to_cells_cap() {
        let cells = vec![cell(5, 5)];
        assert_eq!(min_distance_to_cells(GridPoint::new(0, 0), 3, &cells), 4);
        assert_eq!(min_distance_to_cells(GridPoint::new(4, 5), 3, &cells), 1);
        assert_eq!(min_distance_to_cells(GridPoint::new(5, 5), 3, &cells), 0);
    }

    #[test]
    fn test_cell_world_position_anchored() {
        let origin = WorldPoint::zero();
        let center = cell_world_position(GridPoint::new(1, 0), 700.0, &origin);
        assert_approx_eq!(center.x, 1050.0);
        assert_approx_eq!(center.y, 350.0);

        let corner = cell_world_position_at_anchor(GridPoint::new(1, 0), 700.0, &origin, (0.0, 0.0));
        assert_approx_eq!(corner.x, 700.0);
        assert_approx_eq!(corner.y, 0.0);
    }
}
