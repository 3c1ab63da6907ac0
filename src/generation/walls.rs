// src/generation/walls.rs

use crate::grid::{min_distance_to_cells, CellData, CellKind, GridPoint};
use crate::layout::LayoutEntry;
use std::collections::HashSet;

/// Builds the single blocking layout: every empty grid cell whose ring
/// distance to the occupied footprint is within `[1, walls_cell_size]`
/// becomes a wall cell.
pub fn synthesize_walls(
    grid_size: GridPoint,
    occupied: &[CellData],
    walls_cell_size: i32,
) -> LayoutEntry {
    let mut entry = LayoutEntry::new(CellKind::Blocking, GridPoint::zero(), grid_size);
    if walls_cell_size <= 0 || occupied.is_empty() {
        return entry;
    }

    let taken: HashSet<GridPoint> = occupied.iter().map(|c| c.id).collect();
    for x in 0..grid_size.x {
        for y in 0..grid_size.y {
            let id = GridPoint::new(x, y);
            if taken.contains(&id) {
                continue;
            }
            let distance = min_distance_to_cells(id, walls_cell_size, occupied);
            if distance >= 1 && distance <= walls_cell_size {
                entry.cells.push(CellData::new(id, CellKind::Blocking));
            }
        }
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellKind;

    #[test]
    fn test_walls_ring_around_single_room() {
        let occupied = vec![
            CellData::new(GridPoint::new(3, 3), CellKind::Room),
            CellData::new(GridPoint::new(4, 3), CellKind::Room),
        ];
        let walls = synthesize_walls(GridPoint::new(10, 10), &occupied, 1);

        // One ring around a 2x1 room is 10 cells.
        assert_eq!(walls.cells.len(), 10);
        for cell in &walls.cells {
            assert_eq!(cell.kind, CellKind::Blocking);
            let d = min_distance_to_cells(cell.id, 1, &occupied);
            assert_eq!(d, 1);
        }
    }

    #[test]
    fn test_walls_thickness_two() {
        let occupied = vec![CellData::new(GridPoint::new(5, 5), CellKind::Room)];
        let walls = synthesize_walls(GridPoint::new(11, 11), &occupied, 2);
        // 5x5 block minus the center: 24 cells.
        assert_eq!(walls.cells.len(), 24);
    }

    #[test]
    fn test_no_walls_without_occupied_cells() {
        let walls = synthesize_walls(GridPoint::new(8, 8), &[], 2);
        assert!(walls.cells.is_empty());
    }
}
