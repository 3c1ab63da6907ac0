// src/layout/entry.rs

use crate::grid::{cells_bounds, CellBiome, CellData, CellKind, GridPoint};
use crate::grid::cell_world_position;
use crate::utils::geometry::WorldPoint;
use serde::{Deserialize, Serialize};

/// One contiguous region of generated cells: a room, a corridor chunk, or
/// the walls footprint. `position`/`size` are the bounding box in grid
/// coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub grid_id: usize,
    pub kind: CellKind,
    pub position: GridPoint,
    pub size: GridPoint,
    pub biome: CellBiome,
    pub cells: Vec<CellData>,
}

impl LayoutEntry {
    pub fn new(kind: CellKind, position: GridPoint, size: GridPoint) -> Self {
        Self {
            grid_id: 0,
            kind,
            position,
            size,
            biome: CellBiome::Unset,
            cells: Vec::new(),
        }
    }

    /// Fills the bounding box with cells of this entry's kind and biome.
    /// Used for rectangular rooms; corridors carve their cells directly.
    pub fn fill_rect_cells(&mut self) {
        self.cells.clear();
        for x in 0..self.size.x {
            for y in 0..self.size.y {
                self.cells.push(CellData::with_biome(
                    self.position.offset(x, y),
                    self.kind,
                    self.biome.clone(),
                ));
            }
        }
    }

    /// Shifts the entry and all of its cells.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.position = self.position.offset(dx, dy);
        for cell in &mut self.cells {
            cell.id = cell.id.offset(dx, dy);
        }
    }

    /// Recomputes the bounding box from the carved cells.
    pub fn fit_bounds_to_cells(&mut self) {
        if let Some((min, size)) = cells_bounds(&self.cells) {
            self.position = min;
            self.size = size;
        } else {
            self.size = GridPoint::zero();
        }
    }

    /// Assigns a biome to the entry and to every cell that has none yet.
    pub fn set_biome(&mut self, biome: CellBiome) {
        for cell in &mut self.cells {
            if cell.biome.is_unset() {
                cell.biome = biome.clone();
            }
        }
        self.biome = biome;
    }

    pub fn contains_cell(&self, id: GridPoint) -> bool {
        self.cells.iter().any(|c| c.id == id)
    }

    /// Bounding-box center in fractional grid coordinates.
    pub fn center(&self) -> (f64, f64) {
        (
            self.position.x as f64 + self.size.x as f64 / 2.0,
            self.position.y as f64 + self.size.y as f64 / 2.0,
        )
    }

    /// Grid cell nearest the bounding-box center.
    pub fn center_cell(&self) -> GridPoint {
        GridPoint::new(
            self.position.x + self.size.x / 2,
            self.position.y + self.size.y / 2,
        )
    }

    pub fn center_world(&self, cell_size: f64, origin: &WorldPoint) -> WorldPoint {
        cell_world_position(self.center_cell(), cell_size, origin)
    }

    /// The cell of this entry closest to `target`, by ring distance.
    pub fn closest_cell_to(&self, target: GridPoint) -> Option<GridPoint> {
        self.cells
            .iter()
            .min_by_key(|c| (c.id.ring_distance(&target), c.id.manhattan_distance(&target)))
            .map(|c| c.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_and_translate() {
        let mut entry = LayoutEntry::new(CellKind::Room, GridPoint::new(2, 3), GridPoint::new(2, 2));
        entry.fill_rect_cells();
        assert_eq!(entry.cells.len(), 4);
        assert!(entry.contains_cell(GridPoint::new(3, 4)));

        entry.translate(-2, -3);
        assert_eq!(entry.position, GridPoint::zero());
        assert!(entry.contains_cell(GridPoint::new(1, 1)));
        assert!(!entry.contains_cell(GridPoint::new(3, 4)));
    }

    #[test]
    fn test_fit_bounds_to_cells() {
        let mut entry = LayoutEntry::new(CellKind::Corridor, GridPoint::zero(), GridPoint::zero());
        entry.cells = vec![
            CellData::new(GridPoint::new(4, 1), CellKind::Corridor),
            CellData::new(GridPoint::new(4, 5), CellKind::Corridor),
        ];
        entry.fit_bounds_to_cells();
        assert_eq!(entry.position, GridPoint::new(4, 1));
        assert_eq!(entry.size, GridPoint::new(1, 5));
    }

    #[test]
    fn test_closest_cell_to() {
        let mut entry = LayoutEntry::new(CellKind::Room, GridPoint::zero(), GridPoint::new(3, 1));
        entry.fill_rect_cells();
        assert_eq!(entry.closest_cell_to(GridPoint::new(10, 0)), Some(GridPoint::new(2, 0)));
    }
}
