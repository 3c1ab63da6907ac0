// src/streaming/controller.rs

use crate::grid::{cell_world_position, CellData, GridPoint};
use crate::utils::geometry::WorldPoint;

/// A cell pinned visible independently of pawn distance. Negative tick
/// counts pin forever; positive counts decay once per streaming tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellVisibilityStatus {
    pub cell: GridPoint,
    pub ticks: i32,
}

/// Adds or replaces the forced-visibility entry for a cell.
pub fn set_cell_visibility_status(
    statuses: &mut Vec<CellVisibilityStatus>,
    cell: GridPoint,
    ticks: i32,
) {
    match statuses.iter_mut().find(|s| s.cell == cell) {
        Some(status) => status.ticks = ticks,
        None => statuses.push(CellVisibilityStatus { cell, ticks }),
    }
}

/// Decays positive counters and drops the expired ones. Negative
/// counters survive untouched until manually overridden.
pub fn tick_visibility_statuses(statuses: &mut Vec<CellVisibilityStatus>) {
    statuses.retain_mut(|status| {
        if status.ticks < 0 {
            return true;
        }
        if status.ticks == 0 {
            return false;
        }
        status.ticks -= 1;
        true
    });
}

/// Placement indexes of cells whose center distance to at least one
/// position lies in `[min, max)`, or `[min, max]` when `include_max`.
/// Results are appended uniquely onto `out`, so callers can seed it with
/// placements that must stay regardless of distance.
pub fn placements_between_positions(
    positions: &[WorldPoint],
    min: f64,
    max: f64,
    include_max: bool,
    cells: &[CellData],
    cell_size: f64,
    origin: &WorldPoint,
    out: &mut Vec<usize>,
) {
    for cell in cells {
        let Some(placement) = cell.placement_index else {
            continue;
        };
        if out.contains(&placement) {
            continue;
        }
        let center = cell_world_position(cell.id, cell_size, origin);
        let in_range = positions.iter().any(|p| {
            let d = center.distance_2d(p);
            d >= min && (d < max || include_max && d == max)
        });
        if in_range {
            out.push(placement);
        }
    }
}

/// Placement indexes covering any of the given cells.
pub fn placements_of_cells(cells_wanted: &[GridPoint], cells: &[CellData], out: &mut Vec<usize>) {
    for wanted in cells_wanted {
        let Some(placement) = cells
            .iter()
            .find(|c| c.id == *wanted)
            .and_then(|c| c.placement_index)
        else {
            continue;
        };
        if !out.contains(&placement) {
            out.push(placement);
        }
    }
}

/// All cell ids covered by the given placements.
pub fn cells_of_placements(placements: &[usize], cells: &[CellData]) -> Vec<GridPoint> {
    cells
        .iter()
        .filter(|c| c.placement_index.is_some_and(|p| placements.contains(&p)))
        .map(|c| c.id)
        .collect()
}
