// src/layout/ops.rs

use crate::config::DistanceMode;
use crate::grid::{CellData, CellKind, GridPoint};
use crate::layout::entry::LayoutEntry;
use crate::utils::geometry::Anchor;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashSet;

/// Grid extent covered by a set of normalized layouts.
pub fn layouts_grid_size(entries: &[LayoutEntry]) -> GridPoint {
    let mut size = GridPoint::zero();
    for entry in entries {
        size.x = size.x.max(entry.position.x + entry.size.x);
        size.y = size.y.max(entry.position.y + entry.size.y);
    }
    size
}

/// Shifts all entries so the smallest position lands on (0, 0).
pub fn normalize_positions(entries: &mut [LayoutEntry]) {
    let Some(first) = entries.first() else {
        return;
    };
    let mut min = first.position;
    for entry in entries.iter() {
        min.x = min.x.min(entry.position.x);
        min.y = min.y.min(entry.position.y);
    }
    for entry in entries.iter_mut() {
        entry.translate(-min.x, -min.y);
    }
}

/// Removes from each entry any cell already owned by `existing` or by an
/// earlier entry in the slice. Later entries lose contested cells.
pub fn dedup_cells(entries: &mut [LayoutEntry], existing: &[CellData]) {
    let mut seen: HashSet<GridPoint> = existing.iter().map(|c| c.id).collect();
    for entry in entries.iter_mut() {
        entry.cells.retain(|cell| seen.insert(cell.id));
    }
}

fn rects_overlap(a_pos: GridPoint, a_size: GridPoint, b_pos: GridPoint, b_size: GridPoint) -> bool {
    a_pos.x < b_pos.x + b_size.x
        && b_pos.x < a_pos.x + a_size.x
        && a_pos.y < b_pos.y + b_size.y
        && b_pos.y < a_pos.y + a_size.y
}

const PACK_ATTEMPTS: usize = 64;

/// Packs entries into a non-overlapping arrangement around the first one.
///
/// Each entry is attached to a randomly chosen placed entry, on a random
/// side. `distribution` biases the axis choice (1.0 = always horizontal),
/// separation per axis is drawn from `[min_sep, max_sep]` and interpreted
/// per `mode`. When every random attempt collides the entry is appended
/// past the right edge of the arrangement. Positions are normalized to
/// (0, 0) afterwards; carried cells are translated along.
pub fn pack_layouts(
    rng: &mut StdRng,
    distribution: f32,
    mode: DistanceMode,
    min_sep: (f32, f32),
    max_sep: (f32, f32),
    entries: &mut [LayoutEntry],
) {
    if entries.is_empty() {
        return;
    }

    let first_delta = entries[0].position;
    entries[0].translate(-first_delta.x, -first_delta.y);
    let mut placed: Vec<(GridPoint, GridPoint)> = vec![(entries[0].position, entries[0].size)];

    for i in 1..entries.len() {
        let size = entries[i].size;
        let mut target: Option<GridPoint> = None;

        for _ in 0..PACK_ATTEMPTS {
            let (anchor_pos, anchor_size) = placed[rng.random_range(0..placed.len())];
            let horizontal = rng.random::<f32>() < distribution;
            let positive = rng.random_bool(0.5);

            let sep_x = rng.random_range(min_sep.0..=max_sep.0).round() as i32;
            let sep_y = rng.random_range(min_sep.1..=max_sep.1).round() as i32;

            let candidate = side_position(
                rng, mode, anchor_pos, anchor_size, size, horizontal, positive, sep_x, sep_y,
            );

            let collides = placed
                .iter()
                .any(|(p, s)| rects_overlap(candidate, size, *p, *s));
            if !collides {
                target = Some(candidate);
                break;
            }
        }

        let position = target.unwrap_or_else(|| {
            // Fallback slot past the right edge, always free.
            let right = placed.iter().map(|(p, s)| p.x + s.x).max().unwrap_or(0);
            GridPoint::new(right + min_sep.0.round().max(1.0) as i32, 0)
        });

        let delta = GridPoint::new(position.x - entries[i].position.x, position.y - entries[i].position.y);
        entries[i].translate(delta.x, delta.y);
        placed.push((position, size));
    }

    normalize_positions(entries);
}

#[allow(clippy::too_many_arguments)]
fn side_position(
    rng: &mut StdRng,
    mode: DistanceMode,
    anchor_pos: GridPoint,
    anchor_size: GridPoint,
    size: GridPoint,
    horizontal: bool,
    positive: bool,
    sep_x: i32,
    sep_y: i32,
) -> GridPoint {
    // Random slide along the facing edge so attachments are not collinear.
    let slide_x = rng.random_range(-(size.x - 1).max(0)..=(anchor_size.x - 1).max(0));
    let slide_y = rng.random_range(-(size.y - 1).max(0)..=(anchor_size.y - 1).max(0));

    match mode {
        DistanceMode::BetweenSides => {
            if horizontal {
                let x = if positive {
                    anchor_pos.x + anchor_size.x + sep_x
                } else {
                    anchor_pos.x - size.x - sep_x
                };
                GridPoint::new(x, anchor_pos.y + slide_y)
            } else {
                let y = if positive {
                    anchor_pos.y + anchor_size.y + sep_y
                } else {
                    anchor_pos.y - size.y - sep_y
                };
                GridPoint::new(anchor_pos.x + slide_x, y)
            }
        }
        DistanceMode::BetweenCenters => {
            let anchor_center = GridPoint::new(
                anchor_pos.x + anchor_size.x / 2,
                anchor_pos.y + anchor_size.y / 2,
            );
            if horizontal {
                let cx = if positive {
                    anchor_center.x + sep_x
                } else {
                    anchor_center.x - sep_x
                };
                GridPoint::new(cx - size.x / 2, anchor_pos.y + slide_y)
            } else {
                let cy = if positive {
                    anchor_center.y + sep_y
                } else {
                    anchor_center.y - sep_y
                };
                GridPoint::new(anchor_pos.x + slide_x, cy - size.y / 2)
            }
        }
    }
}

/// Grid cell addressed by a fractional anchor over the whole grid.
pub fn grid_cell_at_anchor(grid_size: GridPoint, anchor: Anchor) -> GridPoint {
    GridPoint::new(
        ((grid_size.x - 1).max(0) as f32 * anchor.0.clamp(0.0, 1.0)).round() as i32,
        ((grid_size.y - 1).max(0) as f32 * anchor.1.clamp(0.0, 1.0)).round() as i32,
    )
}

/// Index of the entry of `kind` whose center cell is closest to the grid
/// anchor point.
pub fn closest_entry_to_anchor(
    entries: &[LayoutEntry],
    kind: CellKind,
    anchor: Anchor,
    grid_size: GridPoint,
) -> Option<usize> {
    let target = grid_cell_at_anchor(grid_size, anchor);
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind == kind && !e.cells.is_empty())
        .min_by_key(|(_, e)| {
            let c = e.center_cell();
            (c.ring_distance(&target), c.manhattan_distance(&target))
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellKind;
    use rand::SeedableRng;

    fn room(w: i32, h: i32) -> LayoutEntry {
        let mut entry = LayoutEntry::new(CellKind::Room, GridPoint::zero(), GridPoint::new(w, h));
        entry.fill_rect_cells();
        entry
    }

    #[test]
    fn test_pack_layouts_no_overlap() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut entries: Vec<LayoutEntry> =
            (0..12).map(|i| room(2 + (i % 3), 2 + (i % 2))).collect();
        pack_layouts(
            &mut rng,
            0.5,
            DistanceMode::BetweenSides,
            (1.0, 1.0),
            (2.0, 2.0),
            &mut entries,
        );

        let mut seen = HashSet::new();
        for entry in &entries {
            assert!(entry.position.x >= 0 && entry.position.y >= 0);
            for cell in &entry.cells {
                assert!(seen.insert(cell.id), "cell {:?} owned twice", cell.id);
            }
        }
    }

    #[test]
    fn test_dedup_cells_keeps_first_owner() {
        let mut a = room(2, 2);
        let mut b = room(2, 2);
        b.translate(1, 0); // overlaps column x=1
        let mut entries = vec![a.clone(), b];
        dedup_cells(&mut entries, &[]);
        assert_eq!(entries[0].cells.len(), 4);
        assert_eq!(entries[1].cells.len(), 2);

        // Existing grid cells win over every entry.
        a.translate(0, 0);
        let existing = a.cells.clone();
        let mut entries = vec![a];
        dedup_cells(&mut entries, &existing);
        assert!(entries[0].cells.is_empty());
    }

    #[test]
    fn test_grid_cell_at_anchor() {
        let size = GridPoint::new(11, 11);
        assert_eq!(grid_cell_at_anchor(size, (0.0, 0.0)), GridPoint::zero());
        assert_eq!(grid_cell_at_anchor(size, (1.0, 1.0)), GridPoint::new(10, 10));
        assert_eq!(grid_cell_at_anchor(size, (0.5, 0.5)), GridPoint::new(5, 5));
    }

    #[test]
    fn test_closest_entry_to_anchor_filters_kind() {
        let mut near = room(2, 2);
        near.translate(1, 1);
        let mut far = room(2, 2);
        far.translate(8, 8);
        let mut corridor = LayoutEntry::new(
            CellKind::Corridor,
            GridPoint::zero(),
            GridPoint::new(1, 1),
        );
        corridor.fill_rect_cells();

        let entries = vec![corridor, far, near];
        let idx = closest_entry_to_anchor(&entries, CellKind::Room, (0.0, 0.0), GridPoint::new(12, 12));
        assert_eq!(idx, Some(2));
    }
}
