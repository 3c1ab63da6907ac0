// src/streaming/spawn.rs

use crate::grid::{CellData, CellKind, GridPoint};
use crate::host::{ActorId, Transform};
use crate::layout::LayoutEntry;
use crate::utils::geometry::{clamp_anchor, Anchor};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How spawn cells are chosen for one actor class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorSpawnMode {
    /// A random occupied cell per roll.
    Anywhere,
    /// The start cell.
    PlayerStart,
    /// One cell in every room per roll.
    PerRoom,
    /// One cell in every room except the start room per roll.
    PerRoomButStart,
    /// One cell in every corridor per roll.
    PerCorridor,
}

/// One row of the actor spawn table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSpawnData {
    pub class_id: u32,
    /// Inclusive range of spawn rolls.
    pub amount: (u32, u32),
    /// Per-roll success chance, 0 to 100.
    pub chance: u32,
    pub mode: ActorSpawnMode,
    /// Fractional placement range inside the chosen region and cell.
    pub anchor_min: Anchor,
    pub anchor_max: Anchor,
}

/// Whether the tracked actor exists in the world yet. Spawning is
/// deferred until the level under the cell has loaded, since the ground
/// trace needs its geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnState {
    Pending,
    Placed {
        actor: ActorId,
        transform: Transform,
        visible: bool,
    },
}

/// One planned actor spawn, keyed to the placement whose visibility
/// drives it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSpawnTrack {
    pub spawn_data_index: usize,
    pub cell: GridPoint,
    /// Where inside the cell the actor stands.
    pub anchor: Anchor,
    pub state: SpawnState,
}

fn random_anchor(rng: &mut StdRng, data: &ActorSpawnData) -> Anchor {
    clamp_anchor((
        rng.random_range(data.anchor_min.0..=data.anchor_max.0),
        rng.random_range(data.anchor_min.1..=data.anchor_max.1),
    ))
}

/// Cell of a layout addressed by a fractional anchor over its bounding
/// box, snapped to the nearest carved cell.
fn layout_cell_at_anchor(layout: &LayoutEntry, anchor: Anchor) -> Option<GridPoint> {
    let target = GridPoint::new(
        layout.position.x + ((layout.size.x - 1).max(0) as f32 * anchor.0).round() as i32,
        layout.position.y + ((layout.size.y - 1).max(0) as f32 * anchor.1).round() as i32,
    );
    layout.closest_cell_to(target)
}

/// Rolls the spawn table into per-placement spawn tracks.
///
/// Every roll beats its chance or is skipped entirely; the per-layout
/// modes then emit one track per matching layout. Tracks start out
/// `Pending` and are resolved lazily when their level first shows.
pub fn generate_spawn_tracks(
    rng: &mut StdRng,
    spawn_data: &[ActorSpawnData],
    cells: &[CellData],
    layouts: &[LayoutEntry],
    start_cell: GridPoint,
    start_room_index: Option<usize>,
) -> HashMap<usize, Vec<ActorSpawnTrack>> {
    let mut tracks: HashMap<usize, Vec<ActorSpawnTrack>> = HashMap::new();

    for (data_index, data) in spawn_data.iter().enumerate() {
        let rolls = rng.random_range(data.amount.0..=data.amount.1);
        for _ in 0..rolls {
            if rng.random_range(0..=100) >= data.chance.min(100) {
                continue;
            }

            match data.mode {
                ActorSpawnMode::Anywhere => {
                    if cells.is_empty() {
                        continue;
                    }
                    let cell = cells[rng.random_range(0..cells.len())].id;
                    add_track(&mut tracks, rng, data_index, data, cell, cells);
                }
                ActorSpawnMode::PlayerStart => {
                    add_track(&mut tracks, rng, data_index, data, start_cell, cells);
                }
                ActorSpawnMode::PerRoom | ActorSpawnMode::PerRoomButStart => {
                    for (i, layout) in layouts.iter().enumerate() {
                        if layout.kind != CellKind::Room {
                            continue;
                        }
                        if data.mode == ActorSpawnMode::PerRoomButStart
                            && Some(i) == start_room_index
                        {
                            continue;
                        }
                        if let Some(cell) = layout_cell_at_anchor(layout, random_anchor(rng, data))
                        {
                            add_track(&mut tracks, rng, data_index, data, cell, cells);
                        }
                    }
                }
                ActorSpawnMode::PerCorridor => {
                    for layout in layouts.iter().filter(|l| l.kind == CellKind::Corridor) {
                        if let Some(cell) = layout_cell_at_anchor(layout, random_anchor(rng, data))
                        {
                            add_track(&mut tracks, rng, data_index, data, cell, cells);
                        }
                    }
                }
            }
        }
    }

    tracks
}

fn add_track(
    tracks: &mut HashMap<usize, Vec<ActorSpawnTrack>>,
    rng: &mut StdRng,
    data_index: usize,
    data: &ActorSpawnData,
    cell: GridPoint,
    cells: &[CellData],
) {
    let Some(placement_index) = cells
        .iter()
        .find(|c| c.id == cell)
        .and_then(|c| c.placement_index)
    else {
        log::error!("spawn cell {:?} has no placement, dropping track", cell);
        return;
    };

    tracks.entry(placement_index).or_default().push(ActorSpawnTrack {
        spawn_data_index: data_index,
        cell,
        anchor: random_anchor(rng, data),
        state: SpawnState::Pending,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellBiome, CellKind};
    use rand::SeedableRng;

    fn spawn_row(mode: ActorSpawnMode, amount: (u32, u32), chance: u32) -> ActorSpawnData {
        ActorSpawnData {
            class_id: 1,
            amount,
            chance,
            mode,
            anchor_min: (0.2, 0.2),
            anchor_max: (0.8, 0.8),
        }
    }

    fn room_with_placements(x: i32, y: i32, w: i32, h: i32) -> LayoutEntry {
        let mut layout =
            LayoutEntry::new(CellKind::Room, GridPoint::new(x, y), GridPoint::new(w, h));
        layout.set_biome(CellBiome::Unset);
        layout.fill_rect_cells();
        layout
    }

    fn cells_with_placement(layouts: &[LayoutEntry]) -> Vec<CellData> {
        let mut cells = Vec::new();
        for layout in layouts {
            for cell in &layout.cells {
                let mut c = cell.clone();
                c.placement_index = Some(cells.len());
                cells.push(c);
            }
        }
        cells
    }

    #[test]
    fn test_zero_chance_spawns_nothing() {
        let mut rng = StdRng::seed_from_u64(3);
        let layouts = vec![room_with_placements(0, 0, 3, 3)];
        let cells = cells_with_placement(&layouts);
        let tracks = generate_spawn_tracks(
            &mut rng,
            &[spawn_row(ActorSpawnMode::Anywhere, (5, 5), 0)],
            &cells,
            &layouts,
            GridPoint::zero(),
            None,
        );
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_per_room_but_start_skips_start_room() {
        let mut rng = StdRng::seed_from_u64(11);
        let layouts = vec![
            room_with_placements(0, 0, 2, 2),
            room_with_placements(10, 0, 2, 2),
        ];
        let cells = cells_with_placement(&layouts);
        let tracks = generate_spawn_tracks(
            &mut rng,
            &[spawn_row(ActorSpawnMode::PerRoomButStart, (1, 1), 100)],
            &cells,
            &layouts,
            GridPoint::zero(),
            Some(0),
        );

        let spawned: Vec<&ActorSpawnTrack> = tracks.values().flatten().collect();
        assert_eq!(spawned.len(), 1);
        assert!(layouts[1].contains_cell(spawned[0].cell));
        assert!(matches!(spawned[0].state, SpawnState::Pending));
    }

    #[test]
    fn test_player_start_tracks_land_on_start_cell() {
        let mut rng = StdRng::seed_from_u64(5);
        let layouts = vec![room_with_placements(0, 0, 2, 2)];
        let cells = cells_with_placement(&layouts);
        let start = GridPoint::new(1, 1);
        let tracks = generate_spawn_tracks(
            &mut rng,
            &[spawn_row(ActorSpawnMode::PlayerStart, (3, 3), 100)],
            &cells,
            &layouts,
            start,
            Some(0),
        );

        for track in tracks.values().flatten() {
            assert_eq!(track.cell, start);
            assert!(track.anchor.0 >= 0.2 && track.anchor.0 <= 0.8);
        }
    }
}
