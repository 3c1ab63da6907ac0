// src/generation/biomes.rs

use crate::grid::{adjacent_cells, BiomeTag, CellBiome, CellData, CellKind};
use crate::layout::LayoutEntry;
use log::error;
use std::collections::HashMap;

const WALL_RESOLVE_MAX_PASSES: usize = 200;

/// Assigns biomes to wall cells from their surroundings.
///
/// The first pass adopts from orthogonal Room/Corridor neighbors in the
/// whole grid. Remaining gaps (wall cells only touching other walls) are
/// then flooded wall-to-wall until nothing is left unset, capped at 200
/// passes. Running it again on fully resolved input changes nothing.
pub fn resolve_wall_biomes(possible: &[BiomeTag], global_cells: &[CellData], walls: &mut [CellData]) {
    for i in 0..walls.len() {
        if !walls[i].biome.is_unset() {
            continue;
        }
        let adopted = adjacent_cells(walls[i].id, global_cells)
            .into_iter()
            .filter(|n| matches!(n.kind, CellKind::Room | CellKind::Corridor))
            .find_map(|n| n.biome.tag().filter(|t| possible.contains(t)).cloned());
        if let Some(tag) = adopted {
            walls[i].biome = CellBiome::Tag(tag);
        }
    }

    let mut passes = 0;
    while walls.iter().any(|c| c.biome.is_unset()) {
        if passes >= WALL_RESOLVE_MAX_PASSES {
            error!(
                "wall biome resolution did not converge; {} cells left unset",
                walls.iter().filter(|c| c.biome.is_unset()).count()
            );
            break;
        }
        passes += 1;
        let snapshot: Vec<CellData> = walls.to_vec();
        for i in 0..walls.len() {
            if !walls[i].biome.is_unset() {
                continue;
            }
            let adopted = adjacent_cells(walls[i].id, &snapshot)
                .into_iter()
                .find_map(|n| n.biome.tag().cloned());
            if let Some(tag) = adopted {
                walls[i].biome = CellBiome::Tag(tag);
            }
        }
    }
}

fn has_foreign_neighbor(cell: &CellData, cells: &[CellData]) -> bool {
    let Some(own) = cell.biome.tag() else {
        return false;
    };
    adjacent_cells(cell.id, cells)
        .into_iter()
        .any(|n| n.biome.tag().is_some_and(|t| t != own))
}

/// Turns cells on biome borders into transition cells.
///
/// Works biome by biome over the configured pool, repeating until a full
/// sweep mutates nothing. Room cells are spared on the first sweep so
/// borders eat into corridors and walls before they eat into rooms.
/// Returns the mutated cells in their final state.
pub fn mutate_transition_cells(possible: &[BiomeTag], cells: &mut [CellData]) -> Vec<CellData> {
    let mut mutated: HashMap<crate::grid::GridPoint, CellData> = HashMap::new();
    let mut first_sweep = true;
    loop {
        let mut changed = false;
        for biome in possible {
            let marks: Vec<usize> = cells
                .iter()
                .enumerate()
                .filter(|(_, c)| {
                    c.biome.tag() == Some(biome)
                        && !(first_sweep && c.kind == CellKind::Room)
                        && has_foreign_neighbor(c, cells)
                })
                .map(|(i, _)| i)
                .collect();
            for i in marks {
                cells[i].biome = CellBiome::Transition;
                mutated.insert(cells[i].id, cells[i].clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
        first_sweep = false;
    }
    mutated.into_values().collect()
}

/// Pushes mutated cells back into the layout entries that own them.
pub fn apply_mutations_to_layouts(mutated: &[CellData], layouts: &mut [LayoutEntry]) {
    for layout in layouts.iter_mut() {
        for cell in &mut layout.cells {
            if let Some(new) = mutated.iter().find(|m| m.id == cell.id) {
                cell.biome = new.biome.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellKind, GridPoint};

    fn tag(name: &str) -> BiomeTag {
        BiomeTag::new(name)
    }

    fn cell(x: i32, y: i32, kind: CellKind, biome: CellBiome) -> CellData {
        CellData::with_biome(GridPoint::new(x, y), kind, biome)
    }

    #[test]
    fn test_wall_resolution_adopts_from_rooms_then_floods() {
        let pool = vec![tag("cave")];
        // Room at x=0, walls stretching away from it at x=1..=3.
        let room = cell(0, 0, CellKind::Room, CellBiome::Tag(tag("cave")));
        let mut walls = vec![
            cell(1, 0, CellKind::Blocking, CellBiome::Unset),
            cell(2, 0, CellKind::Blocking, CellBiome::Unset),
            cell(3, 0, CellKind::Blocking, CellBiome::Unset),
        ];
        let mut global = vec![room];
        global.extend(walls.clone());

        resolve_wall_biomes(&pool, &global, &mut walls);
        for wall in &walls {
            assert_eq!(wall.biome.tag(), Some(&tag("cave")));
        }
    }

    #[test]
    fn test_wall_resolution_is_idempotent() {
        let pool = vec![tag("cave"), tag("forest")];
        let global = vec![cell(0, 0, CellKind::Room, CellBiome::Tag(tag("cave")))];
        let mut walls = vec![
            cell(1, 0, CellKind::Blocking, CellBiome::Tag(tag("cave"))),
            cell(2, 0, CellKind::Blocking, CellBiome::Tag(tag("forest"))),
        ];
        let before = walls.clone();
        resolve_wall_biomes(&pool, &global, &mut walls);
        assert_eq!(walls, before);
    }

    #[test]
    fn test_mutation_marks_border_cells() {
        let pool = vec![tag("cave"), tag("forest")];
        // Corridor border between two biomes.
        let mut cells = vec![
            cell(0, 0, CellKind::Corridor, CellBiome::Tag(tag("cave"))),
            cell(1, 0, CellKind::Corridor, CellBiome::Tag(tag("forest"))),
            cell(2, 0, CellKind::Corridor, CellBiome::Tag(tag("forest"))),
        ];
        let mutated = mutate_transition_cells(&pool, &mut cells);

        // The first biome in the pool mutates first; once its border
        // cell is a transition, the forest side has no foreign concrete
        // neighbor left and stays as it is.
        assert!(cells[0].biome.is_transition());
        assert!(!cells[1].biome.is_transition());
        assert!(!cells[2].biome.is_transition());
        assert_eq!(mutated.len(), 1);
    }

    #[test]
    fn test_mutation_spares_rooms_on_first_sweep() {
        let pool = vec![tag("cave"), tag("forest")];
        let mut cells = vec![
            cell(0, 0, CellKind::Room, CellBiome::Tag(tag("cave"))),
            cell(1, 0, CellKind::Corridor, CellBiome::Tag(tag("forest"))),
        ];
        let _ = mutate_transition_cells(&pool, &mut cells);
        // The corridor cell mutates first; by the second sweep the room
        // no longer borders a foreign concrete biome.
        assert!(!cells[0].biome.is_transition());
        assert!(cells[1].biome.is_transition());
    }

    #[test]
    fn test_apply_mutations_to_layouts() {
        let mut layout = LayoutEntry::new(CellKind::Corridor, GridPoint::zero(), GridPoint::new(2, 1));
        layout.set_biome(CellBiome::Tag(tag("cave")));
        layout.fill_rect_cells();
        let mutated = vec![cell(1, 0, CellKind::Corridor, CellBiome::Transition)];
        apply_mutations_to_layouts(&mutated, std::slice::from_mut(&mut layout));
        assert!(layout.cells.iter().any(|c| c.id == GridPoint::new(1, 0) && c.biome.is_transition()));
        assert!(layout.cells.iter().any(|c| c.id == GridPoint::new(0, 0) && !c.biome.is_transition()));
    }
}
