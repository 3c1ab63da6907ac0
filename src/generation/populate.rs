// src/generation/populate.rs

use crate::error::LevelGenError;
use crate::grid::{BiomeTag, CellData, CellKind, GridPoint};
use crate::layout::LayoutEntry;
use log::error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One row of the level data table: a placeable level asset and the
/// constraints on where it may land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelData {
    pub name: String,
    /// Square footprint side, in cells.
    pub size: i32,
    pub kind: CellKind,
    /// Allowed biomes; empty means any.
    #[serde(default)]
    pub biomes: Vec<BiomeTag>,
    /// May cover transition cells (single-cell levels only).
    #[serde(default)]
    pub supports_transition: bool,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Foliage in this level may be moved when the instance is reused.
    #[serde(default)]
    pub allow_reposition: bool,
}

fn default_weight() -> f32 {
    1.0
}

fn default_enabled() -> bool {
    true
}

/// Parses a JSON level table and keeps the enabled rows.
pub fn load_level_table(json: &str) -> Result<Vec<LevelData>, LevelGenError> {
    let rows: Vec<LevelData> = serde_json::from_str(json)?;
    let enabled: Vec<LevelData> = rows.into_iter().filter(|r| r.enabled).collect();
    if enabled.is_empty() {
        return Err(LevelGenError::EmptyLevelTable);
    }
    Ok(enabled)
}

/// Veto point for (row, cell) pairs during population.
pub trait PopulateCondition: Send + Sync {
    fn allows(&self, level: &LevelData, cell: &CellData) -> bool;
}

/// Restricts one named level to an explicit set of biomes, regardless of
/// what its table row says.
pub struct BiomeRestriction {
    pub level_name: String,
    pub allowed: Vec<BiomeTag>,
}

impl PopulateCondition for BiomeRestriction {
    fn allows(&self, level: &LevelData, cell: &CellData) -> bool {
        if level.name != self.level_name {
            return true;
        }
        match cell.biome.tag() {
            Some(tag) => self.allowed.contains(tag),
            None => false,
        }
    }
}

/// A placed level: which table row, where, and how it is turned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelPlacement {
    pub level_data_index: usize,
    pub grid_position: GridPoint,
    /// Quarter turns, 0 to 3.
    pub rotation: u8,
}

/// Shared inputs for one population worker.
#[derive(Clone)]
pub struct PopulateParams {
    pub transition_enabled: bool,
    pub levels: Arc<Vec<LevelData>>,
    pub conditions: Arc<Vec<Box<dyn PopulateCondition>>>,
}

/// Output of one population worker. Placement indexes inside `cells` are
/// local; the merge step offsets them.
#[derive(Debug, Clone)]
pub struct PopulateResult {
    pub layout_grid_id: usize,
    pub kind: CellKind,
    pub placements: Vec<LevelPlacement>,
    pub cells: Vec<CellData>,
}

/// Worker body: greedily covers the layout's cells with weighted random
/// level placements. Every covered cell gets its local placement index;
/// cells no row can cover are logged and left unassigned.
pub fn populate_layout(seed: u64, params: PopulateParams, layout: LayoutEntry) -> PopulateResult {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cells = layout.cells.clone();
    cells.sort_by_key(|c| (c.id.y, c.id.x));

    let index_of: HashMap<GridPoint, usize> =
        cells.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
    let mut covered = vec![false; cells.len()];
    let mut placements: Vec<LevelPlacement> = Vec::new();
    let mut uncoverable = 0usize;

    for i in 0..cells.len() {
        if covered[i] {
            continue;
        }
        let candidates = fitting_rows(&params, &cells, &index_of, &covered, i);
        let Some(row_index) = weighted_pick(&mut rng, &candidates, &params.levels) else {
            uncoverable += 1;
            continue;
        };

        let placement_index = placements.len();
        let size = params.levels[row_index].size.max(1);
        let origin = cells[i].id;
        for dx in 0..size {
            for dy in 0..size {
                if let Some(&j) = index_of.get(&origin.offset(dx, dy)) {
                    covered[j] = true;
                    cells[j].placement_index = Some(placement_index);
                }
            }
        }
        placements.push(LevelPlacement {
            level_data_index: row_index,
            grid_position: origin,
            rotation: rng.random_range(0..4) as u8,
        });
    }

    if uncoverable > 0 {
        error!(
            "no level row fits {} cell(s) of layout {}; they stay unassigned",
            uncoverable, layout.grid_id
        );
    }

    PopulateResult {
        layout_grid_id: layout.grid_id,
        kind: layout.kind,
        placements,
        cells,
    }
}

/// Table rows that can legally cover `cells[at]` with their full
/// footprint.
fn fitting_rows(
    params: &PopulateParams,
    cells: &[CellData],
    index_of: &HashMap<GridPoint, usize>,
    covered: &[bool],
    at: usize,
) -> Vec<usize> {
    let cell = &cells[at];
    params
        .levels
        .iter()
        .enumerate()
        .filter(|(_, row)| row.kind == cell.kind)
        .filter(|(_, row)| {
            if cell.biome.is_transition() {
                return params.transition_enabled && row.supports_transition && row.size <= 1;
            }
            if !row.biomes.is_empty() {
                match cell.biome.tag() {
                    Some(tag) => {
                        if !row.biomes.contains(tag) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            footprint_fits(cell, row.size.max(1), cells, index_of, covered)
        })
        .filter(|(_, row)| params.conditions.iter().all(|c| c.allows(row, cell)))
        .map(|(i, _)| i)
        .collect()
}

/// The whole `size` x `size` square must be inside the layout, uncovered
/// and biome-uniform with the corner cell.
fn footprint_fits(
    corner: &CellData,
    size: i32,
    cells: &[CellData],
    index_of: &HashMap<GridPoint, usize>,
    covered: &[bool],
) -> bool {
    for dx in 0..size {
        for dy in 0..size {
            let Some(&j) = index_of.get(&corner.id.offset(dx, dy)) else {
                return false;
            };
            if covered[j] || cells[j].biome != corner.biome {
                return false;
            }
        }
    }
    true
}

fn weighted_pick(rng: &mut StdRng, candidates: &[usize], levels: &[LevelData]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    let total: f32 = candidates.iter().map(|&i| levels[i].weight.max(0.0)).sum();
    if total <= 0.0 {
        return Some(candidates[0]);
    }
    let mut roll = rng.random_range(0.0..total);
    for &i in candidates {
        roll -= levels[i].weight.max(0.0);
        if roll <= 0.0 {
            return Some(i);
        }
    }
    candidates.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellBiome, CellKind};

    fn row(name: &str, size: i32, kind: CellKind) -> LevelData {
        LevelData {
            name: name.into(),
            size,
            kind,
            biomes: Vec::new(),
            supports_transition: false,
            weight: 1.0,
            enabled: true,
            allow_reposition: false,
        }
    }

    fn room_layout(w: i32, h: i32, biome: CellBiome) -> LayoutEntry {
        let mut layout = LayoutEntry::new(CellKind::Room, GridPoint::zero(), GridPoint::new(w, h));
        layout.set_biome(biome);
        layout.fill_rect_cells();
        layout
    }

    fn params(levels: Vec<LevelData>) -> PopulateParams {
        PopulateParams {
            transition_enabled: true,
            levels: Arc::new(levels),
            conditions: Arc::new(Vec::new()),
        }
    }

    #[test]
    fn test_load_level_table_filters_disabled() {
        let json = r#"[
            {"name": "a", "size": 1, "kind": "Room"},
            {"name": "b", "size": 1, "kind": "Room", "enabled": false}
        ]"#;
        let rows = load_level_table(json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "a");

        let all_disabled = r#"[{"name": "a", "size": 1, "kind": "Room", "enabled": false}]"#;
        assert!(matches!(
            load_level_table(all_disabled),
            Err(LevelGenError::EmptyLevelTable)
        ));
    }

    #[test]
    fn test_every_cell_covered_by_exactly_one_placement() {
        let layout = room_layout(4, 3, CellBiome::Tag(BiomeTag::new("cave")));
        let result = populate_layout(9, params(vec![row("tile", 1, CellKind::Room)]), layout);

        assert_eq!(result.cells.len(), 12);
        assert_eq!(result.placements.len(), 12);
        for cell in &result.cells {
            let idx = cell.placement_index.expect("uncovered cell");
            assert!(idx < result.placements.len());
        }
    }

    #[test]
    fn test_large_footprints_fill_without_overlap() {
        let layout = room_layout(4, 4, CellBiome::Tag(BiomeTag::new("cave")));
        let levels = vec![row("big", 2, CellKind::Room), row("tile", 1, CellKind::Room)];
        let result = populate_layout(4, params(levels), layout);

        let mut per_placement: HashMap<usize, usize> = HashMap::new();
        for cell in &result.cells {
            *per_placement.entry(cell.placement_index.unwrap()).or_default() += 1;
        }
        for (placement, count) in per_placement {
            let size = result.placements[placement].level_data_index;
            let expected = if size == 0 { 4 } else { 1 };
            assert_eq!(count, expected);
        }
    }

    #[test]
    fn test_transition_cells_need_transition_rows() {
        let mut layout = room_layout(2, 1, CellBiome::Tag(BiomeTag::new("cave")));
        layout.cells[0].biome = CellBiome::Transition;

        let mut plain = row("tile", 1, CellKind::Room);
        plain.biomes = vec![BiomeTag::new("cave")];
        let mut trans = row("trans", 1, CellKind::Room);
        trans.supports_transition = true;
        // Biome lists are ignored on transition cells but still bind on
        // plain ones, so this row can only land on the transition cell.
        trans.biomes = vec![BiomeTag::new("moss")];

        let result = populate_layout(2, params(vec![plain, trans]), layout);
        for cell in &result.cells {
            let placement = &result.placements[cell.placement_index.unwrap()];
            if cell.biome.is_transition() {
                assert_eq!(placement.level_data_index, 1);
            } else {
                assert_eq!(placement.level_data_index, 0);
            }
        }
    }

    #[test]
    fn test_condition_vetoes_row() {
        let levels = vec![row("forbidden", 1, CellKind::Room), row("ok", 1, CellKind::Room)];
        let condition: Box<dyn PopulateCondition> = Box::new(BiomeRestriction {
            level_name: "forbidden".into(),
            allowed: vec![BiomeTag::new("forest")],
        });
        let p = PopulateParams {
            transition_enabled: true,
            levels: Arc::new(levels),
            conditions: Arc::new(vec![condition]),
        };
        let result = populate_layout(8, p, room_layout(2, 2, CellBiome::Tag(BiomeTag::new("cave"))));
        for cell in &result.cells {
            let placement = &result.placements[cell.placement_index.unwrap()];
            assert_eq!(placement.level_data_index, 1);
        }
    }
}
