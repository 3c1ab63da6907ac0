// src/config.rs

use crate::grid::BiomeTag;
use crate::utils::geometry::Anchor;
use serde::{Deserialize, Serialize};

/// How room separation distances are measured during packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMode {
    /// Separation is the gap between facing edges.
    BetweenSides,
    /// Separation is measured center to center.
    BetweenCenters,
}

/// How a corridor path is chosen between two rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorridorPathSelection {
    /// Always carve the minimum-length path.
    Shortest,
    /// Allow a random detour of up to `corridor_threshold` extra cells.
    Threshold,
}

/// Everything the generation and streaming pipeline is parameterized on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// World side length of one grid cell.
    pub cell_size: f64,
    /// World origin of cell (0, 0).
    pub grid_origin_x: f64,
    pub grid_origin_y: f64,
    pub grid_origin_z: f64,

    // Rooms.
    /// Inclusive range for the total number of rooms.
    pub rooms_amount: (u32, u32),
    /// Target rooms per area worker.
    pub rooms_per_area: u32,
    pub min_room_size: (i32, i32),
    pub max_room_size: (i32, i32),
    /// Horizontal/vertical placement bias for rooms, in [0, 1].
    pub rooms_distribution: f32,
    pub min_room_separation: (f32, f32),
    pub max_room_separation: (f32, f32),
    pub room_separation_mode: DistanceMode,

    // Areas.
    /// Horizontal/vertical placement bias for area sub-layouts, in [0, 1].
    pub area_distribution: f32,
    pub min_area_separation: (f32, f32),
    pub max_area_separation: (f32, f32),
    pub area_separation_mode: DistanceMode,

    // Corridors.
    pub corridor_path_selection: CorridorPathSelection,
    /// Extra cells allowed over the minimum path length.
    pub corridor_threshold: i32,
    pub max_corridor_threads: usize,
    /// Fraction of the room count added back as circular corridors.
    pub circular_corridors_percent: f32,
    /// Candidate edges longer than this many cells are never circular.
    pub max_circular_corridor_cells: i32,

    // Walls.
    /// Ring thickness of blocking cells around the occupied footprint.
    pub walls_cell_size: i32,

    // Biomes.
    pub possible_biomes: Vec<BiomeTag>,
    pub transition_enabled: bool,

    // Start room.
    pub start_room_anchor: Anchor,
    pub start_cell_anchor: Anchor,

    // Streaming.
    pub load_distance: f64,
    pub load_distance_tolerance: f64,
    pub use_level_pool: bool,
    pub create_levels_at_runtime: bool,
    pub start_levels_block_on_load: bool,
    pub runtime_levels_block_on_load: bool,
    /// Also stream around tracked actors, not only players.
    pub track_tagged_actors: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            cell_size: 700.0,
            grid_origin_x: 0.0,
            grid_origin_y: 0.0,
            grid_origin_z: 0.0,
            rooms_amount: (10, 10),
            rooms_per_area: 8,
            min_room_size: (2, 2),
            max_room_size: (4, 4),
            rooms_distribution: 0.5,
            min_room_separation: (1.0, 1.0),
            max_room_separation: (2.0, 2.0),
            room_separation_mode: DistanceMode::BetweenSides,
            area_distribution: 0.5,
            min_area_separation: (1.0, 1.0),
            max_area_separation: (2.0, 2.0),
            area_separation_mode: DistanceMode::BetweenSides,
            corridor_path_selection: CorridorPathSelection::Shortest,
            corridor_threshold: 2,
            max_corridor_threads: 10,
            circular_corridors_percent: 0.3,
            max_circular_corridor_cells: 10,
            walls_cell_size: 2,
            possible_biomes: Vec::new(),
            transition_enabled: true,
            start_room_anchor: (0.0, 0.0),
            start_cell_anchor: (0.0, 0.0),
            load_distance: 2100.0,
            load_distance_tolerance: 500.0,
            use_level_pool: false,
            create_levels_at_runtime: true,
            start_levels_block_on_load: true,
            runtime_levels_block_on_load: false,
            track_tagged_actors: false,
        }
    }
}

impl GenerationConfig {
    pub fn grid_origin(&self) -> crate::utils::geometry::WorldPoint {
        crate::utils::geometry::WorldPoint::new(
            self.grid_origin_x,
            self.grid_origin_y,
            self.grid_origin_z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_json_round_trip_with_defaults() {
        let json = r#"{
            "rooms_amount": [12, 20],
            "possible_biomes": ["cave", "forest"],
            "corridor_path_selection": "Threshold"
        }"#;
        let config: GenerationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.rooms_amount, (12, 20));
        assert_eq!(config.possible_biomes.len(), 2);
        assert_eq!(config.corridor_path_selection, CorridorPathSelection::Threshold);
        // Untouched fields fall back to defaults.
        assert_eq!(config.cell_size, 700.0);
        assert_eq!(config.walls_cell_size, 2);
    }
}
