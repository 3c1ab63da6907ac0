// src/grid/mod.rs
pub mod cell;
pub mod grid;

pub use cell::{BiomeTag, CellBiome, CellData, CellKind, Direction, GridPoint};
pub use grid::{
    adjacent_cells, cell_world_distance, cell_world_position, cell_world_position_at_anchor,
    cells_bounds, find_cell_index, min_distance_to_cells, Grid,
};
