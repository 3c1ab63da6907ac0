// src/layout/mod.rs
pub mod entry;
pub mod ops;

pub use entry::LayoutEntry;
pub use ops::{
    closest_entry_to_anchor, dedup_cells, grid_cell_at_anchor, layouts_grid_size,
    normalize_positions, pack_layouts,
};
