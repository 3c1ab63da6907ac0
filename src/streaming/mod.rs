// src/streaming/mod.rs
pub mod controller;
pub mod pool;
pub mod spawn;
pub mod track;

pub use controller::{
    cells_of_placements, placements_between_positions, placements_of_cells,
    set_cell_visibility_status, tick_visibility_statuses, CellVisibilityStatus,
};
pub use pool::{min_pool_size, LevelPool};
pub use spawn::{generate_spawn_tracks, ActorSpawnData, ActorSpawnMode, ActorSpawnTrack, SpawnState};
pub use track::{LevelState, LoadedLevelTrack};
