// src/generation/mod.rs
pub mod biomes;
pub mod corridors;
pub mod populate;
pub mod rooms;
pub mod transitions;
pub mod walls;

pub use biomes::{apply_mutations_to_layouts, mutate_transition_cells, resolve_wall_biomes};
pub use corridors::{
    build_room_edges, chunk_edges, grow_spanning_edges, layout_corridors, pick_circular_edges,
    CorridorParams, RoomEdge,
};
pub use populate::{
    load_level_table, populate_layout, BiomeRestriction, LevelData, LevelPlacement,
    PopulateCondition, PopulateParams, PopulateResult,
};
pub use rooms::{compose_areas, layout_rooms, partition_room_counts, RoomLayoutParams};
pub use transitions::{
    collect_transition_cells, prominent_transition_biome, resolve_transition_quads, QuadSlot,
    TransitionCellData,
};
pub use walls::synthesize_walls;
