// src/main.rs
//! # GridLevel Demo
//!
//! Headless demonstration of the generation and streaming pipeline: builds
//! a dungeon from an in-code level table, waits for the start area to load
//! against an in-memory host, then walks a simulated player away from the
//! start cell to exercise distance streaming.

use gridlevel::events::LevelEvent;
use gridlevel::grid::BiomeTag;
use gridlevel::host::MemoryWorld;
use gridlevel::manager::LevelManager;
use gridlevel::streaming::{ActorSpawnData, ActorSpawnMode};
use gridlevel::GenerationConfig;
use log::info;
use std::error::Error;
use std::time::Duration;

const LEVEL_TABLE: &str = r#"[
    { "name": "room_plain",    "size": 1, "kind": "Room",     "supports_transition": true,  "weight": 3.0 },
    { "name": "room_pillars",  "size": 1, "kind": "Room",     "supports_transition": false, "weight": 1.0 },
    { "name": "corridor_arch", "size": 1, "kind": "Corridor", "supports_transition": true  },
    { "name": "wall_solid",    "size": 1, "kind": "Blocking", "supports_transition": true  }
]"#;

fn spawn_table() -> Vec<ActorSpawnData> {
    vec![
        ActorSpawnData {
            class_id: 1,
            amount: (1, 1),
            chance: 100,
            mode: ActorSpawnMode::PlayerStart,
            anchor_min: (0.5, 0.5),
            anchor_max: (0.5, 0.5),
        },
        ActorSpawnData {
            class_id: 2,
            amount: (1, 3),
            chance: 75,
            mode: ActorSpawnMode::PerRoomButStart,
            anchor_min: (0.2, 0.2),
            anchor_max: (0.8, 0.8),
        },
    ]
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = GenerationConfig {
        rooms_amount: (12, 16),
        possible_biomes: vec![
            BiomeTag::new("cave"),
            BiomeTag::new("crypt"),
            BiomeTag::new("sewer"),
        ],
        ..GenerationConfig::default()
    };

    let mut manager = LevelManager::new(config, MemoryWorld::new());
    manager.load_level_table(LEVEL_TABLE)?;
    manager.subscribe(|event| match event {
        LevelEvent::StateMessage(message) => info!("state: {}", message),
        LevelEvent::AllLevelsLoaded => info!("start area loaded"),
        LevelEvent::GenerationCompleted => info!("generation completed"),
        LevelEvent::NewLevelShown { placement_index } => {
            info!("streamed in placement {}", placement_index)
        }
        _ => {}
    });

    manager.generate(spawn_table())?;
    while manager.is_generating() {
        manager.tick();
        std::thread::sleep(Duration::from_millis(1));
    }

    let grid_size = manager.grid().size();
    info!(
        "grid {}x{}: {} cells, {} placements, {} transition cells",
        grid_size.x,
        grid_size.y,
        manager.grid().len(),
        manager.placements().len(),
        manager.transition_cells().len()
    );

    // Drop the player at the start cell, then march away and watch
    // levels stream out behind them.
    let start = manager.player_start_position()?;
    manager.world_mut().players = vec![start];
    let cell_size = manager.config().cell_size;
    for step in 0..40 {
        let mut position = start;
        position.x += step as f64 * cell_size;
        manager.world_mut().players = vec![position];
        manager.tick();
        std::thread::sleep(Duration::from_millis(1));
    }
    info!(
        "after the walk: {} instances alive, {} visible, {} actors spawned",
        manager.world().instance_count(),
        manager.world().visible_count(),
        manager.world().actor_count()
    );

    manager.clear();
    info!("level cleared");
    Ok(())
}
