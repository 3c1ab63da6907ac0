// src/generation/rooms.rs

use crate::config::{DistanceMode, GenerationConfig};
use crate::grid::{CellBiome, CellKind, GridPoint};
use crate::layout::{dedup_cells, layouts_grid_size, pack_layouts, LayoutEntry};
use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Per-worker inputs for a room layout wave, detached from the full
/// config so the closure owns everything it needs.
#[derive(Debug, Clone)]
pub struct RoomLayoutParams {
    pub distribution: f32,
    pub min_size: (i32, i32),
    pub max_size: (i32, i32),
    pub mode: DistanceMode,
    pub min_sep: (f32, f32),
    pub max_sep: (f32, f32),
}

impl From<&GenerationConfig> for RoomLayoutParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            distribution: config.rooms_distribution,
            min_size: config.min_room_size,
            max_size: config.max_room_size,
            mode: config.room_separation_mode,
            min_sep: config.min_room_separation,
            max_sep: config.max_room_separation,
        }
    }
}

/// Splits a total room count into per-worker counts of `rooms_per_area`,
/// spreading the remainder over the areas round-robin. A total smaller
/// than one area becomes a single worker.
pub fn partition_room_counts(total: u32, rooms_per_area: u32) -> Vec<u32> {
    let per_area = rooms_per_area.max(1);
    let mut counts: Vec<u32> = Vec::new();
    let mut remaining = total;
    while remaining >= per_area {
        counts.push(per_area);
        remaining -= per_area;
    }
    if counts.is_empty() {
        if remaining > 0 {
            counts.push(remaining);
        }
    } else {
        let areas = counts.len();
        for i in 0..remaining as usize {
            counts[i % areas] += 1;
        }
    }
    counts
}

/// Worker body: lays out `count` non-overlapping rooms in local grid
/// coordinates. Cells are filled after packing so each room's rectangle
/// matches its final local position.
pub fn layout_rooms(seed: u64, count: u32, params: RoomLayoutParams) -> Vec<LayoutEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rooms: Vec<LayoutEntry> = (0..count)
        .map(|_| {
            let size = GridPoint::new(
                rng.random_range(params.min_size.0..=params.max_size.0.max(params.min_size.0)),
                rng.random_range(params.min_size.1..=params.max_size.1.max(params.min_size.1)),
            );
            LayoutEntry::new(CellKind::Room, GridPoint::zero(), size)
        })
        .collect();

    pack_layouts(
        &mut rng,
        params.distribution,
        params.mode,
        params.min_sep,
        params.max_sep,
        &mut rooms,
    );
    for room in &mut rooms {
        room.fill_rect_cells();
    }
    rooms
}

/// Draws one biome per area, cycling through a reshuffled pool whenever
/// it runs dry so adjacent areas rarely repeat.
struct BiomeBag<'a> {
    pool: &'a [crate::grid::BiomeTag],
    bag: Vec<crate::grid::BiomeTag>,
}

impl<'a> BiomeBag<'a> {
    fn new(pool: &'a [crate::grid::BiomeTag]) -> Self {
        Self { pool, bag: Vec::new() }
    }

    fn draw(&mut self, rng: &mut StdRng) -> CellBiome {
        if self.pool.is_empty() {
            return CellBiome::Unset;
        }
        if self.bag.is_empty() {
            self.bag = self.pool.to_vec();
            self.bag.shuffle(rng);
        }
        CellBiome::Tag(self.bag.pop().unwrap())
    }
}

/// Merges the per-worker room layouts into one arrangement: packs each
/// worker's area around the others, offsets everything by the walls
/// margin, assigns area biomes and unique grid ids, and drops duplicate
/// cells. Returns the rooms and the resulting grid size.
pub fn compose_areas(
    rng: &mut StdRng,
    config: &GenerationConfig,
    area_layouts: Vec<Vec<LayoutEntry>>,
) -> (Vec<LayoutEntry>, GridPoint) {
    if config.possible_biomes.is_empty() {
        warn!("no biomes configured; all cells stay unset");
    }

    // One bounding entry per area, packed like rooms are.
    let mut area_bounds: Vec<LayoutEntry> = area_layouts
        .iter()
        .map(|rooms| {
            let size = layouts_grid_size(rooms);
            LayoutEntry::new(CellKind::Room, GridPoint::zero(), size)
        })
        .collect();
    pack_layouts(
        rng,
        config.area_distribution,
        config.area_separation_mode,
        config.min_area_separation,
        config.max_area_separation,
        &mut area_bounds,
    );

    let margin = config.walls_cell_size + 1;
    let mut biomes = BiomeBag::new(&config.possible_biomes);
    let mut rooms: Vec<LayoutEntry> = Vec::new();
    for (area, bound) in area_layouts.into_iter().zip(area_bounds.iter()) {
        let biome = biomes.draw(rng);
        for mut room in area {
            room.translate(bound.position.x + margin, bound.position.y + margin);
            room.set_biome(biome.clone());
            room.grid_id = rooms.len();
            rooms.push(room);
        }
    }

    dedup_cells(&mut rooms, &[]);
    rooms.retain(|room| !room.cells.is_empty());
    for (i, room) in rooms.iter_mut().enumerate() {
        room.grid_id = i;
    }

    let mut grid_size = layouts_grid_size(&rooms);
    grid_size.x += margin;
    grid_size.y += margin;
    (rooms, grid_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BiomeTag;
    use std::collections::HashSet;

    fn test_config() -> GenerationConfig {
        GenerationConfig {
            possible_biomes: vec![BiomeTag::new("cave"), BiomeTag::new("forest")],
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_partition_room_counts() {
        assert_eq!(partition_room_counts(16, 8), vec![8, 8]);
        assert_eq!(partition_room_counts(19, 8), vec![10, 9]);
        assert_eq!(partition_room_counts(5, 8), vec![5]);
        assert_eq!(partition_room_counts(0, 8), Vec::<u32>::new());
    }

    #[test]
    fn test_layout_rooms_no_overlap_and_sizes() {
        let params = RoomLayoutParams::from(&test_config());
        let rooms = layout_rooms(99, 10, params.clone());
        assert_eq!(rooms.len(), 10);

        let mut seen = HashSet::new();
        for room in &rooms {
            assert!(room.size.x >= params.min_size.0 && room.size.x <= params.max_size.0);
            assert!(room.size.y >= params.min_size.1 && room.size.y <= params.max_size.1);
            for cell in &room.cells {
                assert!(seen.insert(cell.id), "rooms overlap at {:?}", cell.id);
            }
        }
    }

    #[test]
    fn test_compose_areas_assigns_ids_biomes_and_margin() {
        let config = test_config();
        let mut rng = StdRng::seed_from_u64(3);
        let areas = vec![
            layout_rooms(1, 4, RoomLayoutParams::from(&config)),
            layout_rooms(2, 4, RoomLayoutParams::from(&config)),
        ];
        let (rooms, grid_size) = compose_areas(&mut rng, &config, areas);

        assert_eq!(rooms.len(), 8);
        let margin = config.walls_cell_size + 1;
        let mut seen = HashSet::new();
        for (i, room) in rooms.iter().enumerate() {
            assert_eq!(room.grid_id, i);
            assert!(room.position.x >= margin && room.position.y >= margin);
            assert!(room.biome.tag().is_some());
            for cell in &room.cells {
                assert_eq!(cell.biome, room.biome);
                assert!(seen.insert(cell.id));
                assert!(cell.id.x < grid_size.x && cell.id.y < grid_size.y);
            }
        }
    }
}
