// src/generation/corridors.rs

use crate::config::CorridorPathSelection;
use crate::grid::{CellData, CellKind, GridPoint};
use crate::layout::LayoutEntry;
use crate::utils::geometry::WorldPoint;
use log::error;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

/// Candidate connection between two rooms, keyed by the planar distance
/// of their centers.
#[derive(Debug, Clone)]
pub struct RoomEdge {
    pub room_a: usize,
    pub room_b: usize,
    pub distance: f64,
}

/// All pairwise room-center distances.
pub fn build_room_edges(rooms: &[LayoutEntry], cell_size: f64, origin: &WorldPoint) -> Vec<RoomEdge> {
    let centers: Vec<WorldPoint> = rooms
        .iter()
        .map(|r| r.center_world(cell_size, origin))
        .collect();
    let mut edges = Vec::new();
    for a in 0..rooms.len() {
        for b in (a + 1)..rooms.len() {
            edges.push(RoomEdge {
                room_a: a,
                room_b: b,
                distance: centers[a].distance_2d(&centers[b]),
            });
        }
    }
    edges
}

/// Greedy spanning growth from the start room.
///
/// Each step takes the globally cheapest remaining edge that crosses the
/// connected/unconnected boundary, ties going to the first candidate
/// found. Chosen edges are consumed from the pool; the pool keeps the
/// unused candidates for circular corridor picks.
pub fn grow_spanning_edges(
    room_count: usize,
    start_room: usize,
    pool: &mut Vec<RoomEdge>,
) -> Vec<RoomEdge> {
    let mut connected = vec![false; room_count];
    if start_room < room_count {
        connected[start_room] = true;
    }
    let mut chosen = Vec::new();
    let mut remaining = room_count.saturating_sub(1);

    while remaining > 0 {
        match cheapest_edge(pool, |e| connected[e.room_a] != connected[e.room_b]) {
            Some(i) => {
                let edge = pool.swap_remove(i);
                let next = if connected[edge.room_a] {
                    edge.room_b
                } else {
                    edge.room_a
                };
                connected[next] = true;
                chosen.push(edge);
                remaining -= 1;
            }
            None => {
                error!(
                    "corridor candidates exhausted with {} rooms unreachable",
                    remaining
                );
                break;
            }
        }
    }
    chosen
}

fn cheapest_edge<F: Fn(&RoomEdge) -> bool>(pool: &[RoomEdge], accept: F) -> Option<usize> {
    pool.iter()
        .enumerate()
        .filter(|(_, e)| accept(e))
        .min_by(|(_, a), (_, b)| a.distance.total_cmp(&b.distance))
        .map(|(i, _)| i)
}

/// Random extra loops: `percent × room_count` picks among the surviving
/// candidates whose length stays under `max_cells` grid cells.
pub fn pick_circular_edges(
    rng: &mut StdRng,
    pool: &[RoomEdge],
    percent: f32,
    max_cells: i32,
    cell_size: f64,
    room_count: usize,
) -> Vec<RoomEdge> {
    let wanted = (percent.clamp(0.0, 1.0) * room_count as f32).round() as usize;
    if wanted == 0 {
        return Vec::new();
    }
    let mut eligible: Vec<&RoomEdge> = pool
        .iter()
        .filter(|e| (e.distance / cell_size) < max_cells as f64)
        .collect();
    eligible.shuffle(rng);
    eligible.into_iter().take(wanted).cloned().collect()
}

/// Splits the edges into `total / (max_threads - 1)` sized chunks, one
/// worker per chunk.
pub fn chunk_edges(edges: Vec<RoomEdge>, max_threads: usize) -> Vec<Vec<RoomEdge>> {
    if edges.is_empty() {
        return Vec::new();
    }
    let divisor = max_threads.saturating_sub(1).max(1);
    let chunk_size = (edges.len() / divisor).max(1);
    edges
        .chunks(chunk_size)
        .map(|c| c.to_vec())
        .collect()
}

/// Shared inputs for a corridor carving worker.
#[derive(Clone)]
pub struct CorridorParams {
    pub selection: CorridorPathSelection,
    pub threshold: i32,
    pub rooms: Arc<Vec<LayoutEntry>>,
}

/// Worker body: carves every edge of the chunk into a corridor entry.
/// Cells overlapping rooms or other corridors are dropped at merge time.
pub fn layout_corridors(seed: u64, edges: Vec<RoomEdge>, params: CorridorParams) -> Vec<LayoutEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut entries = Vec::new();
    for edge in edges {
        let (Some(room_a), Some(room_b)) =
            (params.rooms.get(edge.room_a), params.rooms.get(edge.room_b))
        else {
            continue;
        };
        let Some(start) = room_a.closest_cell_to(room_b.center_cell()) else {
            continue;
        };
        let Some(end) = room_b.closest_cell_to(start) else {
            continue;
        };

        let path = carve_path(&mut rng, start, end, params.selection, params.threshold);
        let mut entry = LayoutEntry::new(CellKind::Corridor, start, GridPoint::new(1, 1));
        entry.biome = room_a.biome.clone();
        entry.cells = path
            .into_iter()
            .map(|id| {
                // Each corridor cell inherits the biome of the nearer
                // endpoint room, so mixed corridors split mid-way.
                let biome = if id.manhattan_distance(&start) <= id.manhattan_distance(&end) {
                    room_a.biome.clone()
                } else {
                    room_b.biome.clone()
                };
                CellData::with_biome(id, CellKind::Corridor, biome)
            })
            .collect();
        entry.fit_bounds_to_cells();
        entries.push(entry);
    }
    entries
}

/// L-shaped walk from `start` to `end`. `Threshold` selection may push
/// the elbow past the target, adding at most `threshold` extra cells.
fn carve_path(
    rng: &mut StdRng,
    start: GridPoint,
    end: GridPoint,
    selection: CorridorPathSelection,
    threshold: i32,
) -> Vec<GridPoint> {
    let x_first = rng.random_bool(0.5);
    let mut elbow = if x_first {
        GridPoint::new(end.x, start.y)
    } else {
        GridPoint::new(start.x, end.y)
    };

    if selection == CorridorPathSelection::Threshold && threshold > 1 {
        let detour = rng.random_range(0..=threshold / 2);
        if x_first {
            elbow.x += if end.x >= start.x { detour } else { -detour };
        } else {
            elbow.y += if end.y >= start.y { detour } else { -detour };
        }
    }

    let mut seen = HashSet::new();
    let mut path = Vec::new();
    let mut push = |p: GridPoint| {
        if seen.insert(p) {
            path.push(p);
        }
    };
    walk_segment(start, elbow, &mut push);
    walk_segment(elbow, end, &mut push);
    path
}

/// Straight-then-straight walk, x axis first, both endpoints included.
fn walk_segment(from: GridPoint, to: GridPoint, push: &mut impl FnMut(GridPoint)) {
    let step_x = (to.x - from.x).signum();
    let mut cursor = from;
    push(cursor);
    while cursor.x != to.x {
        cursor.x += step_x;
        push(cursor);
    }
    let step_y = (to.y - from.y).signum();
    while cursor.y != to.y {
        cursor.y += step_y;
        push(cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::generation::rooms::{compose_areas, layout_rooms, RoomLayoutParams};
    use crate::grid::BiomeTag;

    fn ten_rooms() -> Vec<LayoutEntry> {
        let config = GenerationConfig {
            possible_biomes: vec![BiomeTag::new("cave")],
            ..GenerationConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        let area = layout_rooms(11, 10, RoomLayoutParams::from(&config));
        let (rooms, _) = compose_areas(&mut rng, &config, vec![area]);
        rooms
    }

    #[test]
    fn test_spanning_connects_ten_rooms_with_nine_edges() {
        let rooms = ten_rooms();
        assert_eq!(rooms.len(), 10);
        let mut pool = build_room_edges(&rooms, 700.0, &WorldPoint::zero());
        let chosen = grow_spanning_edges(rooms.len(), 0, &mut pool);
        assert_eq!(chosen.len(), 9);

        // Every room reachable from room 0 over the chosen edges.
        let mut reached = vec![false; rooms.len()];
        reached[0] = true;
        let mut frontier = vec![0usize];
        while let Some(room) = frontier.pop() {
            for edge in &chosen {
                let other = if edge.room_a == room {
                    edge.room_b
                } else if edge.room_b == room {
                    edge.room_a
                } else {
                    continue;
                };
                if !reached[other] {
                    reached[other] = true;
                    frontier.push(other);
                }
            }
        }
        assert!(reached.iter().all(|r| *r));
    }

    #[test]
    fn test_spanning_takes_globally_cheapest_crossing_edge() {
        let edge = |a: usize, b: usize, d: f64| RoomEdge { room_a: a, room_b: b, distance: d };
        let mut pool = vec![edge(0, 1, 10.0), edge(0, 2, 12.0), edge(1, 2, 100.0)];
        let chosen = grow_spanning_edges(3, 0, &mut pool);

        // After (0,1), the cheapest boundary edge is (0,2), not the
        // (1,2) edge hanging off the last-connected room.
        assert_eq!(chosen.len(), 2);
        assert_eq!((chosen[0].room_a, chosen[0].room_b), (0, 1));
        assert_eq!((chosen[1].room_a, chosen[1].room_b), (0, 2));
        assert_eq!(pool.len(), 1);
        assert_eq!((pool[0].room_a, pool[0].room_b), (1, 2));
    }

    #[test]
    fn test_zero_percent_circular_picks_nothing() {
        let rooms = ten_rooms();
        let mut pool = build_room_edges(&rooms, 700.0, &WorldPoint::zero());
        let _ = grow_spanning_edges(rooms.len(), 0, &mut pool);
        let mut rng = StdRng::seed_from_u64(1);
        let circular = pick_circular_edges(&mut rng, &pool, 0.0, 10, 700.0, rooms.len());
        assert!(circular.is_empty());
    }

    #[test]
    fn test_circular_edges_respect_length_cap() {
        let rooms = ten_rooms();
        let mut pool = build_room_edges(&rooms, 700.0, &WorldPoint::zero());
        let _ = grow_spanning_edges(rooms.len(), 0, &mut pool);
        let mut rng = StdRng::seed_from_u64(2);
        let circular = pick_circular_edges(&mut rng, &pool, 0.5, 4, 700.0, rooms.len());
        for edge in &circular {
            assert!(edge.distance / 700.0 < 4.0);
        }
    }

    #[test]
    fn test_chunk_edges_split() {
        let edges: Vec<RoomEdge> = (0..9)
            .map(|i| RoomEdge { room_a: i, room_b: i + 1, distance: 1.0 })
            .collect();
        let chunks = chunk_edges(edges, 4);
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), 9);
        assert_eq!(chunks[0].len(), 3);
    }

    #[test]
    fn test_carved_corridor_touches_both_rooms() {
        let rooms = Arc::new(ten_rooms());
        let params = CorridorParams {
            selection: CorridorPathSelection::Shortest,
            threshold: 0,
            rooms: Arc::clone(&rooms),
        };
        let edge = RoomEdge { room_a: 0, room_b: 1, distance: 0.0 };
        let entries = layout_corridors(5, vec![edge], params);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert!(!entry.cells.is_empty());
        assert!(entry.cells.iter().any(|c| rooms[0].contains_cell(c.id)));
        assert!(entry.cells.iter().any(|c| rooms[1].contains_cell(c.id)));
        // The walk is orthogonally contiguous.
        for pair in entry.cells.windows(2) {
            assert_eq!(pair[0].id.manhattan_distance(&pair[1].id), 1);
        }
    }
}
