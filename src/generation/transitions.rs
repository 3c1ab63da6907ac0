// src/generation/transitions.rs

use crate::grid::{find_cell_index, BiomeTag, CellBiome, CellData, Direction, GridPoint};
use log::{error, info};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

const PROPAGATION_MAX_ITERATIONS: usize = 50_000;

/// State of one quadrant of a transition cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuadSlot {
    /// The adjacent cell does not exist (grid edge).
    Missing,
    /// The adjacent cell is itself a transition; to be propagated.
    Unresolved,
    Resolved(BiomeTag),
}

impl QuadSlot {
    pub fn is_resolved(&self) -> bool {
        matches!(self, QuadSlot::Resolved(_))
    }

    pub fn tag(&self) -> Option<&BiomeTag> {
        match self {
            QuadSlot::Resolved(tag) => Some(tag),
            _ => None,
        }
    }
}

/// A transition cell and its four quadrant biomes.
///
/// Slots are stored in the placed level's local orientation; directional
/// access goes through the placement rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionCellData {
    pub cell: CellData,
    /// Rotation index of the owning placement, quarter turns.
    pub rotation: u8,
    pub slots: [QuadSlot; 4],
}

impl TransitionCellData {
    pub fn new(cell: CellData, rotation: u8) -> Self {
        Self {
            cell,
            rotation,
            slots: [
                QuadSlot::Unresolved,
                QuadSlot::Unresolved,
                QuadSlot::Unresolved,
                QuadSlot::Unresolved,
            ],
        }
    }

    fn slot_index(&self, direction: Direction) -> usize {
        (direction.index() + self.rotation as usize) % 4
    }

    pub fn quad(&self, direction: Direction) -> &QuadSlot {
        &self.slots[self.slot_index(direction)]
    }

    pub fn set_quad(&mut self, direction: Direction, slot: QuadSlot) {
        let index = self.slot_index(direction);
        self.slots[index] = slot;
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.slots.iter().all(|s| s.is_resolved())
    }

    /// The most common resolved biome among the four quadrants.
    pub fn prominent_biome(&self) -> CellBiome {
        let mut best: Option<(&BiomeTag, usize)> = None;
        for slot in &self.slots {
            if let Some(tag) = slot.tag() {
                let count = self.slots.iter().filter(|s| s.tag() == Some(tag)).count();
                if best.map_or(true, |(_, c)| count > c) {
                    best = Some((tag, count));
                }
            }
        }
        match best {
            Some((tag, _)) => CellBiome::Tag(tag.clone()),
            None => CellBiome::Transition,
        }
    }
}

/// Builds the transition cell list and seeds each quadrant from the
/// orthogonal grid neighbors.
pub fn collect_transition_cells(
    cells: &[CellData],
    rotation_of: impl Fn(&CellData) -> u8,
) -> Vec<TransitionCellData> {
    cells
        .iter()
        .filter(|c| c.biome.is_transition())
        .map(|c| {
            let mut data = TransitionCellData::new(c.clone(), rotation_of(c));
            for direction in Direction::ALL {
                let neighbor = c.id.neighbor(direction);
                let slot = match find_cell_index(neighbor, cells) {
                    None => QuadSlot::Missing,
                    Some(i) => match &cells[i].biome {
                        CellBiome::Tag(tag) => QuadSlot::Resolved(tag.clone()),
                        _ => QuadSlot::Unresolved,
                    },
                };
                data.set_quad(direction, slot);
            }
            data
        })
        .collect()
}

/// Runs the propagation loop until every quadrant of every transition
/// cell is resolved, or the iteration cap is hit (logged, not fatal).
/// Returns the number of iterations used.
pub fn resolve_transition_quads(rng: &mut StdRng, data: &mut [TransitionCellData]) -> usize {
    let mut iterations = 0;
    while iterations < PROPAGATION_MAX_ITERATIONS {
        iterations += 1;

        if !propagate_from_adjacent_cells(data)
            && !propagate_same_cell(rng, PropagationMode::Normal, data)
            && !propagate_same_cell(rng, PropagationMode::Random, data)
            && !propagate_same_cell(rng, PropagationMode::DoubleTransition, data)
        {
            propagate_same_cell(rng, PropagationMode::Corner, data);
        }

        if data.iter().all(|d| d.is_fully_resolved()) {
            info!("transition quadrant propagation took {} iterations", iterations);
            return iterations;
        }
    }
    error!(
        "transition quadrant propagation hit the iteration cap with {} cells unresolved",
        data.iter().filter(|d| !d.is_fully_resolved()).count()
    );
    iterations
}

/// The quadrant facing this one from the neighboring transition cell, or
/// `Missing` when no transition cell is adjacent in that direction. A
/// normal cell cannot be there: its biome was consumed during seeding.
fn adjacent_cell_quad(
    direction: Direction,
    cell: &TransitionCellData,
    data: &[TransitionCellData],
) -> QuadSlot {
    let neighbor = cell.cell.id.neighbor(direction);
    data.iter()
        .find(|d| d.cell.id == neighbor)
        .map(|d| d.quad(direction.opposite()).clone())
        .unwrap_or(QuadSlot::Missing)
}

/// The two quadrants flanking `direction` inside the same cell.
fn flanking_quads(direction: Direction, cell: &TransitionCellData) -> [QuadSlot; 2] {
    let (a, b) = match direction {
        Direction::Up | Direction::Down => (Direction::Left, Direction::Right),
        Direction::Left | Direction::Right => (Direction::Up, Direction::Down),
    };
    [cell.quad(a).clone(), cell.quad(b).clone()]
}

fn propagate_from_adjacent_cells(data: &mut [TransitionCellData]) -> bool {
    let mut propagated = false;
    for i in 0..data.len() {
        for direction in Direction::ALL {
            if data[i].quad(direction).is_resolved() {
                continue;
            }
            let adjacent = adjacent_cell_quad(direction, &data[i], data);
            if let QuadSlot::Resolved(tag) = adjacent {
                data[i].set_quad(direction, QuadSlot::Resolved(tag));
                propagated = true;
            }
        }
    }
    propagated
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropagationMode {
    /// Both flanks resolved and equal; on a grid edge a random flank.
    Normal,
    /// Both flanks resolved but different; random pick.
    Random,
    /// One resolved flank and an unresolved facing quad in the neighbor.
    DoubleTransition,
    /// One resolved flank on a grid edge.
    Corner,
}

fn propagate_same_cell(
    rng: &mut StdRng,
    mode: PropagationMode,
    data: &mut [TransitionCellData],
) -> bool {
    let mut propagated = false;
    for i in 0..data.len() {
        for direction in Direction::ALL {
            if data[i].quad(direction).is_resolved() {
                continue;
            }
            let flanks = flanking_quads(direction, &data[i]);
            let resolved: Vec<&BiomeTag> = flanks.iter().filter_map(|f| f.tag()).collect();

            match mode {
                PropagationMode::Normal => {
                    if resolved.len() == 2 {
                        if resolved[0] == resolved[1] {
                            let tag = resolved[0].clone();
                            data[i].set_quad(direction, QuadSlot::Resolved(tag));
                            propagated = true;
                            break;
                        } else if adjacent_cell_quad(direction, &data[i], data) == QuadSlot::Missing
                        {
                            // Grid edge with two differing flanks; either
                            // choice is sound and blocks nothing else.
                            let tag = (*resolved.choose(rng).unwrap()).clone();
                            data[i].set_quad(direction, QuadSlot::Resolved(tag));
                        }
                    }
                }
                PropagationMode::Random => {
                    if resolved.len() == 2 && resolved[0] != resolved[1] {
                        let tag = (*resolved.choose(rng).unwrap()).clone();
                        data[i].set_quad(direction, QuadSlot::Resolved(tag));
                        propagated = true;
                        break;
                    }
                }
                PropagationMode::DoubleTransition => {
                    if resolved.len() == 1
                        && adjacent_cell_quad(direction, &data[i], data) == QuadSlot::Unresolved
                    {
                        let tag = resolved[0].clone();
                        data[i].set_quad(direction, QuadSlot::Resolved(tag));
                        propagated = true;
                        break;
                    }
                }
                PropagationMode::Corner => {
                    if resolved.len() == 1
                        && adjacent_cell_quad(direction, &data[i], data) == QuadSlot::Missing
                    {
                        let tag = resolved[0].clone();
                        data[i].set_quad(direction, QuadSlot::Resolved(tag));
                    }
                }
            }
        }
        if propagated {
            break;
        }
    }
    propagated
}

/// Prominent biome of a transition cell by id, for actor notifications.
pub fn prominent_transition_biome(cell_id: GridPoint, data: &[TransitionCellData]) -> CellBiome {
    data.iter()
        .find(|d| d.cell.id == cell_id)
        .map(|d| d.prominent_biome())
        .unwrap_or(CellBiome::Transition)
}
