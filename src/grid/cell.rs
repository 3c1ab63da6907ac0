// src/grid/cell.rs

use serde::{Deserialize, Serialize};

/// Integer cell coordinates on the generation grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> GridPoint {
        GridPoint::new(self.x + dx, self.y + dy)
    }

    pub fn neighbor(&self, direction: Direction) -> GridPoint {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }

    /// Chebyshev distance: the number of grid rings between two cells.
    pub fn ring_distance(&self, other: &GridPoint) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn manhattan_distance(&self, other: &GridPoint) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// The four orthogonal directions, in quadrant-slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn index(&self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }

    pub fn from_index(index: usize) -> Direction {
        Self::ALL[index % 4]
    }

    pub fn opposite(&self) -> Direction {
        Self::from_index(self.index() + 2)
    }

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
        }
    }
}

/// What a generated cell is part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    Room,
    Corridor,
    Blocking,
}

/// Opaque biome identifier from the configured biome pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BiomeTag(String);

impl BiomeTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BiomeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Biome assignment of a cell. `Unset` and `Transition` are real states,
/// not reserved tag values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellBiome {
    Unset,
    Transition,
    Tag(BiomeTag),
}

impl CellBiome {
    pub fn is_unset(&self) -> bool {
        matches!(self, CellBiome::Unset)
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, CellBiome::Transition)
    }

    /// The concrete tag, if this biome is neither unset nor a transition.
    pub fn tag(&self) -> Option<&BiomeTag> {
        match self {
            CellBiome::Tag(tag) => Some(tag),
            _ => None,
        }
    }
}

/// One occupied cell of the generated grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    pub id: GridPoint,
    pub kind: CellKind,
    pub biome: CellBiome,
    /// Index into the merged placement list, assigned during population.
    pub placement_index: Option<usize>,
}

impl CellData {
    pub fn new(id: GridPoint, kind: CellKind) -> Self {
        Self {
            id,
            kind,
            biome: CellBiome::Unset,
            placement_index: None,
        }
    }

    pub fn with_biome(id: GridPoint, kind: CellKind, biome: CellBiome) -> Self {
        Self {
            id,
            kind,
            biome,
            placement_index: None,
        }
    }
}
