// src/utils/mod.rs
pub mod geometry;

pub use geometry::{clamp_anchor, Anchor, WorldPoint};
