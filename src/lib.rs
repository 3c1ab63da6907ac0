// src/lib.rs

pub mod config;
pub mod error;
pub mod events;
pub mod generation;
pub mod grid;
pub mod host;
pub mod layout;
pub mod manager;
pub mod streaming;
pub mod tasks;
pub mod utils;

pub use config::GenerationConfig;
pub use error::LevelGenError;
pub use events::{EventDispatcher, LevelEvent};
pub use manager::LevelManager;
