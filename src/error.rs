// src/error.rs

use thiserror::Error;

/// Configuration errors that abort an operation before it starts.
///
/// Runtime hiccups (non-converged propagation, failed line traces,
/// exhausted corridor candidates) are logged and worked around instead
/// of being surfaced here.
#[derive(Debug, Error)]
pub enum LevelGenError {
    #[error("level data table has no enabled entries")]
    EmptyLevelTable,

    #[error("generation produced no rooms")]
    NoRoomsGenerated,

    #[error("generation is already running")]
    GenerationInProgress,

    #[error("no generated level data; call generate first")]
    NotGenerated,

    #[error("failed to parse level table: {0}")]
    TableParse(#[from] serde_json::Error),
}
