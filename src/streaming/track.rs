// src/streaming/track.rs

use crate::host::InstanceId;

/// Streaming state of one placed level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelState {
    Unloaded,
    Loading,
    Loaded,
}

/// Bookkeeping for one placement the streamer has touched. Tracks are
/// replaced wholesale on every state change, never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLevelTrack {
    pub placement_index: usize,
    pub state: LevelState,
    /// True until the first load completes; used to defer actor spawn
    /// visibility until the level geometry exists.
    pub first_load: bool,
    pub instance: Option<InstanceId>,
}

impl LoadedLevelTrack {
    pub fn loading(placement_index: usize, instance: Option<InstanceId>) -> Self {
        Self {
            placement_index,
            state: LevelState::Loading,
            first_load: true,
            instance,
        }
    }

    pub fn with_state(&self, state: LevelState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    pub fn is_loaded_or_loading(&self) -> bool {
        matches!(self.state, LevelState::Loaded | LevelState::Loading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_state_transitions() {
        let track = LoadedLevelTrack::loading(3, Some(7));
        assert!(track.is_loaded_or_loading());
        assert!(track.first_load);

        let loaded = LoadedLevelTrack {
            first_load: false,
            ..track.with_state(LevelState::Loaded)
        };
        assert!(loaded.is_loaded_or_loading());
        assert_eq!(loaded.instance, Some(7));

        let unloaded = loaded.with_state(LevelState::Unloaded);
        assert!(!unloaded.is_loaded_or_loading());
    }
}
