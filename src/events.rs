// src/events.rs

use crate::generation::transitions::{QuadSlot, TransitionCellData};
use crate::grid::{CellBiome, GridPoint};
use crate::utils::geometry::WorldPoint;

/// What a shown level needs to know about itself, delivered with
/// visibility notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelClientData {
    pub placement_index: usize,
    pub level_name: String,
    pub biome: CellBiome,
    pub is_transition: bool,
    /// Quadrant biomes when the level sits on a transition cell, in the
    /// placed level's local orientation.
    pub quads: Option<[QuadSlot; 4]>,
    pub allow_reposition: bool,
}

/// Everything a transition-rendering client needs after generation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionInitData {
    pub cell_size: f64,
    pub origin: WorldPoint,
    pub start_cell: GridPoint,
    pub cells: Vec<TransitionCellData>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LevelEvent {
    GenerationCompleted,
    /// Every start-area instance finished loading.
    AllLevelsLoaded,
    NewLevelShown { placement_index: usize },
    StateMessage(String),
    VisibilityChanged {
        placement_index: usize,
        visible: bool,
        client: LevelClientData,
    },
    TransitionCellsGenerated(TransitionInitData),
    TransitionCellVisible { cell: GridPoint, visible: bool },
}

/// Synchronous observer list. Observers run on the tick thread, in
/// subscription order.
#[derive(Default)]
pub struct EventDispatcher {
    observers: Vec<Box<dyn FnMut(&LevelEvent) + Send>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&LevelEvent) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn emit(&mut self, event: &LevelEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_dispatch_reaches_all_observers_in_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = EventDispatcher::new();

        let first = Arc::clone(&counter);
        dispatcher.subscribe(move |_| {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let second = Arc::clone(&counter);
        dispatcher.subscribe(move |event| {
            if matches!(event, LevelEvent::GenerationCompleted) {
                second.fetch_add(10, Ordering::SeqCst);
            }
        });

        dispatcher.emit(&LevelEvent::GenerationCompleted);
        dispatcher.emit(&LevelEvent::AllLevelsLoaded);
        assert_eq!(counter.load(Ordering::SeqCst), 12);
    }
}
