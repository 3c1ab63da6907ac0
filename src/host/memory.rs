// src/host/memory.rs

use crate::grid::CellBiome;
use crate::host::{ActorHost, ActorId, HostEvent, InstanceId, LevelHost, PawnSource, SpatialQueryHost, Transform};
use crate::utils::geometry::WorldPoint;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
struct InstanceRecord {
    level_name: String,
    transform: Transform,
    visible: bool,
}

#[derive(Debug, Clone)]
struct ActorRecord {
    class_id: u32,
    transform: Transform,
    hidden: bool,
    last_biome: Option<CellBiome>,
}

/// Engine stand-in backed by hash maps. Loads complete on the next
/// `poll_events` call, so a tick loop drives the same state machine a
/// real streaming host would.
#[derive(Default)]
pub struct MemoryWorld {
    next_instance: InstanceId,
    next_actor: ActorId,
    instances: HashMap<InstanceId, InstanceRecord>,
    actors: HashMap<ActorId, ActorRecord>,
    pending: VecDeque<HostEvent>,
    pub players: Vec<WorldPoint>,
    pub tracked: Vec<WorldPoint>,
    /// Flat ground plane height; `None` makes every trace miss.
    pub ground: Option<f64>,
    /// Boxes reported occupied regardless of contents.
    pub occupied_boxes: Vec<(WorldPoint, WorldPoint)>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self {
            ground: Some(0.0),
            ..Self::default()
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn visible_count(&self) -> usize {
        self.instances.values().filter(|i| i.visible).count()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn instance_name(&self, id: InstanceId) -> Option<&str> {
        self.instances.get(&id).map(|i| i.level_name.as_str())
    }

    pub fn actor_biome(&self, id: ActorId) -> Option<&CellBiome> {
        self.actors.get(&id).and_then(|a| a.last_biome.as_ref())
    }

    pub fn actor_class(&self, id: ActorId) -> Option<u32> {
        self.actors.get(&id).map(|a| a.class_id)
    }
}

impl LevelHost for MemoryWorld {
    fn create_instance(
        &mut self,
        level_name: &str,
        transform: Transform,
        _block_on_load: bool,
    ) -> Option<InstanceId> {
        self.next_instance += 1;
        let id = self.next_instance;
        self.instances.insert(
            id,
            InstanceRecord {
                level_name: level_name.to_string(),
                transform,
                visible: false,
            },
        );
        self.pending.push_back(HostEvent::InstanceLoaded(id));
        Some(id)
    }

    fn set_instance_visible(&mut self, id: InstanceId, visible: bool) {
        if let Some(instance) = self.instances.get_mut(&id) {
            let was_visible = instance.visible;
            instance.visible = visible;
            if visible && !was_visible {
                self.pending.push_back(HostEvent::InstanceShown(id));
            }
        }
    }

    fn set_instance_transform(&mut self, id: InstanceId, transform: Transform) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) if !instance.visible => {
                instance.transform = transform;
                true
            }
            _ => false,
        }
    }

    fn is_instance_visible(&self, id: InstanceId) -> bool {
        self.instances.get(&id).map(|i| i.visible).unwrap_or(false)
    }

    fn unload_instance(&mut self, id: InstanceId) {
        self.instances.remove(&id);
    }

    fn poll_events(&mut self) -> Vec<HostEvent> {
        self.pending.drain(..).collect()
    }
}

impl SpatialQueryHost for MemoryWorld {
    fn box_is_occupied(&self, center: WorldPoint, half_extent: WorldPoint) -> bool {
        self.occupied_boxes.iter().any(|(c, h)| {
            (center.x - c.x).abs() <= half_extent.x + h.x
                && (center.y - c.y).abs() <= half_extent.y + h.y
        })
    }

    fn ground_height(&self, _x: f64, _y: f64) -> Option<f64> {
        self.ground
    }
}

impl ActorHost for MemoryWorld {
    fn spawn_actor(&mut self, class_id: u32, transform: Transform) -> Option<ActorId> {
        self.next_actor += 1;
        let id = self.next_actor;
        self.actors.insert(
            id,
            ActorRecord {
                class_id,
                transform,
                hidden: false,
                last_biome: None,
            },
        );
        Some(id)
    }

    fn set_actor_hidden(&mut self, id: ActorId, hidden: bool) {
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.hidden = hidden;
        }
    }

    fn set_actor_transform(&mut self, id: ActorId, transform: Transform) {
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.transform = transform;
        }
    }

    fn notify_actor_biome(&mut self, id: ActorId, _visible: bool, biome: &CellBiome) {
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.last_biome = Some(biome.clone());
        }
    }

    fn destroy_actor(&mut self, id: ActorId) {
        self.actors.remove(&id);
    }
}

impl PawnSource for MemoryWorld {
    fn player_positions(&self) -> Vec<WorldPoint> {
        self.players.clone()
    }

    fn tracked_positions(&self) -> Vec<WorldPoint> {
        self.tracked.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_then_show_events() {
        let mut world = MemoryWorld::new();
        let id = world
            .create_instance("room_a", Transform::new(WorldPoint::zero(), 0), true)
            .unwrap();
        assert_eq!(world.poll_events(), vec![HostEvent::InstanceLoaded(id)]);

        world.set_instance_visible(id, true);
        assert_eq!(world.poll_events(), vec![HostEvent::InstanceShown(id)]);
        // Re-showing a visible instance emits nothing.
        world.set_instance_visible(id, true);
        assert!(world.poll_events().is_empty());
    }

    #[test]
    fn test_visible_instances_refuse_moves() {
        let mut world = MemoryWorld::new();
        let id = world
            .create_instance("room_a", Transform::new(WorldPoint::zero(), 0), false)
            .unwrap();
        let target = Transform::new(WorldPoint::new(700.0, 0.0, 0.0), 1);
        assert!(world.set_instance_transform(id, target));
        world.set_instance_visible(id, true);
        assert!(!world.set_instance_transform(id, Transform::new(WorldPoint::zero(), 0)));
    }
}
