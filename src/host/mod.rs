// src/host/mod.rs
pub mod memory;

use crate::utils::geometry::WorldPoint;

pub use memory::MemoryWorld;

pub type InstanceId = u64;
pub type ActorId = u64;

/// World placement of an instance or actor. Rotation is quantized to
/// quarter turns, like everything on the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: WorldPoint,
    pub rotation: u8,
}

impl Transform {
    pub fn new(position: WorldPoint, rotation: u8) -> Self {
        Self {
            position,
            rotation: rotation % 4,
        }
    }

    pub fn yaw_degrees(&self) -> f64 {
        self.rotation as f64 * 90.0
    }
}

/// Completion notifications from the hosting engine, polled every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The instance finished loading (still hidden).
    InstanceLoaded(InstanceId),
    /// The instance finished loading and is now visible.
    InstanceShown(InstanceId),
}

/// Level instance lifecycle, implemented by the hosting engine.
pub trait LevelHost {
    /// Starts loading a level asset at a transform. Returns `None` when
    /// the host cannot create the instance.
    fn create_instance(
        &mut self,
        level_name: &str,
        transform: Transform,
        block_on_load: bool,
    ) -> Option<InstanceId>;

    fn set_instance_visible(&mut self, id: InstanceId, visible: bool);

    /// Moves a hidden instance. Returns false when the host refused the
    /// move (visible instances cannot be relocated).
    fn set_instance_transform(&mut self, id: InstanceId, transform: Transform) -> bool;

    fn is_instance_visible(&self, id: InstanceId) -> bool;

    fn unload_instance(&mut self, id: InstanceId);

    /// Drains load/show notifications accumulated since the last poll.
    fn poll_events(&mut self) -> Vec<HostEvent>;
}

/// Geometric queries against the loaded world.
pub trait SpatialQueryHost {
    /// True when anything overlaps the axis-aligned box.
    fn box_is_occupied(&self, center: WorldPoint, half_extent: WorldPoint) -> bool;

    /// Vertical line trace; the ground height at (x, y), if any loaded
    /// geometry is hit.
    fn ground_height(&self, x: f64, y: f64) -> Option<f64>;
}

/// Actor lifecycle for deferred spawns.
pub trait ActorHost {
    fn spawn_actor(&mut self, class_id: u32, transform: Transform) -> Option<ActorId>;
    fn set_actor_hidden(&mut self, id: ActorId, hidden: bool);
    fn set_actor_transform(&mut self, id: ActorId, transform: Transform);
    /// Tells the actor which biome its cell resolved to.
    fn notify_actor_biome(&mut self, id: ActorId, visible: bool, biome: &crate::grid::CellBiome);
    fn destroy_actor(&mut self, id: ActorId);
}

/// Where streaming-relevant pawns currently are.
pub trait PawnSource {
    fn player_positions(&self) -> Vec<WorldPoint>;
    /// Non-player actors that also keep levels loaded around them.
    fn tracked_positions(&self) -> Vec<WorldPoint>;
}

/// The full engine surface the manager talks to.
pub trait LevelWorld: LevelHost + SpatialQueryHost + ActorHost + PawnSource {}

impl<T: LevelHost + SpatialQueryHost + ActorHost + PawnSource> LevelWorld for T {}
