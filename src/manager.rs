// src/manager.rs

use crate::config::GenerationConfig;
use crate::error::LevelGenError;
use crate::events::{EventDispatcher, LevelClientData, LevelEvent, TransitionInitData};
use crate::generation::corridors::{
    build_room_edges, chunk_edges, grow_spanning_edges, layout_corridors, pick_circular_edges,
    CorridorParams,
};
use crate::generation::populate::{
    load_level_table, populate_layout, LevelData, LevelPlacement, PopulateCondition,
    PopulateParams, PopulateResult,
};
use crate::generation::rooms::{compose_areas, layout_rooms, partition_room_counts, RoomLayoutParams};
use crate::generation::transitions::{
    collect_transition_cells, prominent_transition_biome, resolve_transition_quads,
    TransitionCellData,
};
use crate::generation::walls::synthesize_walls;
use crate::generation::{apply_mutations_to_layouts, mutate_transition_cells, resolve_wall_biomes};
use crate::grid::{
    cell_world_position, cell_world_position_at_anchor, CellBiome, CellKind, Grid, GridPoint,
};
use crate::host::{HostEvent, InstanceId, LevelWorld, Transform};
use crate::layout::{closest_entry_to_anchor, dedup_cells, grid_cell_at_anchor, LayoutEntry};
use crate::streaming::{
    cells_of_placements, generate_spawn_tracks, min_pool_size, placements_between_positions,
    placements_of_cells, set_cell_visibility_status, tick_visibility_statuses, ActorSpawnData,
    ActorSpawnTrack, CellVisibilityStatus, LevelPool, LevelState, LoadedLevelTrack, SpawnState,
};
use crate::tasks::TaskHandle;
use crate::utils::geometry::WorldPoint;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Grid ring radius around the start cell loaded up-front when levels
/// are created at runtime.
const START_AREA_RADIUS: i32 = 5;

/// Ticks the start cell stays visible after being un-pinned.
const START_CELL_HIDE_TICKS: i32 = 500;

/// World transform of a placed level. The level asset's pivot sits at
/// its local (0, 0) corner, so rotated footprints shift by their world
/// extent to keep covering the same cells.
pub fn placed_level_transform(
    grid_position: GridPoint,
    rotation: u8,
    size_cells: i32,
    cell_size: f64,
    origin: &WorldPoint,
) -> Transform {
    let mut position = cell_world_position_at_anchor(grid_position, cell_size, origin, (0.0, 0.0));
    let extent = size_cells.max(1) as f64 * cell_size;
    match rotation % 4 {
        1 => position.x += extent,
        2 => {
            position.x += extent;
            position.y += extent;
        }
        3 => position.y += extent,
        _ => {}
    }
    Transform::new(position, rotation)
}

/// Where the asynchronous generation pipeline currently stands. Each
/// wave's worker handles live inside the variant; dropping the phase
/// abandons the workers.
enum GenerationPhase {
    Idle,
    RoomLayout(Vec<TaskHandle<Vec<LayoutEntry>>>),
    CorridorLayout(Vec<TaskHandle<Vec<LayoutEntry>>>),
    Populate(CellKind, Vec<TaskHandle<PopulateResult>>),
    /// Waiting for the start area instances to finish loading.
    AwaitingLoad,
}

/// Drives the whole pipeline: room/corridor/wall generation waves,
/// population, start area loading, and per-tick distance streaming
/// against a [`LevelWorld`] host.
///
/// All work is polled from [`LevelManager::tick`]; nothing blocks.
pub struct LevelManager<W: LevelWorld> {
    config: GenerationConfig,
    rng: StdRng,
    world: W,

    levels: Arc<Vec<LevelData>>,
    conditions: Arc<Vec<Box<dyn PopulateCondition>>>,
    spawn_data: Vec<ActorSpawnData>,

    grid: Grid,
    room_layouts: Vec<LayoutEntry>,
    corridor_layouts: Vec<LayoutEntry>,
    walls_layout: Option<LayoutEntry>,
    placements: Vec<LevelPlacement>,
    transition_cells: Vec<TransitionCellData>,

    phase: GenerationPhase,
    generating: bool,
    generating_pool: bool,
    loaded_count: usize,
    start_levels: usize,

    tracks: HashMap<usize, LoadedLevelTrack>,
    instance_placements: HashMap<InstanceId, usize>,
    pool: LevelPool,
    pool_pending: HashSet<InstanceId>,
    forced_visible: Vec<CellVisibilityStatus>,
    spawn_tracks: HashMap<usize, Vec<ActorSpawnTrack>>,

    events: EventDispatcher,
    streaming_enabled: bool,
}

impl<W: LevelWorld> LevelManager<W> {
    pub fn new(config: GenerationConfig, world: W) -> Self {
        let seed = rand::rng().random();
        Self::with_seed(config, world, seed)
    }

    /// Deterministic construction; every generation decision flows from
    /// this seed.
    pub fn with_seed(config: GenerationConfig, world: W, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            world,
            levels: Arc::new(Vec::new()),
            conditions: Arc::new(Vec::new()),
            spawn_data: Vec::new(),
            grid: Grid::new(),
            room_layouts: Vec::new(),
            corridor_layouts: Vec::new(),
            walls_layout: None,
            placements: Vec::new(),
            transition_cells: Vec::new(),
            phase: GenerationPhase::Idle,
            generating: false,
            generating_pool: false,
            loaded_count: 0,
            start_levels: 0,
            tracks: HashMap::new(),
            instance_placements: HashMap::new(),
            pool: LevelPool::new(),
            pool_pending: HashSet::new(),
            forced_visible: Vec::new(),
            spawn_tracks: HashMap::new(),
            events: EventDispatcher::new(),
            streaming_enabled: true,
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&LevelEvent) + Send + 'static) {
        self.events.subscribe(observer);
    }

    /// Parses and installs the level data table from JSON.
    pub fn load_level_table(&mut self, json: &str) -> Result<(), LevelGenError> {
        self.levels = Arc::new(load_level_table(json)?);
        Ok(())
    }

    /// Installs the level data table directly. Disabled rows are dropped.
    pub fn set_level_table(&mut self, rows: Vec<LevelData>) -> Result<(), LevelGenError> {
        let enabled: Vec<LevelData> = rows.into_iter().filter(|r| r.enabled).collect();
        if enabled.is_empty() {
            return Err(LevelGenError::EmptyLevelTable);
        }
        self.levels = Arc::new(enabled);
        Ok(())
    }

    pub fn set_conditions(&mut self, conditions: Vec<Box<dyn PopulateCondition>>) {
        self.conditions = Arc::new(conditions);
    }

    pub fn enable_auto_level_streaming(&mut self, enabled: bool) {
        self.streaming_enabled = enabled;
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn placements(&self) -> &[LevelPlacement] {
        &self.placements
    }

    pub fn transition_cells(&self) -> &[TransitionCellData] {
        &self.transition_cells
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// Kicks off a fresh generation. Fails without touching existing
    /// state when the table is unusable or a run is already active.
    pub fn generate(&mut self, spawn_data: Vec<ActorSpawnData>) -> Result<(), LevelGenError> {
        if self.generating {
            return Err(LevelGenError::GenerationInProgress);
        }
        if self.levels.is_empty() {
            return Err(LevelGenError::EmptyLevelTable);
        }
        let (min_rooms, max_rooms) = self.config.rooms_amount;
        let total = self.rng.random_range(min_rooms..=max_rooms.max(min_rooms));
        let counts = partition_room_counts(total, self.config.rooms_per_area);
        if counts.is_empty() {
            return Err(LevelGenError::NoRoomsGenerated);
        }

        self.clear();
        self.generating = true;
        self.spawn_data = spawn_data;
        self.events
            .emit(&LevelEvent::StateMessage("Generating level".into()));
        info!("generating level: {} rooms over {} areas", total, counts.len());

        let params = RoomLayoutParams::from(&self.config);
        let handles = counts
            .into_iter()
            .map(|count| {
                let p = params.clone();
                let seed: u64 = self.rng.random();
                TaskHandle::spawn(move || layout_rooms(seed, count, p))
            })
            .collect();
        self.phase = GenerationPhase::RoomLayout(handles);
        Ok(())
    }

    /// Polls worker waves, host notifications and distance streaming.
    /// Call once per frame.
    pub fn tick(&mut self) {
        for event in self.world.poll_events() {
            match event {
                HostEvent::InstanceLoaded(id) => self.on_instance_loaded(id),
                HostEvent::InstanceShown(id) => self.on_instance_shown(id),
            }
        }

        match std::mem::replace(&mut self.phase, GenerationPhase::Idle) {
            GenerationPhase::Idle => {
                if self.streaming_enabled && !self.generating && !self.placements.is_empty() {
                    self.handle_level_streaming();
                }
            }
            GenerationPhase::RoomLayout(mut handles) => {
                if handles.iter_mut().all(|h| h.is_completed()) {
                    let areas = handles.into_iter().filter_map(|mut h| h.take()).collect();
                    self.on_rooms_laid_out(areas);
                } else {
                    self.phase = GenerationPhase::RoomLayout(handles);
                }
            }
            GenerationPhase::CorridorLayout(mut handles) => {
                if handles.iter_mut().all(|h| h.is_completed()) {
                    let results = handles.into_iter().filter_map(|mut h| h.take()).collect();
                    self.on_corridors_laid_out(results);
                } else {
                    self.phase = GenerationPhase::CorridorLayout(handles);
                }
            }
            GenerationPhase::Populate(kind, mut handles) => {
                if handles.iter_mut().all(|h| h.is_completed()) {
                    let results: Vec<PopulateResult> =
                        handles.into_iter().filter_map(|mut h| h.take()).collect();
                    self.on_populate_done(kind, results);
                } else {
                    self.phase = GenerationPhase::Populate(kind, handles);
                }
            }
            GenerationPhase::AwaitingLoad => {
                self.phase = GenerationPhase::AwaitingLoad;
            }
        }
    }

    /// Hard cancel: abandons workers, destroys spawned actors, unloads
    /// every instance and resets all generated state.
    pub fn clear(&mut self) {
        self.phase = GenerationPhase::Idle;
        self.generating = false;
        self.generating_pool = false;

        let placements: Vec<usize> = self.spawn_tracks.keys().copied().collect();
        for placement in placements {
            if let Some(tracks) = self.spawn_tracks.remove(&placement) {
                for track in tracks {
                    if let SpawnState::Placed { actor, .. } = track.state {
                        self.world.destroy_actor(actor);
                    }
                }
            }
        }

        let instances: Vec<InstanceId> = self.tracks.values().filter_map(|t| t.instance).collect();
        self.tracks.clear();
        for id in instances {
            self.world.set_instance_visible(id, false);
            self.world.unload_instance(id);
        }
        for id in self.pool.drain_all() {
            self.world.unload_instance(id);
        }
        self.pool_pending.clear();
        self.instance_placements.clear();

        self.grid.clear();
        self.room_layouts.clear();
        self.corridor_layouts.clear();
        self.walls_layout = None;
        self.placements.clear();
        self.transition_cells.clear();
        self.forced_visible.clear();
        self.loaded_count = 0;
        self.start_levels = 0;
    }

    // ---- generation waves ----

    fn on_rooms_laid_out(&mut self, areas: Vec<Vec<LayoutEntry>>) {
        let (rooms, grid_size) = compose_areas(&mut self.rng, &self.config, areas);
        if rooms.is_empty() {
            error!("room layout produced no rooms; aborting generation");
            self.generating = false;
            return;
        }
        self.grid.set_size(grid_size);
        let mut cells = Vec::new();
        for room in &rooms {
            cells.extend(room.cells.clone());
        }
        self.grid.append(cells);
        self.room_layouts = rooms;
        info!(
            "rooms laid out: {} rooms on a {}x{} grid",
            self.room_layouts.len(),
            grid_size.x,
            grid_size.y
        );

        if self.room_layouts.len() > 1 {
            self.start_corridor_wave();
        } else {
            self.on_corridors_laid_out(Vec::new());
        }
    }

    fn start_corridor_wave(&mut self) {
        let origin = self.config.grid_origin();
        let mut pool = build_room_edges(&self.room_layouts, self.config.cell_size, &origin);
        let start_room = self.start_room_index().unwrap_or(0);
        let mut edges = grow_spanning_edges(self.room_layouts.len(), start_room, &mut pool);
        edges.extend(pick_circular_edges(
            &mut self.rng,
            &pool,
            self.config.circular_corridors_percent,
            self.config.max_circular_corridor_cells,
            self.config.cell_size,
            self.room_layouts.len(),
        ));

        let rooms = Arc::new(self.room_layouts.clone());
        let handles: Vec<TaskHandle<Vec<LayoutEntry>>> =
            chunk_edges(edges, self.config.max_corridor_threads)
                .into_iter()
                .map(|chunk| {
                    let params = CorridorParams {
                        selection: self.config.corridor_path_selection,
                        threshold: self.config.corridor_threshold,
                        rooms: Arc::clone(&rooms),
                    };
                    let seed: u64 = self.rng.random();
                    TaskHandle::spawn(move || layout_corridors(seed, chunk, params))
                })
                .collect();
        if handles.is_empty() {
            self.on_corridors_laid_out(Vec::new());
        } else {
            self.phase = GenerationPhase::CorridorLayout(handles);
        }
    }

    fn on_corridors_laid_out(&mut self, results: Vec<Vec<LayoutEntry>>) {
        let mut corridors: Vec<LayoutEntry> = results.into_iter().flatten().collect();
        let existing = self.grid.snapshot();
        dedup_cells(&mut corridors, &existing);
        corridors.retain(|c| !c.cells.is_empty());
        let mut cells = Vec::new();
        for (i, corridor) in corridors.iter_mut().enumerate() {
            corridor.grid_id = i;
            corridor.fit_bounds_to_cells();
            cells.extend(corridor.cells.clone());
        }
        self.grid.append(cells);
        self.corridor_layouts = corridors;
        info!("corridors laid out: {} segments", self.corridor_layouts.len());

        let occupied = self.grid.snapshot();
        let mut walls =
            synthesize_walls(self.grid.size(), &occupied, self.config.walls_cell_size);
        resolve_wall_biomes(&self.config.possible_biomes, &occupied, &mut walls.cells);
        self.grid.append(walls.cells.clone());
        self.walls_layout = Some(walls);

        let mut all_cells = self.grid.snapshot();
        let mutated = mutate_transition_cells(&self.config.possible_biomes, &mut all_cells);
        if !mutated.is_empty() {
            info!("{} cells mutated into biome transitions", mutated.len());
            self.grid.upsert(mutated.clone());
            apply_mutations_to_layouts(&mutated, &mut self.room_layouts);
            apply_mutations_to_layouts(&mutated, &mut self.corridor_layouts);
            if let Some(walls) = self.walls_layout.as_mut() {
                apply_mutations_to_layouts(&mutated, std::slice::from_mut(walls));
            }
        }

        self.events
            .emit(&LevelEvent::StateMessage("Populating level".into()));
        self.start_populate_wave(CellKind::Room);
    }

    fn start_populate_wave(&mut self, kind: CellKind) {
        let layouts: Vec<LayoutEntry> = match kind {
            CellKind::Room => self.room_layouts.clone(),
            CellKind::Corridor => self.corridor_layouts.clone(),
            CellKind::Blocking => self.walls_layout.clone().into_iter().collect(),
        };
        let params = PopulateParams {
            transition_enabled: self.config.transition_enabled,
            levels: Arc::clone(&self.levels),
            conditions: Arc::clone(&self.conditions),
        };
        let handles: Vec<TaskHandle<PopulateResult>> = layouts
            .into_iter()
            .map(|layout| {
                let p = params.clone();
                let seed: u64 = self.rng.random();
                TaskHandle::spawn(move || populate_layout(seed, p, layout))
            })
            .collect();
        if handles.is_empty() {
            self.on_populate_done(kind, Vec::new());
        } else {
            self.phase = GenerationPhase::Populate(kind, handles);
        }
    }

    fn on_populate_done(&mut self, kind: CellKind, results: Vec<PopulateResult>) {
        for result in results {
            self.merge_populate_result(result);
        }
        match kind {
            CellKind::Room => {
                if self.corridor_layouts.is_empty() {
                    self.start_populate_wave(CellKind::Blocking);
                } else {
                    self.start_populate_wave(CellKind::Corridor);
                }
            }
            CellKind::Corridor => self.start_populate_wave(CellKind::Blocking),
            CellKind::Blocking => self.start_stream_load(),
        }
    }

    fn merge_populate_result(&mut self, result: PopulateResult) {
        let offset = self.placements.len();
        self.placements.extend(result.placements);

        let mut cells = result.cells;
        for cell in &mut cells {
            if let Some(local) = cell.placement_index {
                cell.placement_index = Some(local + offset);
            }
        }
        self.grid.upsert(cells.clone());

        let target = match result.kind {
            CellKind::Room => self
                .room_layouts
                .iter_mut()
                .find(|l| l.grid_id == result.layout_grid_id),
            CellKind::Corridor => self
                .corridor_layouts
                .iter_mut()
                .find(|l| l.grid_id == result.layout_grid_id),
            CellKind::Blocking => self
                .walls_layout
                .as_mut()
                .filter(|l| l.grid_id == result.layout_grid_id),
        };
        match target {
            Some(layout) => layout.cells = cells,
            None => error!(
                "populate result for unknown {:?} layout {}",
                result.kind, result.layout_grid_id
            ),
        }
    }

    // ---- start area loading ----

    fn start_stream_load(&mut self) {
        info!(
            "population done: {} placements; start streaming load",
            self.placements.len()
        );
        self.phase = GenerationPhase::AwaitingLoad;
        if self.config.use_level_pool {
            self.initialize_level_pool();
        } else {
            self.generating_pool = false;
            self.create_all_start_area_instances();
        }
    }

    fn initialize_level_pool(&mut self) {
        self.generating_pool = true;
        self.loaded_count = 0;
        let origin = self.config.grid_origin();
        let radius = self.config.load_distance + self.config.load_distance_tolerance;

        let mut created = 0;
        for row in 0..self.levels.len() {
            let needed = min_pool_size(
                row,
                &self.placements,
                self.config.cell_size,
                &origin,
                radius,
            );
            let name = self.levels[row].name.clone();
            for _ in 0..needed {
                match self.world.create_instance(
                    &name,
                    Transform::new(origin, 0),
                    self.config.start_levels_block_on_load,
                ) {
                    Some(id) => {
                        self.pool.add(row, id);
                        self.pool_pending.insert(id);
                        created += 1;
                    }
                    None => error!("host refused pool instance for level {}", name),
                }
            }
        }
        self.start_levels = created;
        info!("level pool warming up with {} instances", created);

        if created == 0 {
            self.generating_pool = false;
            self.create_all_start_area_instances();
        }
    }

    fn create_all_start_area_instances(&mut self) {
        self.loaded_count = 0;
        let indices: Vec<usize> = if self.config.create_levels_at_runtime {
            self.start_area_placements()
        } else {
            (0..self.placements.len()).collect()
        };

        let mut created = 0;
        for index in indices {
            if self.create_level_instance(index, self.config.start_levels_block_on_load) {
                created += 1;
            }
        }
        self.start_levels = created;
        info!("start area: {} level instances requested", created);

        if created == 0 {
            error!("no start area level instances were created");
            self.events.emit(&LevelEvent::AllLevelsLoaded);
            self.finish_generation();
        }
    }

    /// Placements whose cells fall inside the square start area.
    fn start_area_placements(&self) -> Vec<usize> {
        let Some(start) = self.start_cell() else {
            return Vec::new();
        };
        let cells = self.grid.snapshot();
        let wanted: Vec<GridPoint> = cells
            .iter()
            .map(|c| c.id)
            .filter(|id| {
                (id.x - start.x).abs() <= START_AREA_RADIUS
                    && (id.y - start.y).abs() <= START_AREA_RADIUS
            })
            .collect();
        let mut out = Vec::new();
        placements_of_cells(&wanted, &cells, &mut out);
        out
    }

    /// Pulls an instance from the pool or asks the host for a fresh one,
    /// shows it and tracks it as loading. Returns false when nothing was
    /// created.
    fn create_level_instance(&mut self, placement: usize, block_on_load: bool) -> bool {
        if self
            .tracks
            .get(&placement)
            .is_some_and(|t| t.is_loaded_or_loading())
        {
            return false;
        }
        let Some(data) = self.placements.get(placement) else {
            error!("create requested for unknown placement {}", placement);
            return false;
        };
        let row = data.level_data_index;
        let transform = self.placement_transform(placement);

        let instance = match self.pool.take(row) {
            Some(id) => {
                self.world.set_instance_transform(id, transform);
                Some(id)
            }
            None => {
                let name = self.levels[row].name.clone();
                self.world.create_instance(&name, transform, block_on_load)
            }
        };

        match instance {
            Some(id) => {
                self.world.set_instance_visible(id, true);
                self.instance_placements.insert(id, placement);
                self.tracks
                    .insert(placement, LoadedLevelTrack::loading(placement, Some(id)));
                true
            }
            None => {
                error!("host refused instance for placement {}", placement);
                false
            }
        }
    }

    fn placement_transform(&self, placement: usize) -> Transform {
        let data = &self.placements[placement];
        let size = self
            .levels
            .get(data.level_data_index)
            .map(|l| l.size.max(1))
            .unwrap_or(1);
        placed_level_transform(
            data.grid_position,
            data.rotation,
            size,
            self.config.cell_size,
            &self.config.grid_origin(),
        )
    }

    // ---- host notifications ----

    fn on_instance_loaded(&mut self, id: InstanceId) {
        if self.generating_pool && self.pool_pending.remove(&id) {
            self.loaded_count += 1;
            if self.loaded_count >= self.start_levels {
                self.generating_pool = false;
                info!("level pool ready with {} instances", self.start_levels);
                self.create_all_start_area_instances();
            }
        }
    }

    fn on_instance_shown(&mut self, id: InstanceId) {
        let Some(&placement) = self.instance_placements.get(&id) else {
            return;
        };
        self.set_spawned_actors_visibility(placement, true);

        if let Some(track) = self.tracks.get(&placement).cloned() {
            let updated = LoadedLevelTrack {
                first_load: false,
                ..track.with_state(LevelState::Loaded)
            };
            self.tracks.insert(placement, updated);
        }

        let client = self.level_client_data(placement);
        self.events.emit(&LevelEvent::VisibilityChanged {
            placement_index: placement,
            visible: true,
            client,
        });

        if matches!(self.phase, GenerationPhase::AwaitingLoad) {
            self.loaded_count += 1;
            if self.loaded_count >= self.start_levels {
                self.events.emit(&LevelEvent::AllLevelsLoaded);
                self.finish_generation();
            }
        }
    }

    fn finish_generation(&mut self) {
        let cells = self.grid.snapshot();
        let placements = &self.placements;
        let mut transition = collect_transition_cells(&cells, |cell| {
            cell.placement_index
                .and_then(|p| placements.get(p))
                .map(|p| p.rotation)
                .unwrap_or(0)
        });
        let iterations = resolve_transition_quads(&mut self.rng, &mut transition);
        self.transition_cells = transition;

        let start_cell = self.start_cell().unwrap_or(GridPoint::new(-1, -1));
        self.events
            .emit(&LevelEvent::TransitionCellsGenerated(TransitionInitData {
                cell_size: self.config.cell_size,
                origin: self.config.grid_origin(),
                start_cell,
                cells: self.transition_cells.clone(),
            }));

        let mut layouts = self.room_layouts.clone();
        layouts.extend(self.corridor_layouts.clone());
        let start_room = self.start_room_index();
        self.spawn_tracks = generate_spawn_tracks(
            &mut self.rng,
            &self.spawn_data,
            &cells,
            &layouts,
            start_cell,
            start_room,
        );

        set_cell_visibility_status(&mut self.forced_visible, start_cell, -1);
        self.generating = false;
        self.phase = GenerationPhase::Idle;
        self.events.emit(&LevelEvent::GenerationCompleted);
        info!(
            "level generated: {} cells, {} placements, {} transition cells ({} propagation iterations)",
            cells.len(),
            self.placements.len(),
            self.transition_cells.len(),
            iterations
        );
    }

    // ---- streaming ----

    fn handle_level_streaming(&mut self) {
        tick_visibility_statuses(&mut self.forced_visible);
        let cells = self.grid.snapshot();
        let origin = self.config.grid_origin();

        let forced_cells: Vec<GridPoint> = self.forced_visible.iter().map(|s| s.cell).collect();
        let mut must_load = Vec::new();
        placements_of_cells(&forced_cells, &cells, &mut must_load);

        if self.config.track_tagged_actors {
            let tracked = self.world.tracked_positions();
            placements_between_positions(
                &tracked,
                0.0,
                self.config.cell_size,
                false,
                &cells,
                self.config.cell_size,
                &origin,
                &mut must_load,
            );
        }

        let players = self.world.player_positions();
        placements_between_positions(
            &players,
            0.0,
            self.config.load_distance,
            false,
            &cells,
            self.config.cell_size,
            &origin,
            &mut must_load,
        );

        let mut may_remain = Vec::new();
        placements_between_positions(
            &players,
            self.config.load_distance,
            self.config.load_distance + self.config.load_distance_tolerance,
            true,
            &cells,
            self.config.cell_size,
            &origin,
            &mut may_remain,
        );

        let prev: Vec<usize> = self
            .tracks
            .values()
            .filter(|t| t.is_loaded_or_loading())
            .map(|t| t.placement_index)
            .collect();

        for placement in &prev {
            if must_load.contains(placement) || may_remain.contains(placement) {
                self.retry_pending_spawns(*placement);
            } else {
                self.change_level_visibility(*placement, false);
            }
        }

        for placement in &must_load {
            let active = self
                .tracks
                .get(placement)
                .is_some_and(|t| t.is_loaded_or_loading());
            if !active {
                self.change_level_visibility(*placement, true);
                self.events.emit(&LevelEvent::NewLevelShown {
                    placement_index: *placement,
                });
            }
        }

        if self.config.use_level_pool {
            self.reapply_loading_transforms();
        }

        let now: Vec<usize> = self
            .tracks
            .values()
            .filter(|t| t.is_loaded_or_loading())
            .map(|t| t.placement_index)
            .collect();
        self.emit_transition_cell_visibility(&prev, &now, &cells);
    }

    fn change_level_visibility(&mut self, placement: usize, visible: bool) {
        if visible {
            match self.tracks.get(&placement).and_then(|t| t.instance) {
                Some(id) => {
                    self.world.set_instance_visible(id, true);
                    if let Some(track) = self.tracks.get(&placement).cloned() {
                        self.tracks
                            .insert(placement, track.with_state(LevelState::Loading));
                    }
                }
                None => {
                    self.create_level_instance(placement, self.config.runtime_levels_block_on_load);
                }
            }
            return;
        }

        if !self.can_hide_level(placement) {
            return;
        }
        self.set_spawned_actors_visibility(placement, false);

        let Some(track) = self.tracks.get(&placement).cloned() else {
            return;
        };
        match track.instance {
            Some(id) => {
                self.world.set_instance_visible(id, false);
                self.instance_placements.remove(&id);
                if self.config.use_level_pool && !self.generating_pool {
                    let row = self.placements[placement].level_data_index;
                    self.pool.add(row, id);
                } else {
                    self.world.unload_instance(id);
                }
                self.tracks.insert(
                    placement,
                    LoadedLevelTrack {
                        placement_index: placement,
                        state: LevelState::Unloaded,
                        first_load: false,
                        instance: None,
                    },
                );
                let client = self.level_client_data(placement);
                self.events.emit(&LevelEvent::VisibilityChanged {
                    placement_index: placement,
                    visible: false,
                    client,
                });
            }
            None => error!("hide requested for placement {} without an instance", placement),
        }
    }

    /// A level may not hide while something stands inside any of its
    /// cells.
    fn can_hide_level(&self, placement: usize) -> bool {
        let cells = self.grid.snapshot();
        let covered = cells_of_placements(&[placement], &cells);
        let origin = self.config.grid_origin();
        let half = WorldPoint::new(
            self.config.cell_size / 2.0,
            self.config.cell_size / 2.0,
            5000.0,
        );
        !covered.iter().any(|id| {
            self.world
                .box_is_occupied(cell_world_position(*id, self.config.cell_size, &origin), half)
        })
    }

    /// Streaming levels only accept moves while hidden, so pooled
    /// instances retry their transform until it sticks.
    fn reapply_loading_transforms(&mut self) {
        let pending: Vec<(usize, InstanceId)> = self
            .tracks
            .values()
            .filter(|t| t.state == LevelState::Loading)
            .filter_map(|t| t.instance.map(|id| (t.placement_index, id)))
            .collect();
        for (placement, id) in pending {
            let transform = self.placement_transform(placement);
            let _ = self.world.set_instance_transform(id, transform);
        }
    }

    fn emit_transition_cell_visibility(
        &mut self,
        prev: &[usize],
        now: &[usize],
        cells: &[crate::grid::CellData],
    ) {
        let prev_cells: HashSet<GridPoint> =
            cells_of_placements(prev, cells).into_iter().collect();
        let now_cells: HashSet<GridPoint> = cells_of_placements(now, cells).into_iter().collect();

        for id in now_cells.difference(&prev_cells) {
            if self.is_transition_cell(*id) {
                self.events.emit(&LevelEvent::TransitionCellVisible {
                    cell: *id,
                    visible: true,
                });
            }
        }
        for id in prev_cells.difference(&now_cells) {
            if self.is_transition_cell(*id) {
                self.events.emit(&LevelEvent::TransitionCellVisible {
                    cell: *id,
                    visible: false,
                });
            }
        }
    }

    fn is_transition_cell(&self, id: GridPoint) -> bool {
        self.transition_cells.iter().any(|d| d.cell.id == id)
    }

    // ---- actors ----

    fn set_spawned_actors_visibility(&mut self, placement: usize, visible: bool) {
        let Some(mut tracks) = self.spawn_tracks.remove(&placement) else {
            return;
        };
        for track in tracks.iter_mut() {
            self.apply_actor_track(track, visible);
        }
        self.spawn_tracks.insert(placement, tracks);
    }

    /// Ground traces fail while a level is still streaming in, so
    /// pending spawns are retried every tick for loaded levels.
    fn retry_pending_spawns(&mut self, placement: usize) {
        if !self
            .tracks
            .get(&placement)
            .is_some_and(|t| t.state == LevelState::Loaded)
        {
            return;
        }
        let Some(mut tracks) = self.spawn_tracks.remove(&placement) else {
            return;
        };
        for track in tracks.iter_mut() {
            if matches!(track.state, SpawnState::Pending) {
                self.apply_actor_track(track, true);
            }
        }
        self.spawn_tracks.insert(placement, tracks);
    }

    fn apply_actor_track(&mut self, track: &mut ActorSpawnTrack, visible: bool) {
        match track.state {
            SpawnState::Pending => {
                if !visible {
                    return;
                }
                let position = cell_world_position_at_anchor(
                    track.cell,
                    self.config.cell_size,
                    &self.config.grid_origin(),
                    track.anchor,
                );
                let Some(ground) = self.world.ground_height(position.x, position.y) else {
                    return;
                };
                let transform =
                    Transform::new(WorldPoint::new(position.x, position.y, ground), 0);
                let Some(data) = self.spawn_data.get(track.spawn_data_index) else {
                    return;
                };
                let Some(actor) = self.world.spawn_actor(data.class_id, transform) else {
                    error!("host refused actor spawn for class {}", data.class_id);
                    return;
                };
                let biome = self.cell_prominent_biome(track.cell);
                self.world.notify_actor_biome(actor, true, &biome);
                track.state = SpawnState::Placed {
                    actor,
                    transform,
                    visible: true,
                };
            }
            SpawnState::Placed {
                actor, transform, ..
            } => {
                self.world.set_actor_hidden(actor, !visible);
                if visible {
                    self.world.set_actor_transform(actor, transform);
                }
                let biome = self.cell_prominent_biome(track.cell);
                self.world.notify_actor_biome(actor, visible, &biome);
                track.state = SpawnState::Placed {
                    actor,
                    transform,
                    visible,
                };
            }
        }
    }

    // ---- queries ----

    pub fn start_room_index(&self) -> Option<usize> {
        closest_entry_to_anchor(
            &self.room_layouts,
            CellKind::Room,
            self.config.start_room_anchor,
            self.grid.size(),
        )
    }

    /// The cell of the start room closest to the start cell anchor.
    pub fn start_cell(&self) -> Option<GridPoint> {
        let room = self.start_room_index()?;
        let target = grid_cell_at_anchor(self.grid.size(), self.config.start_cell_anchor);
        self.room_layouts[room].closest_cell_to(target)
    }

    /// World center of the start cell. Fails until a level exists.
    pub fn player_start_position(&self) -> Result<WorldPoint, LevelGenError> {
        self.start_cell()
            .map(|cell| cell_world_position(cell, self.config.cell_size, &self.config.grid_origin()))
            .ok_or(LevelGenError::NotGenerated)
    }

    /// Pins the start cell visible, or lets it decay over a grace period.
    pub fn set_start_cell_visibility(&mut self, visible: bool) {
        let Some(cell) = self.start_cell() else {
            return;
        };
        let ticks = if visible { -1 } else { START_CELL_HIDE_TICKS };
        set_cell_visibility_status(&mut self.forced_visible, cell, ticks);
    }

    /// Forces any cell visible for a number of ticks; negative pins it.
    pub fn set_cell_visibility(&mut self, cell: GridPoint, ticks: i32) {
        set_cell_visibility_status(&mut self.forced_visible, cell, ticks);
    }

    /// The dominant biome at a cell, looking through transitions.
    pub fn cell_prominent_biome(&self, cell: GridPoint) -> CellBiome {
        match self.grid.cell_at(cell) {
            Some(data) if data.biome.is_transition() => {
                prominent_transition_biome(cell, &self.transition_cells)
            }
            Some(data) => data.biome,
            None => CellBiome::Unset,
        }
    }

    fn level_client_data(&self, placement: usize) -> LevelClientData {
        let data = &self.placements[placement];
        let row = &self.levels[data.level_data_index];
        let biome = self
            .grid
            .cell_at(data.grid_position)
            .map(|c| c.biome)
            .unwrap_or(CellBiome::Unset);
        let quads = self
            .transition_cells
            .iter()
            .find(|d| d.cell.id == data.grid_position)
            .map(|d| d.slots.clone());
        LevelClientData {
            placement_index: placement,
            level_name: row.name.clone(),
            is_transition: biome.is_transition(),
            biome,
            quads,
            allow_reposition: row.allow_reposition,
        }
    }
}
