//! # Zone State Module
//!
//! Everything one server zone owns for its terrain.
//!
//! ## Key Components
//!
//! * `ZoneState` - The per-zone coordinator driven by `tick()`
//! * `terrain` - Layer storage, areas, slope and terraform barriers
//! * `nature` - The vegetation automaton run over cube-sized areas
//! * `replication` - Change monitoring, per-viewer grids and wire packets
//! * `task_management` - Worker threads running viewer flush passes
//!
//! ## Tick
//!
//! A tick runs `cubes_per_tick` nature passes inside one `TerrainUpdateMonitor` scope,
//! walking the zone cube by cube in row-major order and wrapping around. When the scope
//! closes, every change is handed to every viewer and slope is brought up to date. The
//! tick then schedules one flush task per viewer whose previous flush has finished and
//! folds finished flush results into the zone's replication statistics.
//!
//! The tick itself never blocks on viewers: flush tasks read the terrain with a bounded
//! wait and skip their pass if the tick holds the write lock.

pub mod nature;
pub mod replication;
pub mod task_management;
pub mod terrain;

use std::sync::Arc;

use log::{debug, info};
use web_time::Duration;

use crate::{
    config::ZoneConfig,
    core::MtResource,
    error::{ConfigError, PacketError},
};
use nature::{
    update_nature_cube, EffectSink, LogEffects, NatureContext, NatureCube, NoStructures, PlantRuleProvider,
    StructureLocator,
};
use replication::{
    AreaEditPacket, MonitorReport, PacketCache, TerrainUpdateMonitor, TerrainUpdateNotifier, ViewerRegistry,
    ViewerSession,
};
use task_management::{NotifierFlushTask, ReplicationStats, TaskManager};
use terrain::{Area, Terrain};

/// What one `tick` did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub cubes: usize,
    pub committed: usize,
    pub monitor: MonitorReport,
    pub flushes_scheduled: usize,
}

pub struct ZoneState {
    config: ZoneConfig,
    terrain: MtResource<Terrain>,
    rules: Arc<dyn PlantRuleProvider>,
    structures: Arc<dyn StructureLocator>,
    effects: Arc<dyn EffectSink>,
    viewers: ViewerRegistry,
    task_manager: TaskManager,
    packet_cache: Arc<PacketCache>,
    rng: fastrand::Rng,
    nature_cursor: usize,
    ticks: u64,
    stats: ReplicationStats,
}

impl ZoneState {
    /// Creates a zone around existing terrain.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] if the configuration does not validate or the terrain
    /// dimensions differ from the configured ones.
    pub fn new(config: ZoneConfig, terrain: Terrain, rules: Arc<dyn PlantRuleProvider>) -> Result<Self, ConfigError> {
        config.validate()?;
        if terrain.width() != config.width || terrain.height() != config.height {
            return Err(ConfigError::Invalid("terrain does not match the configured zone dimensions"));
        }
        info!(
            "Zone {} created: {}x{} {:?}, {} plant rules",
            config.id,
            config.width,
            config.height,
            config.tier,
            rules.rules().len()
        );
        Ok(ZoneState {
            viewers: ViewerRegistry::new(
                config.width,
                config.height,
                config.grid_cell_size,
                config.visibility_radius,
            ),
            task_manager: TaskManager::new(config.worker_count),
            packet_cache: Arc::new(PacketCache::new(config.packet_cache_capacity)),
            rng: fastrand::Rng::with_seed(config.seed),
            terrain: MtResource::new(terrain),
            rules,
            structures: Arc::new(NoStructures),
            effects: Arc::new(LogEffects),
            nature_cursor: 0,
            ticks: 0,
            stats: ReplicationStats::default(),
            config,
        })
    }

    pub fn with_structures(mut self, structures: Arc<dyn StructureLocator>) -> Self {
        self.structures = structures;
        self
    }

    pub fn with_effects(mut self, effects: Arc<dyn EffectSink>) -> Self {
        self.effects = effects;
        self
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    pub fn terrain(&self) -> &MtResource<Terrain> {
        &self.terrain
    }

    pub fn viewers(&self) -> &ViewerRegistry {
        &self.viewers
    }

    pub fn stats(&self) -> ReplicationStats {
        self.stats
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn packet_cache(&self) -> &PacketCache {
        &self.packet_cache
    }

    pub fn connect_viewer(&self, session: Arc<dyn ViewerSession>) -> Arc<TerrainUpdateNotifier> {
        self.viewers.connect(session)
    }

    pub fn disconnect_viewer(&self, id: u64) -> bool {
        self.viewers.disconnect(id)
    }

    fn cube_columns(&self) -> usize {
        self.config.width.div_ceil(self.config.cube_size)
    }

    fn cube_count(&self) -> usize {
        self.cube_columns() * self.config.height.div_ceil(self.config.cube_size)
    }

    /// The cube at `index` in row-major order, clamped to the zone.
    fn cube_area(&self, index: usize) -> Area {
        let size = self.config.cube_size;
        let columns = self.cube_columns();
        let x1 = ((index % columns) * size) as i32;
        let y1 = ((index / columns) * size) as i32;
        Area::new(x1, y1, x1 + size as i32 - 1, y1 + size as i32 - 1).clamp(self.config.width, self.config.height)
    }

    fn next_cube_areas(&mut self, count: usize) -> Vec<Area> {
        let total = self.cube_count();
        (0..count)
            .map(|_| {
                let area = self.cube_area(self.nature_cursor);
                self.nature_cursor = (self.nature_cursor + 1) % total;
                area
            })
            .collect()
    }

    /// Runs `pass` on every area in `areas` inside one monitor scope.
    fn run_nature<F>(&mut self, areas: Vec<Area>, pass: F) -> (usize, MonitorReport)
    where
        F: Fn(&mut NatureCube<'_>),
    {
        let rngs: Vec<fastrand::Rng> = areas.iter().map(|_| self.rng.fork()).collect();
        let context = NatureContext {
            rules: &*self.rules,
            config: &self.config,
            structures: &*self.structures,
        };
        let terrain = &self.terrain;
        let effects = &*self.effects;
        TerrainUpdateMonitor::run(terrain, &self.viewers, || {
            areas
                .into_iter()
                .zip(rngs)
                .map(|(area, rng)| update_nature_cube(terrain, area, context, rng, effects, &pass))
                .filter(|committed| *committed)
                .count()
        })
    }

    /// Advances the zone by one simulation step.
    pub fn tick(&mut self) -> TickReport {
        self.task_manager.process_completed_tasks(&mut self.stats);

        let count = self.config.cubes_per_tick.min(self.cube_count());
        let areas = self.next_cube_areas(count);
        let cubes = areas.len();
        let (committed, monitor) = self.run_nature(areas, |cube| cube.process_all());

        let flushes_scheduled = self.schedule_flushes();
        self.task_manager.process_queued_tasks();
        self.ticks += 1;

        let report = TickReport {
            cubes,
            committed,
            monitor,
            flushes_scheduled,
        };
        debug!("Zone {} tick {}: {:?}", self.config.id, self.ticks, report);
        report
    }

    /// Repairs every cube of the zone without growing or spawning anything.
    ///
    /// Meant for freshly loaded terrain, whose plant data may predate the current rules.
    pub fn correct_all(&mut self) -> usize {
        let areas: Vec<Area> = (0..self.cube_count()).map(|index| self.cube_area(index)).collect();
        let (committed, monitor) = self.run_nature(areas, |cube| cube.correct_only());
        info!(
            "Zone {} corrected: {} cubes changed, {} updates",
            self.config.id, committed, monitor.updates
        );
        committed
    }

    fn schedule_flushes(&mut self) -> usize {
        let mut scheduled = 0;
        for notifier in self.viewers.notifiers() {
            let Some(reservation) = notifier.try_reserve_flush() else {
                continue;
            };
            self.task_manager.publish_task(Box::new(NotifierFlushTask::new(
                reservation,
                self.terrain.downgrade(),
                self.packet_cache.clone(),
                self.config.lock_wait(),
            )));
            scheduled += 1;
        }
        scheduled
    }

    /// Decodes and applies a viewer's area edit.
    ///
    /// The edit runs inside its own monitor scope, so it is replicated to every viewer
    /// (the sender included) and altitude edits refresh slope.
    pub fn apply_area_edit(&self, bytes: &[u8]) -> Result<Area, PacketError> {
        let edit = AreaEditPacket::decode(bytes)?;
        let (applied, _) = TerrainUpdateMonitor::run(&self.terrain, &self.viewers, || {
            edit.apply(&mut self.terrain.get_mut())
        });
        let area = applied?;
        debug!("Zone {} applied {:?} edit over {:?}", self.config.id, edit.layer, area);
        Ok(area)
    }

    /// Handles finished flushes until the workers are idle or `budget` runs out.
    pub fn wait_for_flushes(&mut self, budget: Duration) -> bool {
        self.task_manager.wait_for_idle(&mut self.stats, budget)
    }
}
