//! # Standalone Zone Host
//!
//! Runs a single zone in-process, with no network in front of it. Terrain is generated
//! from Perlin noise, and every viewer is a [`ReplicaViewer`] that decodes the packets it
//! receives into its own copy of the terrain. Comparing that copy with the zone after the
//! run shows whether replication kept up.
//!
//! ## Usage
//! ```ignore
//! let report = standalone::run_zone(config, rules, &StandaloneOptions::default())?;
//! info!("{} flush passes", report.stats.passes);
//! ```

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, PoisonError,
};

use cgmath::Point2;
use log::{info, trace, warn};
use noise::{NoiseFn, Perlin};
use web_time::{Duration, Instant};

use crate::{
    config::ZoneConfig,
    error::{ConfigError, SessionError},
    zone_state::{
        nature::PlantRuleProvider,
        replication::{LayerUpdatePacket, ViewerSession},
        task_management::ReplicationStats,
        terrain::{
            altitude::{BarrierRange, UniformBlend, ALTITUDE_SCALE},
            cells::PlantInfo,
            Area, Terrain,
        },
        ZoneState,
    },
};

/// Scaling factor applied to tile coordinates when sampling Perlin noise.
pub const NOISE_SCALE: f64 = 0.045;

/// Height of the tallest generated hill, in world units.
pub const MAX_HILL_HEIGHT: f32 = 120.0;

/// Number of distinct ground types laid down by the generator.
pub const GROUND_TYPES: u8 = 3;

/// Settings for one standalone run.
#[derive(Clone, Debug)]
pub struct StandaloneOptions {
    pub ticks: u64,
    pub viewers: u64,
    /// Tiles each viewer walks per tick.
    pub viewer_speed: i32,
    /// Budget for draining flush tasks after every tick.
    pub flush_budget: Duration,
}

impl Default for StandaloneOptions {
    fn default() -> Self {
        StandaloneOptions {
            ticks: 64,
            viewers: 3,
            viewer_speed: 2,
            flush_budget: Duration::from_secs(1),
        }
    }
}

/// Per-viewer outcome of a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ViewerReport {
    pub id: u64,
    pub packets: usize,
    pub rejected: usize,
    /// Plant or blocking tiles inside the viewer's final window that differ from the zone.
    pub mismatched: usize,
}

#[derive(Clone, Debug)]
pub struct StandaloneReport {
    pub ticks: u64,
    pub committed: usize,
    pub stats: ReplicationStats,
    pub viewers: Vec<ViewerReport>,
    pub elapsed: Duration,
}

/// A viewer that keeps a local terrain replica up to date from the packets it receives.
pub struct ReplicaViewer {
    id: u64,
    position: Mutex<Point2<i32>>,
    replica: Mutex<Terrain>,
    packets: AtomicUsize,
    rejected: AtomicUsize,
}

impl ReplicaViewer {
    pub fn new(id: u64, position: Point2<i32>, replica: Terrain) -> Self {
        ReplicaViewer {
            id,
            position: Mutex::new(position),
            replica: Mutex::new(replica),
            packets: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
        }
    }

    pub fn move_to(&self, position: Point2<i32>) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = position;
    }

    pub fn packets(&self) -> usize {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Counts plant and blocking tiles in `area` where the replica and `authority` differ.
    pub fn mismatched(&self, authority: &Terrain, area: Area) -> usize {
        let replica = self.replica.lock().unwrap_or_else(PoisonError::into_inner);
        let area = area.clamp(authority.width(), authority.height());
        area.cells()
            .filter(|&(x, y)| {
                let (x, y) = (x as usize, y as usize);
                replica.plants().get(x, y) != authority.plants().get(x, y)
                    || replica.blocking().get(x, y) != authority.blocking().get(x, y)
            })
            .count()
    }
}

impl ViewerSession for ReplicaViewer {
    fn id(&self) -> u64 {
        self.id
    }

    fn position(&self) -> Point2<i32> {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_packet(&self, packet: &[u8]) -> Result<(), SessionError> {
        self.packets.fetch_add(1, Ordering::Relaxed);
        let mut replica = self.replica.lock().unwrap_or_else(PoisonError::into_inner);
        match LayerUpdatePacket::decode(packet).and_then(|update| update.apply(&mut replica)) {
            Ok(area) => trace!("Viewer {} applied update over {:?}", self.id, area),
            Err(error) => {
                warn!("Viewer {} rejected a packet: {}", self.id, error);
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

/// Generates rolling terrain for `config`.
///
/// Altitude and soil come from two octaves of the same Perlin source, so a given seed
/// always produces the same zone. Spawn probability falls off with height.
pub fn generate_terrain(config: &ZoneConfig) -> Terrain {
    let perlin = Perlin::new(config.seed as u32);
    let (width, height) = (config.width, config.height);
    let mut altitude = Vec::with_capacity(width * height);
    let mut plants = Vec::with_capacity(width * height);

    for y in 0..height {
        for x in 0..width {
            let sample_x = x as f64 * NOISE_SCALE;
            let sample_y = y as f64 * NOISE_SCALE;
            let hill = ((perlin.get([sample_x, sample_y]) + 1.0) * 0.5).clamp(0.0, 1.0) as f32;
            let soil = ((perlin.get([sample_x * 3.0, sample_y * 3.0, 0.5]) + 1.0) * 0.5).clamp(0.0, 1.0);

            altitude.push((hill * MAX_HILL_HEIGHT * ALTITUDE_SCALE) as u16);
            plants.push(PlantInfo {
                spawn: ((1.0 - hill) * 255.0) as u8,
                ground_type: (soil * GROUND_TYPES as f64).min(GROUND_TYPES as f64 - 1.0) as u8,
                ..Default::default()
            });
        }
    }

    let mut terrain = Terrain::new(width, height);
    let bounds = terrain.bounds();
    terrain.altitude_mut().set_area(bounds, &altitude);
    terrain.plants_mut().set_area(bounds, &plants);
    terrain.rebuild_slope();
    terrain
}

/// Runs a zone for `options.ticks` ticks with replica viewers walking across it.
///
/// # Errors
/// Any [`ConfigError`] raised while creating the zone.
pub fn run_zone(
    config: ZoneConfig,
    rules: Arc<dyn PlantRuleProvider>,
    options: &StandaloneOptions,
) -> Result<StandaloneReport, ConfigError> {
    let started = Instant::now();
    let mut terrain = generate_terrain(&config);
    terrain
        .altitude_mut()
        .make_terraformable(BarrierRange::default(), Box::new(UniformBlend(0.5)));

    let mut rng = fastrand::Rng::with_seed(config.seed);
    let (width, height) = (config.width as i32, config.height as i32);
    let viewers: Vec<Arc<ReplicaViewer>> = (1..=options.viewers)
        .map(|id| {
            let start = Point2::new(rng.i32(0..width), rng.i32(0..height));
            Arc::new(ReplicaViewer::new(id, start, generate_terrain(&config)))
        })
        .collect();

    let mut zone = ZoneState::new(config, terrain, rules)?;
    for viewer in &viewers {
        zone.connect_viewer(viewer.clone());
    }
    zone.correct_all();

    let mut committed = 0;
    for _ in 0..options.ticks {
        committed += zone.tick().committed;
        if !zone.wait_for_flushes(options.flush_budget) {
            warn!("Flushes still running after {:?}", options.flush_budget);
        }
        for viewer in &viewers {
            let position = viewer.position();
            let step = Point2::new(
                rng.i32(-options.viewer_speed..=options.viewer_speed),
                rng.i32(-options.viewer_speed..=options.viewer_speed),
            );
            viewer.move_to(Point2::new(
                (position.x + step.x).clamp(0, width - 1),
                (position.y + step.y).clamp(0, height - 1),
            ));
        }
    }

    let radius = zone.config().visibility_radius;
    let authority = zone.terrain().get();
    let viewer_reports = viewers
        .iter()
        .map(|viewer| ViewerReport {
            id: viewer.id(),
            packets: viewer.packets(),
            rejected: viewer.rejected(),
            mismatched: viewer.mismatched(&authority, Area::around(viewer.position(), radius)),
        })
        .collect();
    drop(authority);

    let report = StandaloneReport {
        ticks: zone.ticks(),
        committed,
        stats: zone.stats(),
        viewers: viewer_reports,
        elapsed: started.elapsed(),
    };
    info!(
        "Zone {} ran {} ticks in {:?}: {} cube commits, {:?}",
        zone.config().id,
        report.ticks,
        report.elapsed,
        report.committed,
        report.stats
    );
    Ok(report)
}
