#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Zone Terrain
//!
//! Server-side terrain for a persistent online world: per-zone raster layers, the
//! vegetation automaton that grows, spreads and kills plants on them, and the replication
//! machinery that keeps every connected viewer's copy in sync.
//!
//! ## Key Modules
//!
//! * `core` - Shared-resource wrappers and concurrent collections
//! * `config` - Per-zone configuration
//! * `error` - Error types for terrain transfer, packets, configuration and sessions
//! * `zone_state` - Terrain layers, nature simulation, replication and the zone tick
//! * `standalone` - In-process zone host with replica viewers
//!
//! ## Architecture
//!
//! Each zone owns one [`zone_state::terrain::Terrain`] behind a reader/writer lock. The zone
//! thread mutates it inside a `TerrainUpdateMonitor` scope, which collects change events
//! from the layers and hands them to every viewer's notifier when the scope closes. Worker
//! threads then flush each notifier against its viewer's visibility window, encoding
//! layer update packets while holding only a read lock.
//!
//! ## Usage
//!
//! ```ignore
//! fn main() {
//!     zone_terrain::run();
//! }
//! ```

use std::sync::Arc;

use log::{error, info};

pub mod config;
pub mod core;
pub mod error;
pub mod standalone;
pub mod zone_state;

use config::ZoneConfig;
use standalone::StandaloneOptions;
use zone_state::nature::PlantRuleSet;

const ZONE_CONFIG: &str = include_str!("../data/zone.json");
const PLANT_RULES: &str = include_str!("../data/plant_rules.json");

pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config = match ZoneConfig::from_json_str(ZONE_CONFIG) {
        Ok(config) => config,
        Err(err) => {
            error!("Zone configuration rejected: {}", err);
            return;
        }
    };
    let rules = match PlantRuleSet::from_json_str(PLANT_RULES) {
        Ok(rules) => rules,
        Err(err) => {
            error!("Plant rules rejected: {}", err);
            return;
        }
    };
    info!("Loaded {} plant rules", rules.len());

    match standalone::run_zone(config, Arc::new(rules), &StandaloneOptions::default()) {
        Ok(report) => {
            for viewer in &report.viewers {
                info!(
                    "Viewer {}: {} packets, {} rejected, {} tiles out of sync",
                    viewer.id, viewer.packets, viewer.rejected, viewer.mismatched
                );
            }
        }
        Err(err) => error!("Zone failed to start: {}", err),
    }
}
