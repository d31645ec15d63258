//! # Zone Configuration Module
//!
//! Per-zone settings, loaded from JSON. Every field has a default, so a configuration file
//! only needs to name what differs from a stock zone.

use std::path::Path;

use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::error::ConfigError;

/// Zone difficulty tier. Wall decay runs from `Beta` upward; structure-aware decay only on
/// `Gamma`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromPrimitive)]
pub enum ZoneTier {
    #[default]
    Alpha = 0,
    Beta = 1,
    Gamma = 2,
}

impl ZoneTier {
    pub fn has_wall_decay(self) -> bool {
        self >= ZoneTier::Beta
    }

    pub fn tracks_structures(self) -> bool {
        self == ZoneTier::Gamma
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub id: u32,
    pub width: usize,
    pub height: usize,
    pub tier: ZoneTier,
    /// Maximum share of a nature cube covered by blocking plants, in percent.
    pub fertility_percent: u8,
    /// Water level in quantized altitude units.
    pub water_level: i32,
    pub decay_search_radius: i32,
    pub wall_intact_distance: f32,
    pub wall_max_decay_distance: f32,
    pub wall_damage_per_tick: u8,
    /// Edge length of one nature cube.
    pub cube_size: usize,
    pub cubes_per_tick: usize,
    /// Edge length of one replication grid cell.
    pub grid_cell_size: usize,
    /// Half-width of a viewer's visibility window, in tiles.
    pub visibility_radius: i32,
    pub worker_count: usize,
    pub packet_cache_capacity: usize,
    /// Bounded wait for terrain reads from flush tasks.
    pub lock_wait_ms: u64,
    pub seed: u64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        ZoneConfig {
            id: 0,
            width: 256,
            height: 256,
            tier: ZoneTier::Alpha,
            fertility_percent: 30,
            water_level: 0,
            decay_search_radius: 48,
            wall_intact_distance: 8.0,
            wall_max_decay_distance: 24.0,
            wall_damage_per_tick: 1,
            cube_size: 16,
            cubes_per_tick: 8,
            grid_cell_size: 32,
            visibility_radius: 64,
            worker_count: 2,
            packet_cache_capacity: 256,
            lock_wait_ms: 5,
            seed: 0x5eed,
        }
    }
}

impl ZoneConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ZoneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid("zone dimensions must be positive"));
        }
        if self.width > i32::MAX as usize || self.height > i32::MAX as usize {
            return Err(ConfigError::Invalid("zone dimensions exceed coordinate range"));
        }
        if self.fertility_percent > 100 {
            return Err(ConfigError::Invalid("fertility_percent must be at most 100"));
        }
        if self.cube_size == 0 || self.grid_cell_size == 0 {
            return Err(ConfigError::Invalid("cube and grid cell sizes must be positive"));
        }
        if self.wall_max_decay_distance < self.wall_intact_distance {
            return Err(ConfigError::Invalid(
                "wall_max_decay_distance must not be below wall_intact_distance",
            ));
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid("worker_count must be positive"));
        }
        if self.packet_cache_capacity == 0 {
            return Err(ConfigError::Invalid("packet_cache_capacity must be positive"));
        }
        Ok(())
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use num::FromPrimitive;

    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = ZoneConfig::from_json_str(r#"{ "id": 7, "tier": "Gamma", "width": 64 }"#).unwrap();
        assert_eq!(config.id, 7);
        assert_eq!(config.tier, ZoneTier::Gamma);
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 256);
        assert_eq!(config.cube_size, 16);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            ZoneConfig::from_json_str(r#"{ "fertility_percent": 140 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ZoneConfig::from_json_str(r#"{ "width": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(ZoneConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn tier_gates() {
        assert!(!ZoneTier::Alpha.has_wall_decay());
        assert!(ZoneTier::Beta.has_wall_decay());
        assert!(!ZoneTier::Beta.tracks_structures());
        assert!(ZoneTier::Gamma.tracks_structures());
        assert_eq!(ZoneTier::from_u8(2), Some(ZoneTier::Gamma));
    }
}
