//! # Plant Rule Module
//!
//! Static reference data describing each vegetation type. Rules are loaded once (JSON via
//! `serde_json`) and handed to the simulation through [`PlantRuleProvider`], so tests can
//! run against small synthetic rule sets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    zone_state::terrain::{cells::PlantType, TerrainControlInfo},
};

/// What happens when a plant finishes its current growth state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Advance to `next_state`, optionally turning into another plant type.
    Grow {
        next_state: u8,
        #[serde(default)]
        next_type: Option<PlantType>,
    },
    Die,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowingState {
    pub transition: Transition,
    #[serde(default)]
    pub blocking_height: u8,
    #[serde(default)]
    pub max_health: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantRule {
    pub plant_type: PlantType,
    pub name: String,
    /// Indexed by growth state.
    pub states: Vec<GrowingState>,
    /// Ticks spent in each state before the transition fires.
    pub growth_rate: u8,
    pub fruiting_state: Option<u8>,
    pub max_fruit: u8,
    /// Quantized altitude window.
    pub min_altitude: u16,
    pub max_altitude: u16,
    /// Window on quantized altitude minus the zone water level.
    pub min_above_water: i32,
    pub max_above_water: i32,
    /// Slope thresholds in `SlopeLayer::check_slope` units.
    pub min_slope: i32,
    pub max_slope: i32,
    /// Allowed ground types; empty allows any.
    pub ground_types: Vec<u8>,
    pub kill_distance: u8,
    pub places_concrete: bool,
    /// Per-cube population cap.
    pub max_population: Option<u32>,
    pub player_seeded: bool,
    /// Wall-like plants: ignore altitude, water, ground and slope limits.
    pub ignore_natural_terrain: bool,
    pub spreading: u32,
    pub fertility: u32,
}

impl Default for PlantRule {
    fn default() -> Self {
        PlantRule {
            plant_type: 0,
            name: String::new(),
            states: Vec::new(),
            growth_rate: 1,
            fruiting_state: None,
            max_fruit: 0,
            min_altitude: 0,
            max_altitude: u16::MAX,
            min_above_water: i32::MIN,
            max_above_water: i32::MAX,
            min_slope: 0,
            max_slope: 64,
            ground_types: Vec::new(),
            kill_distance: 0,
            places_concrete: false,
            max_population: None,
            player_seeded: false,
            ignore_natural_terrain: false,
            spreading: 1,
            fertility: 1,
        }
    }
}

impl PlantRule {
    pub fn state(&self, state: u8) -> Option<&GrowingState> {
        self.states.get(state as usize)
    }

    pub fn blocking_height(&self, state: u8) -> u8 {
        self.state(state).map_or(0, |state| state.blocking_height)
    }

    pub fn max_health(&self, state: u8) -> u8 {
        self.state(state).map_or(0, |state| state.max_health)
    }

    pub fn is_fruiting(&self, state: u8) -> bool {
        self.fruiting_state.is_some_and(|fruiting| state >= fruiting)
    }

    /// The plant dies when this state ends, or when the state after it ends.
    pub fn near_end_of_life(&self, state: u8) -> bool {
        match self.state(state).map(|state| state.transition) {
            Some(Transition::Die) => true,
            Some(Transition::Grow { next_state, .. }) => {
                matches!(self.state(next_state).map(|s| s.transition), Some(Transition::Die))
            }
            None => false,
        }
    }

    /// Whether zoning allows this plant on a tile.
    pub fn allows_control(&self, control: &TerrainControlInfo) -> bool {
        if self.places_concrete || self.player_seeded {
            control.devrinol_allowed()
        } else {
            control.plant_allowed()
        }
    }

    pub fn allows_altitude(&self, quantized: u16, water_level: i32) -> bool {
        let above_water = quantized as i32 - water_level;
        (self.min_altitude..=self.max_altitude).contains(&quantized)
            && (self.min_above_water..=self.max_above_water).contains(&above_water)
    }

    pub fn allows_ground(&self, ground_type: u8) -> bool {
        self.ground_types.is_empty() || self.ground_types.contains(&ground_type)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.plant_type == 0 {
            return Err(ConfigError::Invalid("plant type 0 is reserved for empty tiles"));
        }
        if self.states.is_empty() {
            return Err(ConfigError::Invalid("plant rule without growth states"));
        }
        if self.growth_rate == 0 {
            return Err(ConfigError::Invalid("plant growth rate must be positive"));
        }
        let state_count = self.states.len();
        if self.fruiting_state.is_some_and(|state| state as usize >= state_count) {
            return Err(ConfigError::Invalid("fruiting state out of range"));
        }
        for state in &self.states {
            if let Transition::Grow {
                next_state,
                next_type: None,
            } = state.transition
            {
                if next_state as usize >= state_count {
                    return Err(ConfigError::Invalid("growth transition out of range"));
                }
            }
        }
        Ok(())
    }
}

/// Read-only rule lookup consumed by the simulation.
pub trait PlantRuleProvider: Send + Sync {
    fn rule(&self, plant_type: PlantType) -> Option<&PlantRule>;

    fn rules(&self) -> &[PlantRule];
}

#[derive(Debug, Default)]
pub struct PlantRuleSet {
    rules: Vec<PlantRule>,
    index: HashMap<PlantType, usize>,
}

impl PlantRuleSet {
    pub fn new(rules: Vec<PlantRule>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(rules.len());
        for (position, rule) in rules.iter().enumerate() {
            rule.validate()?;
            if index.insert(rule.plant_type, position).is_some() {
                return Err(ConfigError::Invalid("duplicate plant type"));
            }
        }
        Ok(PlantRuleSet { rules, index })
    }

    /// Parses a JSON array of rules.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let rules: Vec<PlantRule> = serde_json::from_str(json)?;
        Self::new(rules)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl PlantRuleProvider for PlantRuleSet {
    fn rule(&self, plant_type: PlantType) -> Option<&PlantRule> {
        self.index.get(&plant_type).map(|&position| &self.rules[position])
    }

    fn rules(&self) -> &[PlantRule] {
        &self.rules
    }
}
