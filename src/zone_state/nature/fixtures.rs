//! Synthetic rules and zones for simulation tests.

use super::{GrowingState, NatureContext, NoStructures, PlantRule, PlantRuleSet, Transition};
use crate::{
    config::ZoneConfig,
    zone_state::terrain::{
        cells::{PlantInfo, PlantType},
        Area, Terrain,
    },
};

pub const SHRUB: PlantType = 3;
pub const BERRY: PlantType = 5;
pub const HEDGE: PlantType = 6;
pub const WALL: PlantType = 7;
pub const PAVER: PlantType = 8;

pub fn state(transition: Transition, blocking_height: u8, max_health: u8) -> GrowingState {
    GrowingState {
        transition,
        blocking_height,
        max_health,
    }
}

pub fn grow(next_state: u8) -> Transition {
    Transition::Grow {
        next_state,
        next_type: None,
    }
}

/// Seed, then a blocking bush, then death.
pub fn shrub() -> PlantRule {
    PlantRule {
        plant_type: SHRUB,
        name: "shrub".into(),
        states: vec![
            state(grow(1), 0, 10),
            state(grow(2), 3, 20),
            state(Transition::Die, 3, 20),
        ],
        spreading: 2,
        fertility: 3,
        ..Default::default()
    }
}

/// Fruits from state 1 on and keeps growing in state 2.
pub fn berry() -> PlantRule {
    PlantRule {
        plant_type: BERRY,
        name: "berry".into(),
        states: vec![
            state(grow(1), 0, 10),
            state(grow(2), 2, 20),
            state(grow(2), 2, 30),
        ],
        fruiting_state: Some(1),
        max_fruit: 100,
        ..Default::default()
    }
}

/// Blocking from the first state, so every spawn counts toward density.
pub fn hedge() -> PlantRule {
    PlantRule {
        plant_type: HEDGE,
        name: "hedge".into(),
        states: vec![state(grow(0), 2, 10)],
        growth_rate: 200,
        ..Default::default()
    }
}

/// Player-built wall that is always close to the end of its life.
pub fn wall() -> PlantRule {
    PlantRule {
        plant_type: WALL,
        name: "wall".into(),
        states: vec![state(grow(1), 6, 50), state(Transition::Die, 6, 50)],
        growth_rate: 250,
        ignore_natural_terrain: true,
        player_seeded: true,
        fertility: 0,
        ..Default::default()
    }
}

/// Concrete-placing creeper.
pub fn paver() -> PlantRule {
    PlantRule {
        plant_type: PAVER,
        name: "paver".into(),
        states: vec![state(grow(1), 0, 5), state(Transition::Die, 1, 5)],
        places_concrete: true,
        fertility: 0,
        ..Default::default()
    }
}

pub fn rule_set(rules: Vec<PlantRule>) -> PlantRuleSet {
    PlantRuleSet::new(rules).unwrap()
}

pub fn zone_config() -> ZoneConfig {
    ZoneConfig {
        width: 16,
        height: 16,
        fertility_percent: 30,
        ..Default::default()
    }
}

pub fn context<'a>(rules: &'a PlantRuleSet, config: &'a ZoneConfig) -> NatureContext<'a> {
    NatureContext {
        rules,
        config,
        structures: &NoStructures,
    }
}

pub fn seeded(seed: u64) -> fastrand::Rng {
    fastrand::Rng::with_seed(seed)
}

/// A flat zone whose every tile has spawn probability `spawn`.
pub fn fertile_terrain(width: usize, height: usize, spawn: u8) -> Terrain {
    let mut terrain = Terrain::new(width, height);
    let cells = vec![
        PlantInfo {
            spawn,
            ..Default::default()
        };
        width * height
    ];
    terrain.plants_mut().set_area(Area::whole(width, height), &cells);
    terrain
}

/// A living plant of `plant_type` in `state` on a fully fertile tile.
pub fn living(plant_type: PlantType, state: u8, health: u8) -> PlantInfo {
    PlantInfo {
        plant_type,
        state,
        spawn: 255,
        health,
        ..Default::default()
    }
}
