//! Growth and fruit renewal.

use super::{NatureCube, PlantRule, Transition};
use crate::zone_state::terrain::cells::PlantType;

/// Chance per tick that a fruiting blocking plant regrows some fruit.
const RENEW_CHANCE: f32 = 0.3;

impl<'a> NatureCube<'a> {
    /// Ages every plant and fires its state transition once the age reaches the rule's
    /// growth rate.
    pub(super) fn grow(&mut self) {
        for index in 0..self.plants.len() {
            let plant = self.plants[index];
            if !plant.has_plant() {
                continue;
            }
            let Some(rule) = self.rule(plant.plant_type) else {
                continue;
            };
            let Some(current) = rule.state(plant.state) else {
                continue;
            };
            let age = plant.age.saturating_add(1);
            if age < rule.growth_rate {
                self.plants[index].age = age;
                continue;
            }
            self.plants[index].age = 0;
            match current.transition {
                Transition::Die => self.clear_plant(index, true),
                Transition::Grow { next_state, next_type } => {
                    self.advance(index, rule, next_state, next_type.unwrap_or(rule.plant_type))
                }
            }
        }
    }

    fn advance(&mut self, index: usize, rule: &'a PlantRule, next_state: u8, next_type: PlantType) {
        let Some(next_rule) = self.rule(next_type) else {
            self.report_unknown_type(next_type, index);
            self.clear_plant(index, false);
            return;
        };
        let Some(next) = next_rule.state(next_state) else {
            self.clear_plant(index, false);
            return;
        };
        let plant = self.plants[index];

        let previous_max = rule.max_health(plant.state);
        let ratio = if previous_max > 0 {
            (plant.health as f32 / previous_max as f32).min(1.0)
        } else {
            1.0
        };
        let health = (ratio * next.max_health as f32).round() as u8;

        let material = if next_rule.is_fruiting(next_state) {
            let max = next_rule.max_fruit;
            let entering = plant.plant_type != next_type || !rule.is_fruiting(plant.state);
            if entering {
                self.fruit_increment(max, 5..=15).min(max)
            } else {
                let increment = self.fruit_increment(max, 15..=25);
                plant.material.saturating_add(increment).min(max)
            }
        } else {
            0
        };

        let cell = &mut self.plants[index];
        cell.plant_type = next_type;
        cell.state = next_state;
        cell.health = health;
        cell.material = material;
        self.apply_blocking(index, next_rule, next_state);
    }

    /// Fruiting blocking plants below their fruit cap regrow a little fruit now and then.
    pub(super) fn renew_material(&mut self) {
        for index in 0..self.plants.len() {
            let plant = self.plants[index];
            if !plant.has_plant() || !self.blocks[index].plant() {
                continue;
            }
            let Some(rule) = self.rule(plant.plant_type) else {
                continue;
            };
            if !rule.is_fruiting(plant.state) || plant.material >= rule.max_fruit {
                continue;
            }
            if self.rng.f32() >= RENEW_CHANCE {
                continue;
            }
            let increment = self.fruit_increment(rule.max_fruit, 5..=15);
            self.plants[index].material = plant.material.saturating_add(increment).min(rule.max_fruit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{fixtures::*, NatureCube, PlantRule, PlantRuleSet};
    use crate::{config::ZoneConfig, zone_state::terrain::Terrain};

    fn cube<'a>(terrain: &'a Terrain, rules: &'a PlantRuleSet, config: &'a ZoneConfig) -> NatureCube<'a> {
        NatureCube::new(terrain, terrain.bounds(), context(rules, config), seeded(21)).unwrap()
    }

    #[test]
    fn age_counts_up_to_growth_rate() {
        let mut terrain = fertile_terrain(1, 1, 255);
        terrain.plants_mut().set(0, 0, living(SHRUB, 0, 10));
        let slow = PlantRule {
            growth_rate: 3,
            ..shrub()
        };
        let rules = rule_set(vec![slow]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.grow();
        cube.grow();
        assert_eq!(cube.plant(0, 0).unwrap().age, 2);
        assert_eq!(cube.plant(0, 0).unwrap().state, 0);
        cube.grow();
        let plant = cube.plant(0, 0).unwrap();
        assert_eq!((plant.state, plant.age), (1, 0));
    }

    #[test]
    fn advancing_scales_health_and_sets_blocking() {
        let mut terrain = fertile_terrain(1, 1, 255);
        terrain.plants_mut().set(0, 0, living(SHRUB, 0, 5));
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.grow();
        let plant = cube.plant(0, 0).unwrap();
        assert_eq!(plant.state, 1);
        assert_eq!(plant.health, 10);
        let block = cube.block(0, 0).unwrap();
        assert_eq!(block.height, 3);
        assert!(block.plant());
    }

    #[test]
    fn dying_leaves_marker() {
        let mut terrain = fertile_terrain(1, 1, 255);
        terrain.plants_mut().set(0, 0, living(SHRUB, 2, 20));
        let mut block = terrain.blocking().get(0, 0);
        block.height = 3;
        block.set_plant(true);
        terrain.blocking_mut().set(0, 0, block);
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.grow();
        let plant = cube.plant(0, 0).unwrap();
        assert!(plant.is_died_marker());
        assert_eq!(plant.spawn, 255);
        assert_eq!(cube.block(0, 0).unwrap().height, 0);
        assert!(!cube.block(0, 0).unwrap().plant());
    }

    #[test]
    fn fruit_is_seeded_then_accrues() {
        let mut terrain = fertile_terrain(1, 1, 255);
        terrain.plants_mut().set(0, 0, living(BERRY, 0, 10));
        let rules = rule_set(vec![berry()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.grow();
        let seeded_fruit = cube.plant(0, 0).unwrap().material;
        assert!((5..=15).contains(&seeded_fruit), "{seeded_fruit}");
        cube.grow();
        let grown = cube.plant(0, 0).unwrap().material;
        assert!((seeded_fruit + 15..=seeded_fruit + 25).contains(&grown), "{grown}");
        for _ in 0..20 {
            cube.grow();
        }
        assert_eq!(cube.plant(0, 0).unwrap().material, 100);
    }

    #[test]
    fn small_fruit_cap_still_seeds_one() {
        let mut terrain = fertile_terrain(1, 1, 255);
        terrain.plants_mut().set(0, 0, living(BERRY, 0, 10));
        let scarce = PlantRule {
            max_fruit: 4,
            ..berry()
        };
        let rules = rule_set(vec![scarce]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.grow();
        assert_eq!(cube.plant(0, 0).unwrap().material, 1);
    }

    #[test]
    fn type_change_on_transition() {
        let mut terrain = fertile_terrain(1, 1, 255);
        terrain.plants_mut().set(0, 0, living(SHRUB, 0, 10));
        let mut sapling = shrub();
        sapling.states[0].transition = super::Transition::Grow {
            next_state: 1,
            next_type: Some(BERRY),
        };
        let rules = rule_set(vec![sapling, berry()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.grow();
        let plant = cube.plant(0, 0).unwrap();
        assert_eq!((plant.plant_type, plant.state), (BERRY, 1));
        assert!(plant.material >= 5);
        assert_eq!(cube.block(0, 0).unwrap().height, 2);
    }

    #[test]
    fn paver_lays_and_removes_concrete() {
        let mut terrain = fertile_terrain(1, 1, 255);
        terrain.plants_mut().set(0, 0, living(PAVER, 0, 5));
        let rules = rule_set(vec![paver()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.grow();
        assert!(cube.control(0, 0).unwrap().concrete_b());
        cube.grow();
        assert!(cube.plant(0, 0).unwrap().is_died_marker());
        assert!(!cube.control(0, 0).unwrap().any_concrete());
    }

    #[test]
    fn renew_tops_up_fruit() {
        let mut terrain = fertile_terrain(1, 1, 255);
        let mut bush = living(BERRY, 2, 30);
        bush.material = 10;
        terrain.plants_mut().set(0, 0, bush);
        let mut block = terrain.blocking().get(0, 0);
        block.height = 2;
        block.set_plant(true);
        terrain.blocking_mut().set(0, 0, block);
        let rules = rule_set(vec![berry()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        for _ in 0..60 {
            cube.renew_material();
        }
        let material = cube.plant(0, 0).unwrap().material;
        assert!(material > 10 && material <= 100, "{material}");
    }

    #[test]
    fn renew_skips_non_blocking_plants() {
        let mut terrain = fertile_terrain(1, 1, 255);
        let mut bush = living(BERRY, 2, 30);
        bush.material = 10;
        terrain.plants_mut().set(0, 0, bush);
        let rules = rule_set(vec![berry()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        for _ in 0..60 {
            cube.renew_material();
        }
        assert_eq!(cube.plant(0, 0).unwrap().material, 10);
    }
}
