//! Decay of player-built walls that are close to the end of their life.
//!
//! On top-tier zones a wall near a player structure is kept intact: within
//! `wall_intact_distance` it never decays, beyond `wall_max_decay_distance` it always does,
//! and in between its survival chance falls off linearly.

use cgmath::{MetricSpace, Point2};

use super::NatureCube;

impl NatureCube<'_> {
    pub(super) fn damage_walls(&mut self) {
        let tier = self.config.tier;
        if !tier.has_wall_decay() {
            return;
        }
        let structures = if tier.tracks_structures() {
            self.structures
                .structures_near(self.area.center(), self.config.decay_search_radius)
        } else {
            Vec::new()
        };

        for index in 0..self.plants.len() {
            let plant = self.plants[index];
            if !plant.has_plant() {
                continue;
            }
            let Some(rule) = self.rule(plant.plant_type) else {
                continue;
            };
            if !rule.ignore_natural_terrain || !rule.near_end_of_life(plant.state) {
                continue;
            }
            let (x, y) = self.world_position(index);
            if !self.decays(Point2::new(x, y), &structures) {
                continue;
            }
            let health = plant.health.saturating_sub(self.config.wall_damage_per_tick);
            if health == 0 {
                self.clear_plant(index, true);
            } else {
                self.plants[index].health = health;
            }
        }
    }

    fn decays(&mut self, position: Point2<i32>, structures: &[Point2<i32>]) -> bool {
        let position = position.cast::<f32>().unwrap_or(Point2::new(0.0, 0.0));
        let nearest = structures
            .iter()
            .filter_map(|structure| structure.cast::<f32>())
            .map(|structure| position.distance(structure))
            .reduce(f32::min);
        let Some(distance) = nearest else {
            return true;
        };
        let intact = self.config.wall_intact_distance;
        let max = self.config.wall_max_decay_distance;
        if distance <= intact {
            false
        } else if distance >= max {
            true
        } else {
            let survival = (max - distance) / (max - intact);
            self.rng.f32() >= survival
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point2;

    use super::super::{fixtures::*, NatureContext, NatureCube, StaticStructures};
    use crate::{
        config::{ZoneConfig, ZoneTier},
        zone_state::terrain::{Area, Terrain},
    };

    fn walled_terrain(health: u8) -> Terrain {
        let mut terrain = fertile_terrain(3, 3, 255);
        terrain.plants_mut().set(1, 1, living(WALL, 1, health));
        terrain
    }

    fn tier(tier: ZoneTier) -> ZoneConfig {
        ZoneConfig {
            tier,
            wall_damage_per_tick: 3,
            wall_intact_distance: 2.0,
            wall_max_decay_distance: 6.0,
            ..zone_config()
        }
    }

    #[test]
    fn first_tier_has_no_decay() {
        let terrain = walled_terrain(40);
        let rules = rule_set(vec![wall()]);
        let config = tier(ZoneTier::Alpha);
        let mut cube = NatureCube::new(&terrain, terrain.bounds(), context(&rules, &config), seeded(1)).unwrap();
        cube.damage_walls();
        assert!(!cube.is_changed());
    }

    #[test]
    fn unprotected_wall_loses_health() {
        let terrain = walled_terrain(40);
        let rules = rule_set(vec![wall()]);
        let config = tier(ZoneTier::Beta);
        let mut cube = NatureCube::new(&terrain, terrain.bounds(), context(&rules, &config), seeded(1)).unwrap();
        cube.damage_walls();
        cube.damage_walls();
        assert_eq!(cube.plant(1, 1).unwrap().health, 34);
    }

    #[test]
    fn exhausted_wall_dies_with_marker() {
        let terrain = walled_terrain(2);
        let rules = rule_set(vec![wall()]);
        let config = tier(ZoneTier::Beta);
        let mut cube = NatureCube::new(&terrain, terrain.bounds(), context(&rules, &config), seeded(1)).unwrap();
        cube.damage_walls();
        assert!(cube.plant(1, 1).unwrap().is_died_marker());
    }

    #[test]
    fn young_walls_do_not_decay() {
        let mut terrain = fertile_terrain(3, 3, 255);
        let mut rule = wall();
        rule.states.insert(0, state(grow(1), 6, 50));
        rule.states[1].transition = grow(2);
        terrain.plants_mut().set(1, 1, living(WALL, 0, 40));
        let rules = rule_set(vec![rule]);
        let config = tier(ZoneTier::Beta);
        let mut cube = NatureCube::new(&terrain, terrain.bounds(), context(&rules, &config), seeded(1)).unwrap();
        cube.damage_walls();
        assert_eq!(cube.plant(1, 1).unwrap().health, 40);
    }

    #[test]
    fn structures_protect_nearby_walls_on_top_tier() {
        let terrain = walled_terrain(40);
        let rules = rule_set(vec![wall()]);
        let config = tier(ZoneTier::Gamma);
        let near = StaticStructures(vec![Point2::new(2, 2)]);
        let context = NatureContext {
            rules: &rules,
            config: &config,
            structures: &near,
        };
        let mut cube = NatureCube::new(&terrain, Area::whole(3, 3), context, seeded(1)).unwrap();
        for _ in 0..10 {
            cube.damage_walls();
        }
        assert_eq!(cube.plant(1, 1).unwrap().health, 40);
    }

    #[test]
    fn distant_structures_do_not_protect() {
        let terrain = walled_terrain(40);
        let rules = rule_set(vec![wall()]);
        let config = tier(ZoneTier::Gamma);
        let far = StaticStructures(vec![Point2::new(20, 1)]);
        let context = NatureContext {
            rules: &rules,
            config: &config,
            structures: &far,
        };
        let mut cube = NatureCube::new(&terrain, Area::whole(3, 3), context, seeded(1)).unwrap();
        cube.damage_walls();
        assert_eq!(cube.plant(1, 1).unwrap().health, 37);
    }

    #[test]
    fn fading_band_decays_sometimes() {
        let terrain = walled_terrain(250);
        let rules = rule_set(vec![wall()]);
        let config = tier(ZoneTier::Gamma);
        let band = StaticStructures(vec![Point2::new(5, 1)]);
        let context = NatureContext {
            rules: &rules,
            config: &config,
            structures: &band,
        };
        let mut cube = NatureCube::new(&terrain, Area::whole(3, 3), context, seeded(17)).unwrap();
        for _ in 0..60 {
            cube.damage_walls();
        }
        let health = cube.plant(1, 1).unwrap().health;
        assert!(health < 250 && health > 250 - 60 * 3, "{health}");
    }
}
