//! Consistency pass: brings every cell of the cube back in line with its plant rule.
//!
//! Checks run in a fixed order and the first check that applies ends the cell. Clearing a
//! stray blocking height is one such check; the plant on that cell waits for the next pass.
//! Matching the blocking to the rule's state is a repair and lets the remaining checks run.

use log::debug;

use super::{NatureCube, PlantRule};

impl NatureCube<'_> {
    /// Validates every cell. With `cleanup`, cells without a plant are wiped completely,
    /// which removes the death markers left by the previous tick.
    pub(super) fn validate(&mut self, cleanup: bool) {
        for index in 0..self.plants.len() {
            self.validate_cell(index, cleanup);
        }
    }

    fn validate_cell(&mut self, index: usize, cleanup: bool) {
        let plant = self.plants[index];
        let block = self.blocks[index];

        if block.non_natural() {
            if plant.has_plant() {
                debug!("Removing plant under non-natural blocking at {:?}", self.world_position(index));
            }
            self.plants[index].clear();
            self.blocks[index].set_plant(false);
            return;
        }

        if !block.plant() && block.height > 0 {
            self.blocks[index].height = 0;
            return;
        }

        if !plant.has_plant() {
            let stale = plant.material > 0 || self.blocks[index].plant();
            if cleanup || stale {
                self.clear_plant(index, false);
            }
            return;
        }

        if !plant.is_fertile() {
            self.clear_plant(index, false);
            return;
        }

        let Some(rule) = self.rule(plant.plant_type) else {
            self.report_unknown_type(plant.plant_type, index);
            self.clear_plant(index, false);
            return;
        };

        if !rule.allows_control(&self.control[index]) {
            self.clear_plant(index, false);
            return;
        }

        let Some(state) = rule.state(plant.state) else {
            debug!(
                "Unknown growth state {} for plant type {} at {:?}",
                plant.state,
                plant.plant_type,
                self.world_position(index)
            );
            self.clear_plant(index, false);
            return;
        };
        let block = &mut self.blocks[index];
        if block.plant() && state.blocking_height > 0 && block.height != state.blocking_height {
            block.height = state.blocking_height;
        }

        if !rule.ignore_natural_terrain
            && (!self.altitude_allows(index, rule) || !rule.allows_ground(plant.ground_type))
        {
            self.clear_plant(index, false);
            return;
        }

        let expected = state.blocking_height;
        let block = &mut self.blocks[index];
        if block.plant() != (expected > 0) || block.height != expected {
            block.height = expected;
            block.set_plant(expected > 0);
        }

        if !rule.ignore_natural_terrain && !self.slope_allows(index, rule) {
            self.clear_plant(index, false);
            return;
        }

        match rule.fruiting_state {
            None => self.plants[index].material = 0,
            Some(fruiting) if plant.state < fruiting => self.plants[index].material = 0,
            Some(_) if plant.material == 0 => self.clear_plant(index, false),
            Some(_) => {}
        }
    }

    /// Altitude and water-relative windows.
    pub(super) fn altitude_allows(&self, index: usize, rule: &PlantRule) -> bool {
        let (x, y) = self.world_position(index);
        let quantized = self.terrain.altitude().quantized(x as usize, y as usize);
        rule.allows_altitude(quantized, self.config.water_level)
    }

    /// Slope must be below `max_slope` and not below `min_slope`.
    pub(super) fn slope_allows(&self, index: usize, rule: &PlantRule) -> bool {
        let (x, y) = self.world_position(index);
        let slope = self.terrain.slope();
        let (x, y) = (x as usize, y as usize);
        slope.check_slope(x, y, rule.max_slope) && !slope.check_slope(x, y, rule.min_slope)
    }

    /// Whether a fresh seedling of `rule` would survive validation at `index`.
    pub(super) fn site_allows(&self, index: usize, rule: &PlantRule) -> bool {
        self.plants[index].is_fertile()
            && rule.state(0).is_some()
            && rule.allows_control(&self.control[index])
            && (rule.ignore_natural_terrain
                || (self.altitude_allows(index, rule)
                    && rule.allows_ground(self.plants[index].ground_type)
                    && self.slope_allows(index, rule)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{fixtures::*, NatureCube};
    use crate::zone_state::terrain::{
        cells::{BlockingInfo, PlantInfo},
        Area, Terrain,
    };

    fn cube<'a>(terrain: &'a Terrain, rules: &'a super::super::PlantRuleSet, config: &'a crate::config::ZoneConfig) -> NatureCube<'a> {
        NatureCube::new(terrain, terrain.bounds(), context(rules, config), seeded(11)).unwrap()
    }

    fn blocking(height: u8, plant: bool) -> BlockingInfo {
        let mut block = BlockingInfo { flags: 0, height };
        block.set_plant(plant);
        block
    }

    #[test]
    fn unknown_plant_on_infertile_zone_clears_only_that_cell() {
        let mut terrain = Terrain::new(4, 4);
        terrain.plants_mut().set(
            2,
            1,
            PlantInfo {
                plant_type: 42,
                state: 2,
                material: 5,
                health: 9,
                ..Default::default()
            },
        );
        terrain.blocking_mut().set(2, 1, blocking(3, true));
        let plants_before = terrain.plants().cells().to_vec();
        let blocks_before = terrain.blocking().cells().to_vec();

        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(true);

        let cleared = cube.plant(2, 1).unwrap();
        assert_eq!((cleared.plant_type, cleared.state, cleared.material), (0, 0, 0));
        assert_eq!(cube.block(2, 1).unwrap().height, 0);
        assert!(!cube.block(2, 1).unwrap().plant());
        for (index, (x, y)) in Area::whole(4, 4).cells().enumerate() {
            if (x, y) == (2, 1) {
                continue;
            }
            assert_eq!(cube.plant(x, y).unwrap(), plants_before[index]);
            assert_eq!(cube.block(x, y).unwrap(), blocks_before[index]);
        }
    }

    #[test]
    fn unknown_type_on_fertile_tile_is_cleared() {
        let mut terrain = fertile_terrain(2, 2, 200);
        terrain.plants_mut().set(0, 0, living(99, 0, 5));
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        let plant = cube.plant(0, 0).unwrap();
        assert!(plant.is_empty());
        assert_eq!(plant.spawn, 255);
    }

    #[test]
    fn non_natural_keeps_its_height() {
        let mut terrain = fertile_terrain(2, 2, 255);
        terrain.plants_mut().set(1, 1, living(SHRUB, 1, 20));
        let mut block = blocking(7, true);
        block.set_obstacle(true);
        terrain.blocking_mut().set(1, 1, block);
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert!(!cube.plant(1, 1).unwrap().has_plant());
        let block = cube.block(1, 1).unwrap();
        assert_eq!(block.height, 7);
        assert!(block.obstacle() && !block.plant());
    }

    #[test]
    fn death_marker_survives_until_cleanup() {
        let mut terrain = fertile_terrain(2, 1, 255);
        let mut marker = PlantInfo {
            spawn: 255,
            ..Default::default()
        };
        marker.mark_died();
        terrain.plants_mut().set(0, 0, marker);
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert!(cube.plant(0, 0).unwrap().is_died_marker());
        cube.validate(true);
        assert!(cube.plant(0, 0).unwrap().is_empty());
    }

    #[test]
    fn stray_height_and_plant_bit_are_removed() {
        let mut terrain = fertile_terrain(2, 1, 255);
        terrain.blocking_mut().set(0, 0, blocking(4, false));
        terrain.blocking_mut().set(1, 0, blocking(4, true));
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert_eq!(cube.block(0, 0).unwrap(), BlockingInfo::default());
        assert_eq!(cube.block(1, 0).unwrap(), BlockingInfo::default());
    }

    #[test]
    fn stray_height_repair_ends_the_cell() {
        let mut terrain = fertile_terrain(1, 1, 255);
        let shrub_plant = living(SHRUB, 1, 20);
        terrain.plants_mut().set(0, 0, shrub_plant);
        terrain.blocking_mut().set(0, 0, blocking(4, false));
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);

        cube.validate(false);
        assert_eq!(cube.block(0, 0).unwrap(), blocking(0, false));
        assert_eq!(cube.plant(0, 0).unwrap(), shrub_plant);

        cube.validate(false);
        assert_eq!(cube.block(0, 0).unwrap(), blocking(3, true));
        assert_eq!(cube.plant(0, 0).unwrap(), shrub_plant);
    }

    #[test]
    fn blocking_is_repaired_to_rule() {
        let mut terrain = fertile_terrain(3, 1, 255);
        terrain.plants_mut().set(0, 0, living(SHRUB, 1, 20));
        terrain.blocking_mut().set(0, 0, blocking(9, true));
        terrain.plants_mut().set(1, 0, living(SHRUB, 1, 20));
        terrain.plants_mut().set(2, 0, living(SHRUB, 0, 10));
        terrain.blocking_mut().set(2, 0, blocking(0, true));
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert_eq!(cube.block(0, 0).unwrap(), blocking(3, true));
        assert_eq!(cube.block(1, 0).unwrap(), blocking(3, true));
        assert_eq!(cube.block(2, 0).unwrap(), blocking(0, false));
        assert!(cube.plant(2, 0).unwrap().has_plant());
    }

    #[test]
    fn control_flags_forbid_growth() {
        let mut terrain = fertile_terrain(2, 1, 255);
        terrain.plants_mut().set(0, 0, living(SHRUB, 0, 10));
        let mut control = terrain.control().get(0, 0);
        control.set_anti_plant(true);
        terrain.control_mut().set(0, 0, control);
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert!(!cube.plant(0, 0).unwrap().has_plant());
    }

    #[test]
    fn unknown_state_is_cleared() {
        let mut terrain = fertile_terrain(1, 1, 255);
        terrain.plants_mut().set(0, 0, living(SHRUB, 17, 10));
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert!(cube.plant(0, 0).unwrap().is_empty());
    }

    #[test]
    fn altitude_window_and_ground_types() {
        let mut terrain = fertile_terrain(3, 1, 255);
        terrain.altitude_mut().set(0, 0, 50 << 5);
        for x in 0..3 {
            terrain.plants_mut().set(x, 0, living(SHRUB, 0, 10));
        }
        let mut sandy = living(SHRUB, 0, 10);
        sandy.ground_type = 4;
        terrain.plants_mut().set(2, 0, sandy);
        let highland = super::PlantRule {
            max_altitude: 40,
            ground_types: vec![0, 1],
            ..shrub()
        };
        let rules = rule_set(vec![highland]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert!(!cube.plant(0, 0).unwrap().has_plant());
        assert!(cube.plant(1, 0).unwrap().has_plant());
        assert!(!cube.plant(2, 0).unwrap().has_plant());
    }

    #[test]
    fn walls_ignore_natural_terrain() {
        let mut terrain = fertile_terrain(2, 2, 255);
        terrain.altitude_mut().set(1, 1, 2000 << 5);
        terrain.rebuild_slope();
        terrain.plants_mut().set(0, 0, living(WALL, 0, 50));
        terrain.plants_mut().set(1, 0, living(SHRUB, 0, 10));
        let steep_shrub = super::PlantRule {
            max_slope: 2,
            ..shrub()
        };
        let rules = rule_set(vec![wall(), steep_shrub]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert!(cube.plant(0, 0).unwrap().has_plant());
        assert_eq!(cube.block(0, 0).unwrap(), blocking(6, true));
        assert!(!cube.plant(1, 0).unwrap().has_plant());
    }

    #[test]
    fn fruit_bookkeeping() {
        let mut terrain = fertile_terrain(4, 1, 255);
        let mut seed = living(BERRY, 0, 10);
        seed.material = 12;
        terrain.plants_mut().set(0, 0, seed);
        let mut bush = living(BERRY, 1, 20);
        bush.material = 30;
        terrain.plants_mut().set(1, 0, bush);
        terrain.plants_mut().set(2, 0, living(BERRY, 2, 20));
        let mut shrub_plant = living(SHRUB, 0, 10);
        shrub_plant.material = 8;
        terrain.plants_mut().set(3, 0, shrub_plant);
        let rules = rule_set(vec![berry(), shrub()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert_eq!(cube.plant(0, 0).unwrap().material, 0);
        assert!(cube.plant(0, 0).unwrap().has_plant());
        assert_eq!(cube.plant(1, 0).unwrap().material, 30);
        assert!(!cube.plant(2, 0).unwrap().has_plant());
        assert_eq!(cube.plant(3, 0).unwrap().material, 0);
    }

    #[test]
    fn concrete_goes_with_cleared_paver() {
        let mut terrain = fertile_terrain(1, 1, 255);
        terrain.plants_mut().set(0, 0, living(PAVER, 9, 5));
        let mut control = terrain.control().get(0, 0);
        control.set_concrete_a(true);
        control.set_concrete_b(true);
        terrain.control_mut().set(0, 0, control);
        let rules = rule_set(vec![paver()]);
        let config = zone_config();
        let mut cube = cube(&terrain, &rules, &config);
        cube.validate(false);
        assert!(!cube.control(0, 0).unwrap().any_concrete());
    }

    #[test]
    fn plant_bit_matches_height_after_validate() {
        let mut terrain = fertile_terrain(6, 6, 255);
        let rules = rule_set(vec![shrub(), berry(), hedge()]);
        let types = [0, SHRUB, BERRY, HEDGE, 77];
        let mut rng = seeded(99);
        for (x, y) in Area::whole(6, 6).cells() {
            let plant = PlantInfo {
                plant_type: types[rng.usize(..types.len())],
                state: rng.u8(..4),
                spawn: rng.u8(..3) * 100,
                material: rng.u8(..2) * 20,
                ..Default::default()
            };
            terrain.plants_mut().set(x as usize, y as usize, plant);
            terrain
                .blocking_mut()
                .set(x as usize, y as usize, blocking(rng.u8(..5), rng.bool()));
        }
        let config = zone_config();
        for cleanup in [true, false] {
            let mut cube = cube(&terrain, &rules, &config);
            cube.validate(cleanup);
            for (x, y) in Area::whole(6, 6).cells() {
                let block = cube.block(x, y).unwrap();
                assert_eq!(block.plant(), block.height > 0, "({x},{y}) {block:?}");
            }
        }
    }
}
