//! Kill by distance: stochastic thinning of plants that grow too close to their own kind.
//!
//! Only the randomly sampled plant is removed, never the neighbor that crowds it, so
//! dense patches thin out over several ticks instead of enforcing a hard spacing.

use super::NatureCube;

impl NatureCube<'_> {
    pub(super) fn kill_by_distance(&mut self) {
        let samples = (self.plants.len() / 8).max(1);
        for _ in 0..samples {
            let index = self.random_index();
            let plant = self.plants[index];
            if !plant.has_plant() {
                continue;
            }
            let Some(rule) = self.rule(plant.plant_type) else {
                continue;
            };
            if rule.kill_distance == 0 {
                continue;
            }
            let (x, y) = self.world_position(index);
            if self.has_same_type_within(x, y, plant.plant_type, rule.kill_distance) {
                self.clear_plant(index, false);
            }
        }
    }
}
