//! Seeding new plants on empty tiles.
//!
//! Spawning stops at the zone's fertility fraction: the number of tiles carrying a
//! blocking plant never exceeds `fertility_percent` of the cube. Candidate types follow
//! the neighborhood, so vegetation spreads in patches instead of as noise.

use log::trace;

use super::{NatureCube, PlantRule};
use crate::zone_state::terrain::cells::PlantType;

/// Offsets sampled around a spawn site: the two inner rings, the axes at four and the
/// diagonals at three.
const NEIGHBOR_PATTERN: [(i32, i32); 24] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (-2, -2),
    (0, -2),
    (2, -2),
    (-2, 0),
    (2, 0),
    (-2, 2),
    (0, 2),
    (2, 2),
    (-4, 0),
    (4, 0),
    (0, -4),
    (0, 4),
    (-3, -3),
    (3, -3),
    (-3, 3),
    (3, 3),
];

impl<'a> NatureCube<'a> {
    pub(super) fn spawn(&mut self) {
        let cells = self.plants.len();
        let population = self.blocks.iter().filter(|block| block.plant()).count();
        let limit = cells * self.config.fertility_percent as usize / 100;
        if population >= limit {
            return;
        }
        let mut budget = limit - population;
        let mut spawned = 0;

        for _ in 0..cells {
            let index = self.random_index();
            let plant = self.plants[index];
            let block = self.blocks[index];
            if !plant.is_empty() || block.has_any_flag() || block.height > 0 {
                continue;
            }
            if self.rng.u32(..255) >= plant.spawn as u32 {
                continue;
            }
            let (x, y) = self.world_position(index);
            let Some(rule) = self.pick_candidate(x, y) else {
                continue;
            };
            if rule
                .max_population
                .is_some_and(|cap| self.population_of(rule.plant_type) >= cap as usize)
            {
                continue;
            }
            if rule.kill_distance > 0 && self.has_same_type_within(x, y, rule.plant_type, rule.kill_distance) {
                continue;
            }
            if !self.site_allows(index, rule) {
                continue;
            }
            self.plant_seed(index, rule);
            spawned += 1;
            budget -= 1;
            if budget == 0 {
                break;
            }
        }
        if spawned > 0 {
            trace!("Spawned {} plants in {:?}", spawned, self.area);
        }
    }

    fn plant_seed(&mut self, index: usize, rule: &'a PlantRule) {
        let material = if rule.is_fruiting(0) {
            self.fruit_increment(rule.max_fruit, 5..=15).min(rule.max_fruit)
        } else {
            0
        };
        let cell = &mut self.plants[index];
        cell.plant_type = rule.plant_type;
        cell.state = 0;
        cell.age = 0;
        cell.health = rule.max_health(0);
        cell.material = material;
        self.apply_blocking(index, rule, 0);
    }

    fn population_of(&self, plant_type: PlantType) -> usize {
        self.plants.iter().filter(|plant| plant.plant_type == plant_type).count()
    }

    /// Picks the type to seed at `(x, y)`.
    ///
    /// With neighbors around, half the time the most numerous neighbor type wins outright,
    /// otherwise neighbors are weighted by count times their rule's spreading. Without
    /// neighbors the pick is weighted by fertility over every naturally spawning rule.
    fn pick_candidate(&mut self, x: i32, y: i32) -> Option<&'a PlantRule> {
        let mut counts: Vec<(&'a PlantRule, u64)> = Vec::new();
        for (dx, dy) in NEIGHBOR_PATTERN {
            let Some(neighbor) = self.plant_at(x + dx, y + dy) else {
                continue;
            };
            if !neighbor.has_plant() {
                continue;
            }
            let Some(rule) = self.rule(neighbor.plant_type) else {
                continue;
            };
            if rule.player_seeded {
                continue;
            }
            match counts.iter_mut().find(|(known, _)| known.plant_type == rule.plant_type) {
                Some((_, count)) => *count += 1,
                None => counts.push((rule, 1)),
            }
        }

        if counts.is_empty() {
            return self.fertility_pick();
        }
        counts.sort_by_key(|(rule, count)| (std::cmp::Reverse(*count), rule.plant_type));
        let dominant = counts[0].0;
        if self.rng.bool() {
            return Some(dominant);
        }
        let total: u64 = counts.iter().map(|(rule, count)| count * rule.spreading as u64).sum();
        if total == 0 {
            return Some(dominant);
        }
        let mut roll = self.rng.u64(..total);
        for (rule, count) in &counts {
            let weight = count * rule.spreading as u64;
            if roll < weight {
                return Some(*rule);
            }
            roll -= weight;
        }
        Some(dominant)
    }

    fn fertility_pick(&mut self) -> Option<&'a PlantRule> {
        let rules: &'a [PlantRule] = self.rules.rules();
        let natural = || rules.iter().filter(|rule| !rule.player_seeded && rule.fertility > 0);
        let total: u64 = natural().map(|rule| rule.fertility as u64).sum();
        if total == 0 {
            return None;
        }
        let mut roll = self.rng.u64(..total);
        for rule in natural() {
            if roll < rule.fertility as u64 {
                return Some(rule);
            }
            roll -= rule.fertility as u64;
        }
        None
    }
}
