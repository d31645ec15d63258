//! # Nature Module
//!
//! The vegetation automaton. A [`NatureCube`] is a private working copy of the plant,
//! blocking and control data of one area. Simulation passes mutate the copy; when the
//! cube is finished, [`NatureCube::into_changes`] compares it against the snapshot it was
//! taken from and yields only the layers that actually changed.
//!
//! ## Passes
//!
//! `process_all` runs, in this order:
//! 1. validate with cleanup (wipes last tick's death markers)
//! 2. grow
//! 3. spawn
//! 4. validate without cleanup
//! 5. damage walls
//! 6. kill by distance
//! 7. renew material
//!
//! Grow runs before spawn so that dying plants free their tiles first, and spawn runs
//! before kill by distance so fresh seedlings are thinned in the same tick.
//!
//! `correct_only` runs only validate (without cleanup) and kill by distance, for tiles that
//! were edited from outside the simulation.
//!
//! ## Committing
//!
//! [`update_nature_cube`] takes the snapshot under a read lock, runs the caller's passes
//! with no lock held on the live layers' storage, and takes the write lock only if
//! something changed. Each changed layer is written back with one area update.

pub mod collaborators;
pub mod rules;

mod growth;
mod spawn;
mod thinning;
mod validate;
mod wall_decay;

#[cfg(test)]
pub(crate) mod fixtures;

use bitvec::prelude::*;
use log::{trace, warn};

use crate::{
    config::ZoneConfig,
    core::MtResource,
    zone_state::terrain::{
        cells::{BlockingInfo, PlantInfo, PlantType, TerrainControlInfo},
        Area, Terrain,
    },
};

pub use collaborators::{EffectSink, LogEffects, NoStructures, StaticStructures, StructureLocator};
pub use rules::{GrowingState, PlantRule, PlantRuleProvider, PlantRuleSet, Transition};

/// Read-only services and settings a cube runs against.
#[derive(Copy, Clone)]
pub struct NatureContext<'a> {
    pub rules: &'a dyn PlantRuleProvider,
    pub config: &'a ZoneConfig,
    pub structures: &'a dyn StructureLocator,
}

pub struct NatureCube<'a> {
    terrain: &'a Terrain,
    area: Area,
    width: usize,
    plants: Vec<PlantInfo>,
    blocks: Vec<BlockingInfo>,
    control: Vec<TerrainControlInfo>,
    plants_before: Vec<PlantInfo>,
    blocks_before: Vec<BlockingInfo>,
    control_before: Vec<TerrainControlInfo>,
    rules: &'a dyn PlantRuleProvider,
    config: &'a ZoneConfig,
    structures: &'a dyn StructureLocator,
    rng: fastrand::Rng,
    warned_types: BitArr!(for 256, in u64),
}

impl<'a> NatureCube<'a> {
    /// Snapshots `area` (clamped to the zone) out of `terrain`.
    ///
    /// # Returns
    /// `None` if `area` does not overlap the zone.
    pub fn new(terrain: &'a Terrain, area: Area, context: NatureContext<'a>, rng: fastrand::Rng) -> Option<Self> {
        let area = area.clamp(terrain.width(), terrain.height());
        if !area.is_valid() {
            return None;
        }
        let plants = terrain.plants().get_area(area);
        let blocks = terrain.blocking().get_area(area);
        let control = terrain.control().get_area(area);
        Some(NatureCube {
            terrain,
            area,
            width: area.width() as usize,
            plants_before: plants.clone(),
            blocks_before: blocks.clone(),
            control_before: control.clone(),
            plants,
            blocks,
            control,
            rules: context.rules,
            config: context.config,
            structures: context.structures,
            rng,
            warned_types: BitArray::ZERO,
        })
    }

    pub fn area(&self) -> Area {
        self.area
    }

    pub fn cell_count(&self) -> usize {
        self.plants.len()
    }

    /// Full simulation tick.
    pub fn process_all(&mut self) {
        self.validate(true);
        self.grow();
        self.spawn();
        self.validate(false);
        self.damage_walls();
        self.kill_by_distance();
        self.renew_material();
    }

    /// Consistency pass for externally edited tiles.
    pub fn correct_only(&mut self) {
        self.validate(false);
        self.kill_by_distance();
    }

    /// Plant at world position `(x, y)` inside the cube.
    pub fn plant(&self, x: i32, y: i32) -> Option<PlantInfo> {
        self.local_index(x, y).map(|index| self.plants[index])
    }

    pub fn block(&self, x: i32, y: i32) -> Option<BlockingInfo> {
        self.local_index(x, y).map(|index| self.blocks[index])
    }

    pub fn control(&self, x: i32, y: i32) -> Option<TerrainControlInfo> {
        self.local_index(x, y).map(|index| self.control[index])
    }

    /// Overwrites a plant in the working copy. Returns false outside the cube.
    pub fn set_plant(&mut self, x: i32, y: i32, plant: PlantInfo) -> bool {
        match self.local_index(x, y) {
            Some(index) => {
                self.plants[index] = plant;
                true
            }
            None => false,
        }
    }

    pub fn set_block(&mut self, x: i32, y: i32, block: BlockingInfo) -> bool {
        match self.local_index(x, y) {
            Some(index) => {
                self.blocks[index] = block;
                true
            }
            None => false,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.plants != self.plants_before || self.blocks != self.blocks_before || self.control != self.control_before
    }

    /// Consumes the cube, returning what has to be written back.
    ///
    /// Plants and blocking are written together whenever either changed; control only
    /// when it changed itself.
    pub fn into_changes(self) -> Option<CubeChanges> {
        let vegetation_changed = self.plants != self.plants_before || self.blocks != self.blocks_before;
        let control_changed = self.control != self.control_before;
        if !vegetation_changed && !control_changed {
            return None;
        }
        Some(CubeChanges {
            area: self.area,
            plants: vegetation_changed.then_some(self.plants),
            blocks: vegetation_changed.then_some(self.blocks),
            control: control_changed.then_some(self.control),
        })
    }

    fn local_index(&self, x: i32, y: i32) -> Option<usize> {
        self.area
            .contains(x, y)
            .then(|| (y - self.area.y1) as usize * self.width + (x - self.area.x1) as usize)
    }

    fn world_position(&self, index: usize) -> (i32, i32) {
        (
            self.area.x1 + (index % self.width) as i32,
            self.area.y1 + (index / self.width) as i32,
        )
    }

    fn random_index(&mut self) -> usize {
        self.rng.usize(..self.plants.len())
    }

    /// Plant at a world position: the working copy inside the cube, the live zone outside.
    fn plant_at(&self, x: i32, y: i32) -> Option<PlantInfo> {
        match self.local_index(x, y) {
            Some(index) => Some(self.plants[index]),
            None if self.terrain.contains(x, y) => Some(self.terrain.plants().get(x as usize, y as usize)),
            None => None,
        }
    }

    /// True if another plant of `plant_type` stands within Euclidean `distance` of `(x, y)`.
    fn has_same_type_within(&self, x: i32, y: i32, plant_type: PlantType, distance: u8) -> bool {
        let radius = distance as i32;
        let limit = radius * radius;
        for (nx, ny) in Area::around(cgmath::Point2::new(x, y), radius).cells() {
            let (dx, dy) = (nx - x, ny - y);
            if (dx == 0 && dy == 0) || dx * dx + dy * dy > limit {
                continue;
            }
            if self.plant_at(nx, ny).is_some_and(|plant| plant.plant_type == plant_type) {
                return true;
            }
        }
        false
    }

    fn rule(&self, plant_type: PlantType) -> Option<&'a PlantRule> {
        self.rules.rule(plant_type)
    }

    /// Logs an unknown plant type once per cube.
    fn report_unknown_type(&mut self, plant_type: PlantType, index: usize) {
        let (x, y) = self.world_position(index);
        if !self.warned_types[plant_type as usize] {
            self.warned_types.set(plant_type as usize, true);
            warn!("No plant rule for type {} (first seen at {},{}), clearing", plant_type, x, y);
        } else {
            trace!("Clearing unknown plant type {} at {},{}", plant_type, x, y);
        }
    }

    /// Removes the plant at `index`.
    ///
    /// The plant bit goes, the blocking height goes unless an obstacle or decor owns it,
    /// and a concrete-placing plant takes its concrete with it. With `died` set, the cell
    /// keeps the one-tick death marker.
    fn clear_plant(&mut self, index: usize, died: bool) {
        let previous = self.plants[index].plant_type;
        if died {
            self.plants[index].mark_died();
        } else {
            self.plants[index].clear();
        }
        let block = &mut self.blocks[index];
        block.set_plant(false);
        if !block.non_natural() {
            block.height = 0;
        }
        if self.rule(previous).is_some_and(|rule| rule.places_concrete) {
            self.control[index].clear_concrete();
        }
    }

    /// Sets blocking height and plant bit for a plant of `rule` in `state`.
    fn apply_blocking(&mut self, index: usize, rule: &PlantRule, state: u8) {
        let height = rule.blocking_height(state);
        let block = &mut self.blocks[index];
        block.height = height;
        block.set_plant(height > 0);
        if rule.places_concrete {
            self.control[index].set_concrete_b(true);
        }
    }

    /// Random fruit increment of `percent` of `max`, at least one.
    fn fruit_increment(&mut self, max: u8, percent: std::ops::RangeInclusive<u32>) -> u8 {
        let increment = max as u32 * self.rng.u32(percent) / 100;
        increment.clamp(1, u8::MAX as u32) as u8
    }
}

/// Layers a finished cube writes back. `None` means unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeChanges {
    pub area: Area,
    pub plants: Option<Vec<PlantInfo>>,
    pub blocks: Option<Vec<BlockingInfo>>,
    pub control: Option<Vec<TerrainControlInfo>>,
}

impl CubeChanges {
    /// Writes the changed layers, one area update each.
    pub fn apply(&self, terrain: &mut Terrain) {
        if let Some(plants) = &self.plants {
            terrain.plants_mut().set_area(self.area, plants);
        }
        if let Some(blocks) = &self.blocks {
            terrain.blocking_mut().set_area(self.area, blocks);
        }
        if let Some(control) = &self.control {
            terrain.control_mut().set_area(self.area, control);
        }
    }
}

/// Runs `updater` on a cube over `area` and commits the result.
///
/// The snapshot is taken under a read lock that is released before the write lock is
/// requested. Nothing is written, and no effect is raised, when the cube is unchanged.
///
/// # Returns
/// `true` if anything was committed.
pub fn update_nature_cube<F>(
    terrain: &MtResource<Terrain>,
    area: Area,
    context: NatureContext<'_>,
    rng: fastrand::Rng,
    effects: &dyn EffectSink,
    updater: F,
) -> bool
where
    F: FnOnce(&mut NatureCube<'_>),
{
    let changes = {
        let snapshot = terrain.get();
        let Some(mut cube) = NatureCube::new(&snapshot, area, context, rng) else {
            return false;
        };
        updater(&mut cube);
        cube.into_changes()
    };
    let Some(changes) = changes else {
        return false;
    };
    changes.apply(&mut terrain.get_mut());
    effects.create_ambient_effect(changes.area);
    true
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{fixtures::*, *};
    use crate::zone_state::terrain::{LayerChange, LayerEvent, LayerType};

    struct RecordingEffects(Mutex<Vec<Area>>);

    impl EffectSink for RecordingEffects {
        fn create_ambient_effect(&self, area: Area) {
            self.0.lock().unwrap().push(area);
        }
    }

    #[test]
    fn cube_is_clamped_to_zone() {
        let terrain = Terrain::new(8, 8);
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let cube = NatureCube::new(&terrain, Area::new(-3, 4, 20, 9), context(&rules, &config), seeded(1)).unwrap();
        assert_eq!(cube.area(), Area::new(0, 4, 7, 7));
        assert_eq!(cube.cell_count(), 32);
        assert!(NatureCube::new(&terrain, Area::new(9, 9, 12, 12), context(&rules, &config), seeded(1)).is_none());
    }

    #[test]
    fn untouched_cube_has_no_changes() {
        let terrain = Terrain::new(4, 4);
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let cube = NatureCube::new(&terrain, terrain.bounds(), context(&rules, &config), seeded(1)).unwrap();
        assert!(!cube.is_changed());
        assert_eq!(cube.into_changes(), None);
    }

    #[test]
    fn update_commits_once_per_layer_and_raises_effect() {
        let terrain = MtResource::new(fertile_terrain(6, 6, 255));
        let events = Arc::new(Mutex::new(Vec::new()));
        {
            let sink = events.clone();
            let observer = Arc::new(move |event: &LayerEvent| sink.lock().unwrap().push(*event));
            let guard = terrain.get();
            guard.plants().subscribe(observer.clone());
            guard.blocking().subscribe(observer.clone());
            guard.control().subscribe(observer);
        }
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let effects = RecordingEffects(Mutex::new(Vec::new()));
        let area = Area::new(1, 1, 3, 3);
        let committed = update_nature_cube(&terrain, area, context(&rules, &config), seeded(2), &effects, |cube| {
            let plant = PlantInfo {
                plant_type: SHRUB,
                health: 10,
                ..cube.plant(2, 2).unwrap()
            };
            cube.set_plant(2, 2, plant);
        });
        assert!(committed);
        assert_eq!(terrain.get().plants().get(2, 2).plant_type, SHRUB);
        let events = events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[
                LayerEvent {
                    layer: LayerType::Plants,
                    change: LayerChange::Area(area)
                },
                LayerEvent {
                    layer: LayerType::Blocking,
                    change: LayerChange::Area(area)
                },
            ]
        );
        assert_eq!(effects.0.lock().unwrap().as_slice(), &[area]);
    }

    #[test]
    fn unchanged_update_writes_nothing() {
        let terrain = MtResource::new(fertile_terrain(4, 4, 0));
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let effects = RecordingEffects(Mutex::new(Vec::new()));
        let revision = terrain.get().plants().revision();
        let committed = update_nature_cube(
            &terrain,
            Area::whole(4, 4),
            context(&rules, &config),
            seeded(3),
            &effects,
            |cube| cube.process_all(),
        );
        assert!(!committed);
        assert_eq!(terrain.get().plants().revision(), revision);
        assert!(effects.0.lock().unwrap().is_empty());
    }

    #[test]
    fn second_pass_after_fixed_point_writes_nothing() {
        let mut terrain = fertile_terrain(6, 6, 0);
        // junk the first pass repairs
        let mut junk = terrain.blocking().get(1, 1);
        junk.height = 9;
        terrain.blocking_mut().set(1, 1, junk);
        terrain.plants_mut().set(
            2,
            2,
            PlantInfo {
                plant_type: SHRUB,
                state: 1,
                ..Default::default()
            },
        );
        let terrain = MtResource::new(terrain);
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let effects = LogEffects;
        let bounds = Area::whole(6, 6);
        assert!(update_nature_cube(&terrain, bounds, context(&rules, &config), seeded(4), &effects, |cube| {
            cube.process_all()
        }));
        assert!(!update_nature_cube(&terrain, bounds, context(&rules, &config), seeded(5), &effects, |cube| {
            cube.process_all()
        }));
    }

    #[test]
    fn plant_at_reads_live_map_outside_cube() {
        let mut terrain = Terrain::new(6, 6);
        terrain.plants_mut().set(
            5,
            5,
            PlantInfo {
                plant_type: 9,
                ..Default::default()
            },
        );
        let rules = rule_set(vec![shrub()]);
        let config = zone_config();
        let cube = NatureCube::new(&terrain, Area::new(0, 0, 2, 2), context(&rules, &config), seeded(1)).unwrap();
        assert_eq!(cube.plant_at(5, 5).map(|plant| plant.plant_type), Some(9));
        assert_eq!(cube.plant_at(6, 0), None);
        assert!(cube.has_same_type_within(4, 4, 9, 2));
        assert!(!cube.has_same_type_within(3, 3, 9, 2));
    }
}
