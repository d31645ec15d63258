//! # Replication Grid Module
//!
//! A fixed partition of the zone into square cells. Each viewer owns one grid and uses it
//! to remember what that viewer still has to be sent:
//! - a dirty set of layer types, meaning "resend the whole cell for this layer"
//! - a list of fine descriptors (single tiles) to send individually
//!
//! Area updates mark every cell they touch dirty. Tile updates are queued on the one cell
//! that contains them.

use std::collections::HashSet;

use bitvec::prelude::*;

use super::update_info::TerrainUpdateInfo;
use crate::zone_state::terrain::{Area, LayerType};

type LayerSet = BitArr!(for LayerType::COUNT, in u8);

pub struct GridCell {
    area: Area,
    dirty: LayerSet,
    /// Send order.
    pending: Vec<TerrainUpdateInfo>,
    /// Same descriptors as `pending`, for membership checks.
    queued: HashSet<TerrainUpdateInfo>,
}

impl GridCell {
    fn new(area: Area) -> Self {
        GridCell {
            area,
            dirty: BitArray::ZERO,
            pending: Vec::new(),
            queued: HashSet::new(),
        }
    }

    pub fn area(&self) -> Area {
        self.area
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.not_any() && self.pending.is_empty()
    }

    pub fn has_dirty(&self) -> bool {
        self.dirty.any()
    }

    pub fn is_dirty(&self, layer: LayerType) -> bool {
        self.dirty[layer.index()]
    }

    pub fn dirty_layers(&self) -> Vec<LayerType> {
        LayerType::ALL
            .into_iter()
            .filter(|layer| self.dirty[layer.index()])
            .collect()
    }

    pub fn mark_dirty(&mut self, layer: LayerType) {
        self.dirty.set(layer.index(), true);
    }

    pub fn pending(&self) -> &[TerrainUpdateInfo] {
        &self.pending
    }

    pub(super) fn queue(&mut self, update: TerrainUpdateInfo) {
        if self.queued.insert(update) {
            self.pending.push(update);
        }
    }

    /// Turns every queued descriptor into a dirty marker for its layer.
    ///
    /// # Returns
    /// How many descriptors were dropped.
    pub fn demote_pending(&mut self) -> usize {
        let demoted = self.pending.len();
        self.queued.clear();
        for update in std::mem::take(&mut self.pending) {
            self.mark_dirty(update.layer());
        }
        demoted
    }

    /// Clears the dirty set and the queue; a full resend supersedes both.
    pub fn clear(&mut self) {
        self.dirty = BitArray::ZERO;
        self.pending.clear();
        self.queued.clear();
    }

    /// Removes and returns the queued descriptors that intersect `window`.
    pub fn take_visible(&mut self, window: &Area) -> Vec<TerrainUpdateInfo> {
        let (visible, hidden): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|update| update.area().intersects(window));
        for update in &visible {
            self.queued.remove(update);
        }
        self.pending = hidden;
        visible
    }
}

pub struct Grid {
    cell_size: usize,
    columns: usize,
    rows: usize,
    bounds: Area,
    cells: Vec<GridCell>,
}

impl Grid {
    pub fn new(width: usize, height: usize, cell_size: usize) -> Self {
        assert!(cell_size > 0, "grid cell size must be positive");
        let columns = width.div_ceil(cell_size);
        let rows = height.div_ceil(cell_size);
        let bounds = Area::whole(width, height);
        let mut cells = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for column in 0..columns {
                let x1 = (column * cell_size) as i32;
                let y1 = (row * cell_size) as i32;
                let area = Area::new(x1, y1, x1 + cell_size as i32 - 1, y1 + cell_size as i32 - 1);
                cells.push(GridCell::new(area.clamp(width, height)));
            }
        }
        Grid {
            cell_size,
            columns,
            rows,
            bounds,
            cells,
        }
    }

    pub fn cell_size(&self) -> usize {
        self.cell_size
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [GridCell] {
        &mut self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(GridCell::is_empty)
    }

    /// Indices of the cells `area` touches.
    pub fn cells_intersecting(&self, area: Area) -> Vec<usize> {
        let Some(area) = area.intersection(&self.bounds) else {
            return Vec::new();
        };
        let size = self.cell_size as i32;
        let (first_column, last_column) = ((area.x1 / size) as usize, (area.x2 / size) as usize);
        let (first_row, last_row) = ((area.y1 / size) as usize, (area.y2 / size) as usize);
        let mut indices = Vec::new();
        for row in first_row..=last_row.min(self.rows - 1) {
            for column in first_column..=last_column.min(self.columns - 1) {
                indices.push(row * self.columns + column);
            }
        }
        indices
    }

    /// Files `update` into every cell it touches.
    pub fn ingest(&mut self, update: TerrainUpdateInfo) {
        for index in self.cells_intersecting(update.area()) {
            let cell = &mut self.cells[index];
            match update {
                TerrainUpdateInfo::Tile { .. } => cell.queue(update),
                TerrainUpdateInfo::Area { layer, .. } => cell.mark_dirty(layer),
            }
        }
    }
}
