//! # Layer Module
//!
//! This module provides `Layer<T>`, the dense raster every terrain layer is built on.
//!
//! ## Storage
//!
//! A layer covers a whole zone, one cell per world tile, stored row-major
//! (`index = y * width + x`). Cell types are plain-old-data (`bytemuck::Pod`), so bulk
//! transfers to and from the wire are byte copies.
//!
//! ## Change notifications
//!
//! Every mutation raises exactly one [`LayerEvent`]:
//! - `set` raises a `LayerChange::Cell` event for the written cell
//! - `set_area` and `copy_from_stream_to_area` raise a single `LayerChange::Area` event
//!   covering the (clamped) area, never one event per cell
//!
//! The two variants are kept apart on purpose: slope maintenance expands single cells to
//! their neighborhood, and replication queues cells individually but resends whole
//! regions for area edits.
//!
//! ## Bounds
//! Single-cell access outside the layer is a programming error and panics. Area access is
//! lenient: areas are clamped to the layer, because they may come from untrusted input.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

use bytemuck::Pod;

use super::{area::Area, LayerType};
use crate::error::TerrainError;

/// Requirements for a value stored in a layer cell.
pub trait LayerCell: Pod + Default + PartialEq + Send + Sync + 'static {}

impl<T: Pod + Default + PartialEq + Send + Sync + 'static> LayerCell for T {}

/// What part of a layer changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LayerChange {
    Cell { x: i32, y: i32 },
    Area(Area),
}

/// A change notification raised by a layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayerEvent {
    pub layer: LayerType,
    pub change: LayerChange,
}

/// Callback invoked for every event of the layer it is subscribed to.
pub type LayerObserver = Arc<dyn Fn(&LayerEvent) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscription list of a layer.
///
/// Observers are called while the list lock is held. That makes `unsubscribe` a barrier:
/// once it returns, no callback for that subscription is still running, so a monitor that
/// unsubscribes and then drains its pending set cannot miss a late event.
struct LayerObservers {
    next_id: AtomicU64,
    observers: Mutex<Vec<(SubscriptionId, LayerObserver)>>,
}

impl LayerObservers {
    fn new() -> Self {
        LayerObservers {
            next_id: AtomicU64::new(1),
            observers: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self, observer: LayerObserver) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(subscription, _)| *subscription != id);
        observers.len() != before
    }

    fn notify(&self, event: LayerEvent) {
        let observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, observer) in observers.iter() {
            observer(&event);
        }
    }

    fn len(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Pre-mutation hook applied by [`Layer::set`].
///
/// Receives the value currently stored and the incoming value, returns what is actually
/// written.
pub trait CellFilter<T>: Send + Sync {
    fn filter(&self, x: usize, y: usize, current: T, incoming: T) -> T;
}

/// A dense `width × height` raster of `T`.
pub struct Layer<T: LayerCell> {
    layer_type: LayerType,
    width: usize,
    height: usize,
    cells: Vec<T>,
    revision: u64,
    filter: Option<Box<dyn CellFilter<T>>>,
    observers: LayerObservers,
}

impl<T: LayerCell> Layer<T> {
    /// Creates a layer filled with `T::default()`.
    pub fn new(layer_type: LayerType, width: usize, height: usize) -> Self {
        Self::from_cells(layer_type, width, height, vec![T::default(); width * height])
    }

    /// Wraps existing row-major cell data.
    ///
    /// # Panics
    /// Panics if `cells.len() != width * height`.
    pub fn from_cells(layer_type: LayerType, width: usize, height: usize, cells: Vec<T>) -> Self {
        assert_eq!(
            cells.len(),
            width * height,
            "{layer_type:?} layer data does not match {width}x{height}"
        );
        Layer {
            layer_type,
            width,
            height,
            cells,
            revision: 0,
            filter: None,
            observers: LayerObservers::new(),
        }
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn bounds(&self) -> Area {
        Area::whole(self.width, self.height)
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Installs the hook `set` runs before every single-cell write.
    pub fn set_filter(&mut self, filter: Box<dyn CellFilter<T>>) {
        self.filter = Some(filter);
    }

    fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "({x},{y}) outside {:?} layer {}x{}",
            self.layer_type,
            self.width,
            self.height
        );
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.cells[self.index(x, y)]
    }

    /// Writes one cell through the filter and raises a cell event.
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let index = self.index(x, y);
        let value = match &self.filter {
            Some(filter) => filter.filter(x, y, self.cells[index], value),
            None => value,
        };
        self.cells[index] = value;
        self.revision += 1;
        self.notify(LayerChange::Cell {
            x: x as i32,
            y: y as i32,
        });
    }

    /// Reads the clamped `area` in row-major order.
    pub fn get_area(&self, area: Area) -> Vec<T> {
        let clamped = area.clamp(self.width, self.height);
        if !clamped.is_valid() {
            return Vec::new();
        }
        let row_len = clamped.width() as usize;
        if clamped.x1 == 0 && row_len == self.width {
            let start = clamped.y1 as usize * self.width;
            return self.cells[start..start + clamped.cell_count()].to_vec();
        }
        let mut data = Vec::with_capacity(clamped.cell_count());
        for y in clamped.y1..=clamped.y2 {
            let start = y as usize * self.width + clamped.x1 as usize;
            data.extend_from_slice(&self.cells[start..start + row_len]);
        }
        data
    }

    /// Writes `data` (row-major, sized for `area`) and raises one area event.
    ///
    /// Cells of `area` that fall outside the layer are skipped.
    ///
    /// # Panics
    /// Panics if `data.len() != area.cell_count()`.
    pub fn set_area(&mut self, area: Area, data: &[T]) {
        assert_eq!(
            data.len(),
            area.cell_count(),
            "area {area:?} needs {} cells",
            area.cell_count()
        );
        let clamped = area.clamp(self.width, self.height);
        if !clamped.is_valid() {
            return;
        }
        self.write_rows(area, clamped, data);
        self.revision += 1;
        self.notify(LayerChange::Area(clamped));
    }

    fn write_rows(&mut self, area: Area, clamped: Area, data: &[T]) {
        let row_len = clamped.width() as usize;
        if area == clamped && clamped.x1 == 0 && row_len == self.width {
            let start = clamped.y1 as usize * self.width;
            self.cells[start..start + data.len()].copy_from_slice(data);
            return;
        }
        let source_width = area.width() as usize;
        for y in clamped.y1..=clamped.y2 {
            let row = (y as i64 - area.y1 as i64) as usize;
            let source = row * source_width + (clamped.x1 as i64 - area.x1 as i64) as usize;
            let target = y as usize * self.width + clamped.x1 as usize;
            self.cells[target..target + row_len].copy_from_slice(&data[source..source + row_len]);
        }
    }

    /// Serializes the clamped `area` as raw cell bytes.
    ///
    /// # Returns
    /// The area actually copied and its bytes.
    pub fn copy_area_to_bytes(&self, area: Area) -> (Area, Vec<u8>) {
        let clamped = area.clamp(self.width, self.height);
        let cells = self.get_area(clamped);
        (clamped, bytemuck::cast_slice(&cells).to_vec())
    }

    /// Applies raw cell bytes laid out row-major for `area`.
    ///
    /// The area is clamped; bytes for cells outside the layer are consumed and dropped.
    /// One area event is raised for the clamped area.
    ///
    /// # Errors
    /// - [`TerrainError::AreaTooLarge`] if the area's byte size does not fit in `usize`
    /// - [`TerrainError::Truncated`] if `bytes` is shorter than `area` requires
    ///
    /// Nothing is written in either case.
    pub fn copy_from_stream_to_area(&mut self, area: Area, bytes: &[u8]) -> Result<Area, TerrainError> {
        let cell_size = std::mem::size_of::<T>();
        let expected = area
            .checked_byte_len(cell_size)
            .ok_or(TerrainError::AreaTooLarge(area))?;
        if bytes.len() < expected {
            return Err(TerrainError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        let clamped = area.clamp(self.width, self.height);
        if !clamped.is_valid() {
            return Ok(clamped);
        }
        let cells: Vec<T> = bytes[..expected]
            .chunks_exact(cell_size)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        self.write_rows(area, clamped, &cells);
        self.revision += 1;
        self.notify(LayerChange::Area(clamped));
        Ok(clamped)
    }

    pub fn subscribe(&self, observer: LayerObserver) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&self, change: LayerChange) {
        self.observers.notify(LayerEvent {
            layer: self.layer_type,
            change,
        });
    }
}

/// Type-erased view of a layer, used where the layer is picked by [`LayerType`] at
/// runtime (packets, subscriptions).
pub trait TerrainLayer: Send + Sync {
    fn layer_type(&self) -> LayerType;
    fn cell_size(&self) -> usize;
    fn revision(&self) -> u64;
    fn bounds(&self) -> Area;
    fn copy_area_to_bytes(&self, area: Area) -> (Area, Vec<u8>);
    fn copy_from_stream_to_area(&mut self, area: Area, bytes: &[u8]) -> Result<Area, TerrainError>;
    fn subscribe(&self, observer: LayerObserver) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

impl<T: LayerCell> TerrainLayer for Layer<T> {
    fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    fn cell_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn bounds(&self) -> Area {
        Layer::bounds(self)
    }

    fn copy_area_to_bytes(&self, area: Area) -> (Area, Vec<u8>) {
        Layer::copy_area_to_bytes(self, area)
    }

    fn copy_from_stream_to_area(&mut self, area: Area, bytes: &[u8]) -> Result<Area, TerrainError> {
        Layer::copy_from_stream_to_area(self, area, bytes)
    }

    fn subscribe(&self, observer: LayerObserver) -> SubscriptionId {
        Layer::subscribe(self, observer)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        Layer::unsubscribe(self, id)
    }
}
