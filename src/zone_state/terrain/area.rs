//! # Area Module
//!
//! Axis-aligned, inclusive rectangles of cells used by every bulk layer operation.

use cgmath::Point2;
use serde::{Deserialize, Serialize};

/// An inclusive rectangle of cells `(x1, y1)..=(x2, y2)`.
///
/// Areas coming from the network or from neighborhood arithmetic can reach outside the
/// zone, so bulk operations always run them through [`Area::clamp`] first. A clamped area
/// that lies entirely outside the zone comes back invalid (`x1 > x2` or `y1 > y2`) and is
/// treated as empty.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Area {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Area {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Area { x1, y1, x2, y2 }
    }

    /// A single-cell area.
    pub const fn tile(x: i32, y: i32) -> Self {
        Area::new(x, y, x, y)
    }

    /// The square `center ± radius`.
    pub fn around(center: Point2<i32>, radius: i32) -> Self {
        Area::new(
            center.x.saturating_sub(radius),
            center.y.saturating_sub(radius),
            center.x.saturating_add(radius),
            center.y.saturating_add(radius),
        )
    }

    /// Covers a whole `width × height` zone.
    pub fn whole(width: usize, height: usize) -> Self {
        Area::new(0, 0, width as i32 - 1, height as i32 - 1)
    }

    /// Column count, computed in `i64` so corners from untrusted input cannot overflow.
    pub fn width(&self) -> i64 {
        self.x2 as i64 - self.x1 as i64 + 1
    }

    pub fn height(&self) -> i64 {
        self.y2 as i64 - self.y1 as i64 + 1
    }

    pub fn is_valid(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }

    /// Number of cells, zero for an invalid area and `usize::MAX` if it does not fit.
    pub fn cell_count(&self) -> usize {
        self.checked_cell_count().unwrap_or(usize::MAX)
    }

    /// Number of cells, `None` if it does not fit in `usize`.
    pub fn checked_cell_count(&self) -> Option<usize> {
        if !self.is_valid() {
            return Some(0);
        }
        let cells = (self.width() as u64).checked_mul(self.height() as u64)?;
        usize::try_from(cells).ok()
    }

    /// Bytes needed for the area's cells at `cell_size` bytes each.
    pub fn checked_byte_len(&self, cell_size: usize) -> Option<usize> {
        self.checked_cell_count()?.checked_mul(cell_size)
    }

    pub fn center(&self) -> Point2<i32> {
        Point2::new(
            ((self.x1 as i64 + self.x2 as i64) / 2) as i32,
            ((self.y1 as i64 + self.y2 as i64) / 2) as i32,
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    /// Restricts the area to `0..width` × `0..height`.
    pub fn clamp(&self, width: usize, height: usize) -> Area {
        Area::new(
            self.x1.max(0),
            self.y1.max(0),
            self.x2.min(width as i32 - 1),
            self.y2.min(height as i32 - 1),
        )
    }

    /// Grows the area by `cells` on every side.
    pub fn expand(&self, cells: i32) -> Area {
        Area::new(
            self.x1.saturating_sub(cells),
            self.y1.saturating_sub(cells),
            self.x2.saturating_add(cells),
            self.y2.saturating_add(cells),
        )
    }

    pub fn intersects(&self, other: &Area) -> bool {
        self.intersection(other).is_some()
    }

    pub fn intersection(&self, other: &Area) -> Option<Area> {
        let area = Area::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        );
        area.is_valid().then_some(area)
    }

    /// Iterates cell coordinates in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> {
        let area = *self;
        let rows = if area.is_valid() { area.y1..=area.y2 } else { 1..=0 };
        rows.flat_map(move |y| (area.x1..=area.x2).map(move |x| (x, y)))
    }
}
