//! # Altitude Layer Module
//!
//! Raw altitude is stored as `u16` in 1/32 world units. Two derived views exist:
//! - quantized altitude, `raw >> 5`, in `0..=2047`, used by vegetation rules
//! - fine altitude, `raw / 32.0`, used by slope sampling
//!
//! An altitude layer can be made terraformable: every later single-cell write is then
//! passed through a [`TerraformBarrier`].

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use super::{
    layer::{CellFilter, Layer},
    LayerType,
};

pub const ALTITUDE_FRACTION_BITS: u32 = 5;
pub const ALTITUDE_SCALE: f32 = 32.0;
pub const MAX_QUANTIZED_ALTITUDE: u16 = u16::MAX >> ALTITUDE_FRACTION_BITS;

pub fn quantize(raw: u16) -> u16 {
    raw >> ALTITUDE_FRACTION_BITS
}

pub fn fine(raw: u16) -> f32 {
    raw as f32 / ALTITUDE_SCALE
}

pub struct AltitudeLayer {
    layer: Layer<u16>,
    terraformable: bool,
}

impl AltitudeLayer {
    pub fn new(width: usize, height: usize) -> Self {
        AltitudeLayer {
            layer: Layer::new(LayerType::Altitude, width, height),
            terraformable: false,
        }
    }

    pub fn from_raw(width: usize, height: usize, raw: Vec<u16>) -> Self {
        AltitudeLayer {
            layer: Layer::from_cells(LayerType::Altitude, width, height, raw),
            terraformable: false,
        }
    }

    pub fn quantized(&self, x: usize, y: usize) -> u16 {
        quantize(self.layer.get(x, y))
    }

    pub fn fine(&self, x: usize, y: usize) -> f32 {
        fine(self.layer.get(x, y))
    }

    /// Fine altitude with coordinates clamped to the layer.
    pub fn fine_clamped(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.layer.width() as i32 - 1) as usize;
        let y = y.clamp(0, self.layer.height() as i32 - 1) as usize;
        self.fine(x, y)
    }

    /// Snapshots the current heights as the "original" terrain and installs the barrier
    /// filter built from them.
    pub fn make_terraformable(&mut self, range: BarrierRange, blend: Box<dyn BlendSource>) {
        let barrier = TerraformBarrier {
            width: self.layer.width(),
            original: self.layer.cells().to_vec(),
            range,
            blend,
        };
        self.layer.set_filter(Box::new(barrier));
        self.terraformable = true;
    }

    pub fn is_terraformable(&self) -> bool {
        self.terraformable
    }
}

impl Deref for AltitudeLayer {
    type Target = Layer<u16>;

    fn deref(&self) -> &Self::Target {
        &self.layer
    }
}

impl DerefMut for AltitudeLayer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.layer
    }
}

/// Zone-wide raw altitude limits for terraforming.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarrierRange {
    pub min: u16,
    pub max: u16,
}

impl Default for BarrierRange {
    fn default() -> Self {
        BarrierRange { min: 0, max: u16::MAX }
    }
}

/// Per-cell weight in `0.0..=1.0` pulling the barrier toward the original height.
pub trait BlendSource: Send + Sync {
    fn weight(&self, x: usize, y: usize) -> f32;
}

/// Same weight everywhere.
pub struct UniformBlend(pub f32);

impl BlendSource for UniformBlend {
    fn weight(&self, _x: usize, _y: usize) -> f32 {
        self.0
    }
}

/// Weights stored as bytes, 255 = fully pinned to the original height.
pub struct BlendMap {
    width: usize,
    weights: Vec<u8>,
}

impl BlendMap {
    pub fn new(width: usize, weights: Vec<u8>) -> Self {
        BlendMap { width, weights }
    }
}

impl BlendSource for BlendMap {
    fn weight(&self, x: usize, y: usize) -> f32 {
        self.weights
            .get(y * self.width + x)
            .map_or(0.0, |&weight| weight as f32 / 255.0)
    }
}

/// Clamp applied to terraforming writes.
///
/// The per-cell window is the global range blended toward the original height. A write is
/// clamped into the window only when the value currently stored is already inside it;
/// cells that were outside the window before the edit accept any value.
pub struct TerraformBarrier {
    width: usize,
    original: Vec<u16>,
    range: BarrierRange,
    blend: Box<dyn BlendSource>,
}

impl TerraformBarrier {
    pub fn limits(&self, x: usize, y: usize) -> (u16, u16) {
        let original = self.original[y * self.width + x] as f32;
        let t = self.blend.weight(x, y).clamp(0.0, 1.0);
        let lerp = |from: u16| from as f32 + (original - from as f32) * t;
        let min = lerp(self.range.min).round() as u16;
        let max = lerp(self.range.max).round() as u16;
        (min.min(max), max.max(min))
    }
}

impl CellFilter<u16> for TerraformBarrier {
    fn filter(&self, x: usize, y: usize, current: u16, incoming: u16) -> u16 {
        let (min, max) = self.limits(x, y);
        if (min..=max).contains(&current) {
            incoming.clamp(min, max)
        } else {
            incoming
        }
    }
}
