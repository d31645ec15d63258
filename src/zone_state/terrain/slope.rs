//! # Slope Layer Module
//!
//! Slope is derived from altitude and never edited directly. For cell `(x, y)` the four
//! corner altitudes `a=(x,y)`, `b=(x+1,y)`, `c=(x+1,y+1)`, `d=(x,y+1)` are sampled as fine
//! altitude (clamped to the layer), together with the four edge midpoints and the corner
//! mean `i`. The slope byte is twice the summed absolute deviation from `i`, clamped to
//! `0..=255`.

use std::ops::Deref;

use super::{altitude::AltitudeLayer, area::Area, layer::Layer, LayerType};

pub struct SlopeLayer {
    layer: Layer<u8>,
}

impl SlopeLayer {
    pub fn new(width: usize, height: usize) -> Self {
        SlopeLayer {
            layer: Layer::new(LayerType::Slope, width, height),
        }
    }

    /// Recomputes the slope of every cell in `area` and writes it as one area update.
    ///
    /// # Returns
    /// The clamped area that was written, or `None` if `area` misses the layer.
    pub fn recompute(&mut self, altitude: &AltitudeLayer, area: Area) -> Option<Area> {
        let area = area.clamp(self.layer.width(), self.layer.height());
        if !area.is_valid() {
            return None;
        }
        let values: Vec<u8> = area.cells().map(|(x, y)| sample(altitude, x, y)).collect();
        self.layer.set_area(area, &values);
        Some(area)
    }

    /// True when the slope at `(x, y)` is below `threshold` (rule units of four slope steps).
    pub fn check_slope(&self, x: usize, y: usize, threshold: i32) -> bool {
        i64::from(self.layer.get(x, y)) < i64::from(threshold) * 4
    }
}

impl Deref for SlopeLayer {
    type Target = Layer<u8>;

    fn deref(&self) -> &Self::Target {
        &self.layer
    }
}

fn sample(altitude: &AltitudeLayer, x: i32, y: i32) -> u8 {
    let a = altitude.fine_clamped(x, y);
    let b = altitude.fine_clamped(x + 1, y);
    let c = altitude.fine_clamped(x + 1, y + 1);
    let d = altitude.fine_clamped(x, y + 1);
    let e = (a + b) / 2.0;
    let f = (b + c) / 2.0;
    let g = (c + d) / 2.0;
    let h = (d + a) / 2.0;
    let i = (a + b + c + d) / 4.0;
    let deviation: f32 = [a, b, c, d, e, f, g, h].iter().map(|v| (i - v).abs()).sum();
    (2.0 * deviation).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spike() -> AltitudeLayer {
        let mut altitude = AltitudeLayer::new(4, 4);
        altitude.set(1, 1, 1000);
        altitude
    }

    #[test]
    fn spike_slope_values() {
        let altitude = spike();
        let mut slope = SlopeLayer::new(4, 4);
        slope.recompute(&altitude, Area::whole(4, 4));
        for (x, y) in Area::whole(4, 4).cells() {
            let expected = if x <= 1 && y <= 1 { 156 } else { 0 };
            assert_eq!(slope.get(x as usize, y as usize), expected, "({x},{y})");
        }
    }

    #[test]
    fn recompute_is_deterministic() {
        let altitude = AltitudeLayer::from_raw(3, 3, vec![0, 40, 900, 70, 3000, 20, 5, 8000, 100]);
        let mut first = SlopeLayer::new(3, 3);
        let mut second = SlopeLayer::new(3, 3);
        first.recompute(&altitude, Area::whole(3, 3));
        second.recompute(&altitude, Area::whole(3, 3));
        assert_eq!(first.cells(), second.cells());
    }

    #[test]
    fn steep_slope_saturates() {
        let mut altitude = AltitudeLayer::new(2, 2);
        altitude.set(0, 0, u16::MAX);
        let mut slope = SlopeLayer::new(2, 2);
        slope.recompute(&altitude, Area::tile(0, 0));
        assert_eq!(slope.get(0, 0), 255);
    }

    #[test]
    fn recompute_outside_layer_is_noop() {
        let altitude = spike();
        let mut slope = SlopeLayer::new(4, 4);
        assert_eq!(slope.recompute(&altitude, Area::new(10, 10, 12, 12)), None);
        assert_eq!(slope.revision(), 0);
    }

    #[test]
    fn extreme_thresholds_compare_without_overflow() {
        let mut altitude = AltitudeLayer::new(2, 2);
        altitude.set(0, 0, u16::MAX);
        let mut slope = SlopeLayer::new(2, 2);
        slope.recompute(&altitude, Area::tile(0, 0));
        assert!(slope.check_slope(0, 0, i32::MAX));
        assert!(slope.check_slope(0, 0, 524_288));
        assert!(!slope.check_slope(0, 0, i32::MIN));
        assert!(!slope.check_slope(1, 1, i32::MIN));
    }

    #[test]
    fn check_slope_is_monotonic_in_threshold() {
        let altitude = spike();
        let mut slope = SlopeLayer::new(4, 4);
        slope.recompute(&altitude, Area::whole(4, 4));
        let mut previous = false;
        for threshold in -4..80 {
            let allowed = slope.check_slope(1, 1, threshold);
            assert!(allowed || !previous);
            previous = allowed;
        }
        assert!(!slope.check_slope(1, 1, 39));
        assert!(slope.check_slope(1, 1, 40));
    }
}
