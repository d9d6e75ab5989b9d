//! Grid geometry and pixel types shared by the whole stack.

use crate::config::GridDefaults;
use serde::{Deserialize, Serialize};

/// One RGB pixel. Serializes as a 3-element JSON array, which keeps status
/// documents and the frame payload codec compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Convert HSV (all components in 0.0..=1.0) to 8-bit RGB.
    pub fn from_hsv(h: f64, s: f64, v: f64) -> Rgb {
        let h = (h.rem_euclid(1.0)) * 6.0;
        let i = h.floor() as u32 % 6;
        let f = h - h.floor();
        let p = v * (1.0 - s);
        let q = v * (1.0 - f * s);
        let t = v * (1.0 - (1.0 - f) * s);
        let (r, g, b) = match i {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        Rgb(
            (r * 255.0).round() as u8,
            (g * 255.0).round() as u8,
            (b * 255.0).round() as u8,
        )
    }

    /// Scale each channel by `factor`, clamped to 0.0..=1.0.
    pub fn scaled(self, factor: f64) -> Rgb {
        let factor = factor.clamp(0.0, 1.0);
        Rgb(
            (self.0 as f64 * factor).round() as u8,
            (self.1 as f64 * factor).round() as u8,
            (self.2 as f64 * factor).round() as u8,
        )
    }
}

/// A full pixel-color snapshot for the whole grid.
pub type Frame = Vec<Rgb>;

/// Physical layout of the grid.
///
/// The `total_leds == strip_count * leds_per_strip` invariant is maintained
/// by construction; the fields are read-only to the rest of the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGeometry {
    strip_count: usize,
    leds_per_strip: usize,
    total_leds: usize,
}

impl DeviceGeometry {
    pub fn new(strip_count: usize, leds_per_strip: usize) -> Self {
        Self {
            strip_count,
            leds_per_strip,
            total_leds: strip_count * leds_per_strip,
        }
    }

    pub fn strip_count(&self) -> usize {
        self.strip_count
    }

    pub fn leds_per_strip(&self) -> usize {
        self.leds_per_strip
    }

    pub fn total_leds(&self) -> usize {
        self.total_leds
    }

    /// Geometry for one device slice of a larger grid.
    pub fn device_slice(&self, strips_per_device: usize) -> DeviceGeometry {
        DeviceGeometry::new(strips_per_device, self.leds_per_strip)
    }

    /// Ensure `frame` has exactly `total_leds` pixels.
    ///
    /// Shorter frames are zero-padded, longer ones truncated. Plugins are
    /// never rejected for returning the wrong length.
    pub fn normalize_frame(&self, mut frame: Frame) -> Frame {
        if frame.len() < self.total_leds {
            frame.resize(self.total_leds, Rgb::BLACK);
        } else if frame.len() > self.total_leds {
            frame.truncate(self.total_leds);
        }
        frame
    }

    /// A black frame of the right length.
    pub fn blank_frame(&self) -> Frame {
        vec![Rgb::BLACK; self.total_leds]
    }
}

impl Default for DeviceGeometry {
    fn default() -> Self {
        DeviceGeometry::new(GridDefaults::STRIP_COUNT, GridDefaults::LEDS_PER_STRIP)
    }
}
