//! Device transport: frame and command delivery to the driver hardware.
//!
//! [`PixelTransport`] is the seam the runtime talks to. Behind it sit a
//! per-device transport ([`DeviceTransport`]) encoding the wire protocol over
//! a [`CommandBus`], and a fan-out layer ([`MultiDeviceTransport`]) that
//! splits a grid frame across several physical devices in parallel.

pub mod bus;
pub mod device;
pub mod multi;
pub mod protocol;

pub use bus::{CommandBus, MemoryBus, NullBus};
#[cfg(feature = "hardware")]
pub use bus::spi::SpidevBus;
pub use device::{BusOptions, DeviceTransport};
pub use multi::MultiDeviceTransport;

use crate::error::Result;
use crate::layout::{DeviceGeometry, Frame, Rgb};
use std::sync::Mutex;

/// Frame and command sink for one grid (possibly spanning several devices).
///
/// Methods take `&self`: implementations use interior locking so the
/// playback thread, the stop path, and status callers can share one handle.
pub trait PixelTransport: Send + Sync {
    /// Layout this transport drives.
    fn geometry(&self) -> DeviceGeometry;

    /// Deliver a full frame. The frame must already be normalized to
    /// `geometry().total_leds()` pixels.
    fn set_all_pixels(&self, frame: &[Rgb]) -> Result<()>;

    /// Set one pixel by global index. Out-of-range indices are ignored.
    fn set_pixel(&self, index: usize, color: Rgb) -> Result<()>;

    /// Set global brightness (0-255); remembered for configuration re-push.
    fn set_brightness(&self, value: u8) -> Result<()>;

    /// Commit staged pixel data to the LEDs.
    fn show(&self) -> Result<()>;

    /// Blank the grid.
    fn clear(&self) -> Result<()>;

    /// Push geometry (and last-known brightness) to the hardware.
    fn configure(&self) -> Result<()>;

    /// Liveness probe.
    fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Whether `set_all_pixels` already commits the frame, making an explicit
    /// `show` per frame unnecessary.
    fn commits_inline(&self) -> bool {
        false
    }
}

/// No-op transport used when instantiating animations for metadata or
/// previews: mirrors real dimensions, performs no I/O, can never block or
/// interfere with the hardware.
pub struct PreviewTransport {
    geometry: DeviceGeometry,
}

impl PreviewTransport {
    pub fn new(geometry: DeviceGeometry) -> Self {
        Self { geometry }
    }
}

impl PixelTransport for PreviewTransport {
    fn geometry(&self) -> DeviceGeometry {
        self.geometry
    }

    fn set_all_pixels(&self, _frame: &[Rgb]) -> Result<()> {
        Ok(())
    }

    fn set_pixel(&self, _index: usize, _color: Rgb) -> Result<()> {
        Ok(())
    }

    fn set_brightness(&self, _value: u8) -> Result<()> {
        Ok(())
    }

    fn show(&self) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn configure(&self) -> Result<()> {
        Ok(())
    }

    fn commits_inline(&self) -> bool {
        true
    }
}

/// Transport that keeps the most recent frame it was handed.
///
/// Lets the preview path run a self-paced animation briefly and read back
/// what it drew, without any hardware involvement.
pub struct CapturingTransport {
    geometry: DeviceGeometry,
    last_frame: Mutex<Option<Frame>>,
    frames_seen: Mutex<usize>,
}

impl CapturingTransport {
    pub fn new(geometry: DeviceGeometry) -> Self {
        Self {
            geometry,
            last_frame: Mutex::new(None),
            frames_seen: Mutex::new(0),
        }
    }

    /// The most recent frame delivered, if any.
    pub fn last_frame(&self) -> Option<Frame> {
        self.last_frame.lock().unwrap().clone()
    }

    /// Number of full frames delivered so far.
    pub fn frames_seen(&self) -> usize {
        *self.frames_seen.lock().unwrap()
    }
}

impl PixelTransport for CapturingTransport {
    fn geometry(&self) -> DeviceGeometry {
        self.geometry
    }

    fn set_all_pixels(&self, frame: &[Rgb]) -> Result<()> {
        *self.last_frame.lock().unwrap() = Some(frame.to_vec());
        *self.frames_seen.lock().unwrap() += 1;
        Ok(())
    }

    fn set_pixel(&self, index: usize, color: Rgb) -> Result<()> {
        let mut guard = self.last_frame.lock().unwrap();
        let frame = guard.get_or_insert_with(|| self.geometry.blank_frame());
        if let Some(pixel) = frame.get_mut(index) {
            *pixel = color;
        }
        Ok(())
    }

    fn set_brightness(&self, _value: u8) -> Result<()> {
        Ok(())
    }

    fn show(&self) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.last_frame.lock().unwrap() = Some(self.geometry.blank_frame());
        Ok(())
    }

    fn configure(&self) -> Result<()> {
        Ok(())
    }

    fn commits_inline(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capturing_transport_records_frames() {
        let transport = CapturingTransport::new(DeviceGeometry::new(2, 4));
        assert!(transport.last_frame().is_none());

        transport.set_all_pixels(&vec![Rgb(1, 2, 3); 8]).unwrap();
        transport.set_all_pixels(&vec![Rgb(4, 5, 6); 8]).unwrap();

        assert_eq!(transport.frames_seen(), 2);
        assert_eq!(transport.last_frame().unwrap()[0], Rgb(4, 5, 6));
    }

    #[test]
    fn test_capturing_transport_set_pixel() {
        let transport = CapturingTransport::new(DeviceGeometry::new(2, 4));
        transport.set_pixel(3, Rgb(7, 7, 7)).unwrap();
        transport.set_pixel(100, Rgb(9, 9, 9)).unwrap();

        let frame = transport.last_frame().unwrap();
        assert_eq!(frame.len(), 8);
        assert_eq!(frame[3], Rgb(7, 7, 7));
    }
}
