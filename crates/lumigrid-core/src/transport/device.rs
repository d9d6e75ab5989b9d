//! Per-device transport: encodes commands and frames for one driver device.
//!
//! The downstream microcontroller can silently reset (power blip, watchdog)
//! and come back with default geometry and brightness. It never reports
//! this, so the transport re-pushes CONFIGURE and the last-known brightness
//! on a wall-clock interval, piggybacked on ordinary frame traffic.

use super::bus::CommandBus;
use super::protocol;
use super::PixelTransport;
use crate::config::BusConfig;
use crate::error::{LumigridError, Result};
use crate::layout::{DeviceGeometry, Rgb};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tunables for one device link.
#[derive(Debug, Clone)]
pub struct BusOptions {
    /// Upper bound for a single bus transaction, in bytes.
    pub max_transfer: usize,
    /// Interval for the unconditional configuration re-push.
    pub config_refresh: std::time::Duration,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            max_transfer: BusConfig::MAX_TRANSFER,
            config_refresh: BusConfig::CONFIG_REFRESH_INTERVAL,
        }
    }
}

struct DeviceState {
    bus: Box<dyn CommandBus>,
    brightness: Option<u8>,
    last_config_push: Option<Instant>,
}

/// Transport for a single driver device.
pub struct DeviceTransport {
    geometry: DeviceGeometry,
    options: BusOptions,
    label: String,
    state: Mutex<DeviceState>,
}

impl DeviceTransport {
    /// Wrap a command bus. Sends an initial PING as a connection check;
    /// a failed ping is logged but not fatal (the device may still be
    /// booting and will pick up the periodic configuration push).
    pub fn new(bus: Box<dyn CommandBus>, geometry: DeviceGeometry, options: BusOptions) -> Self {
        let label = bus.describe();
        let transport = Self {
            geometry,
            options,
            label,
            state: Mutex::new(DeviceState {
                bus,
                brightness: None,
                last_config_push: None,
            }),
        };

        match transport.ping() {
            Ok(()) => info!(
                "Device {} ready: {} strips x {} LEDs",
                transport.label,
                geometry.strip_count(),
                geometry.leds_per_strip()
            ),
            Err(e) => warn!("Device {} ping failed: {}", transport.label, e),
        }

        transport
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn write(state: &mut DeviceState, mut command: Vec<u8>) -> Result<()> {
        protocol::pad_to_boundary(&mut command);
        state.bus.transfer(&command).map_err(LumigridError::bus)
    }

    /// Re-push geometry and brightness if the refresh interval has elapsed.
    ///
    /// Called with the state lock held so the refresh rides in front of the
    /// frame being written, never interleaved with it.
    fn maybe_refresh_config(&self, state: &mut DeviceState) -> Result<()> {
        let due = match state.last_config_push {
            None => true,
            Some(at) => at.elapsed() >= self.options.config_refresh,
        };
        if !due {
            return Ok(());
        }

        Self::write(
            state,
            protocol::encode_configure(
                self.geometry.strip_count() as u8,
                self.geometry.leds_per_strip() as u16,
            ),
        )?;
        if let Some(brightness) = state.brightness {
            Self::write(state, protocol::encode_set_brightness(brightness))?;
        }
        state.last_config_push = Some(Instant::now());
        debug!("Device {}: configuration re-pushed", self.label);
        Ok(())
    }
}

impl PixelTransport for DeviceTransport {
    fn geometry(&self) -> DeviceGeometry {
        self.geometry
    }

    fn set_all_pixels(&self, frame: &[Rgb]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.maybe_refresh_config(&mut state)?;
        for command in protocol::frame_commands(frame, self.options.max_transfer) {
            Self::write(&mut state, command)?;
        }
        Ok(())
    }

    fn set_pixel(&self, index: usize, color: Rgb) -> Result<()> {
        if index >= self.geometry.total_leds() {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        Self::write(&mut state, protocol::encode_set_pixel(index as u16, color))
    }

    fn set_brightness(&self, value: u8) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.brightness = Some(value);
        Self::write(&mut state, protocol::encode_set_brightness(value))
    }

    fn show(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::write(&mut state, protocol::encode_show())
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::write(&mut state, protocol::encode_clear())
    }

    fn configure(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.last_config_push = None; // force the push
        self.maybe_refresh_config(&mut state)
    }

    fn ping(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::write(&mut state, protocol::encode_ping())
    }

    fn commits_inline(&self) -> bool {
        // Both delivery paths commit: SET_ALL on receipt, chunks via SHOW.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::bus::MemoryBus;
    use crate::transport::protocol::{
        CMD_CONFIGURE, CMD_SET_ALL, CMD_SET_BRIGHTNESS, CMD_SET_RANGE, CMD_SHOW,
    };
    use std::time::Duration;

    fn transport_with_log(
        geometry: DeviceGeometry,
        options: BusOptions,
    ) -> (DeviceTransport, std::sync::Arc<Mutex<Vec<Vec<u8>>>>) {
        let bus = MemoryBus::new();
        let log = bus.log();
        let transport = DeviceTransport::new(Box::new(bus), geometry, options);
        log.lock().unwrap().clear(); // drop the construction ping
        (transport, log)
    }

    #[test]
    fn test_all_transactions_padded_and_bounded() {
        let (transport, log) = transport_with_log(
            DeviceGeometry::new(8, 140),
            BusOptions {
                max_transfer: 512,
                ..Default::default()
            },
        );

        let frame = vec![Rgb(5, 5, 5); 1120];
        transport.set_all_pixels(&frame).unwrap();

        let recorded = log.lock().unwrap();
        assert!(!recorded.is_empty());
        for txn in recorded.iter() {
            assert_eq!(txn.len() % BusConfig::WORD_ALIGN, 0);
            assert!(txn.len() <= 512);
        }
    }

    #[test]
    fn test_unaligned_max_transfer_never_exceeded() {
        let (transport, log) = transport_with_log(
            DeviceGeometry::new(8, 140),
            BusOptions {
                max_transfer: 510,
                ..Default::default()
            },
        );

        let frame = vec![Rgb(5, 5, 5); 1120];
        transport.set_all_pixels(&frame).unwrap();

        let recorded = log.lock().unwrap();
        assert!(!recorded.is_empty());
        for txn in recorded.iter() {
            assert_eq!(txn.len() % BusConfig::WORD_ALIGN, 0);
            assert!(txn.len() <= 510, "transaction of {} bytes", txn.len());
        }
    }

    #[test]
    fn test_oversized_frame_chunked_with_single_show() {
        let (transport, log) = transport_with_log(
            DeviceGeometry::new(8, 140),
            BusOptions {
                max_transfer: 256,
                config_refresh: Duration::from_secs(3600),
            },
        );
        transport.configure().unwrap();
        log.lock().unwrap().clear();

        transport.set_all_pixels(&vec![Rgb(1, 2, 3); 1120]).unwrap();

        let recorded = log.lock().unwrap();
        let shows = recorded.iter().filter(|t| t[0] == CMD_SHOW).count();
        assert_eq!(shows, 1);
        assert!(recorded.iter().all(|t| t[0] == CMD_SET_RANGE || t[0] == CMD_SHOW));
    }

    #[test]
    fn test_small_frame_single_set_all() {
        let (transport, log) = transport_with_log(
            DeviceGeometry::new(2, 10),
            BusOptions {
                max_transfer: 4096,
                config_refresh: Duration::from_secs(3600),
            },
        );
        transport.configure().unwrap();
        log.lock().unwrap().clear();

        transport.set_all_pixels(&vec![Rgb(1, 1, 1); 20]).unwrap();

        let recorded = log.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0][0], CMD_SET_ALL);
    }

    #[test]
    fn test_config_repush_precedes_first_frame() {
        let (transport, log) =
            transport_with_log(DeviceGeometry::new(2, 10), BusOptions::default());

        transport.set_brightness(77).unwrap();
        log.lock().unwrap().clear();

        transport.set_all_pixels(&vec![Rgb::BLACK; 20]).unwrap();

        let recorded = log.lock().unwrap();
        assert_eq!(recorded[0][0], CMD_CONFIGURE);
        assert_eq!(recorded[0][1], 2); // strip count
        assert_eq!(u16::from_be_bytes([recorded[0][2], recorded[0][3]]), 10);
        assert_eq!(recorded[1][0], CMD_SET_BRIGHTNESS);
        assert_eq!(recorded[1][1], 77);
        assert_eq!(recorded[2][0], CMD_SET_ALL);
    }

    #[test]
    fn test_config_not_repushed_within_interval() {
        let (transport, log) = transport_with_log(
            DeviceGeometry::new(2, 10),
            BusOptions {
                config_refresh: Duration::from_secs(3600),
                ..Default::default()
            },
        );

        transport.set_all_pixels(&vec![Rgb::BLACK; 20]).unwrap();
        transport.set_all_pixels(&vec![Rgb::BLACK; 20]).unwrap();

        let recorded = log.lock().unwrap();
        let configs = recorded.iter().filter(|t| t[0] == CMD_CONFIGURE).count();
        assert_eq!(configs, 1);
    }

    #[test]
    fn test_out_of_range_pixel_ignored() {
        let (transport, log) =
            transport_with_log(DeviceGeometry::new(2, 10), BusOptions::default());
        transport.set_pixel(500, Rgb(1, 1, 1)).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }
}
