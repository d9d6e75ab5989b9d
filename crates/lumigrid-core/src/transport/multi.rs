//! Multi-device fan-out.
//!
//! A grid frame spanning several physical devices is partitioned into
//! contiguous strip ranges, one per device, and dispatched concurrently with
//! one worker thread per device. The dispatch waits for all workers up to a
//! bounded timeout: a slow or unresponsive device misses that frame, the
//! others are unaffected, and the call always returns.

use super::device::DeviceTransport;
use super::PixelTransport;
use crate::config::BusConfig;
use crate::error::{LumigridError, Result};
use crate::layout::{DeviceGeometry, Frame, Rgb};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Fan-out transport across several driver devices.
pub struct MultiDeviceTransport {
    devices: Vec<Arc<DeviceTransport>>,
    geometry: DeviceGeometry,
    strips_per_device: usize,
    fanout_timeout: Duration,
}

impl MultiDeviceTransport {
    /// Build a fan-out over `devices`, which receive consecutive strip
    /// ranges in order. All devices must share the same slice geometry.
    pub fn new(devices: Vec<Arc<DeviceTransport>>) -> Result<Self> {
        Self::with_timeout(devices, BusConfig::FANOUT_TIMEOUT)
    }

    pub fn with_timeout(
        devices: Vec<Arc<DeviceTransport>>,
        fanout_timeout: Duration,
    ) -> Result<Self> {
        let first = devices.first().ok_or_else(|| LumigridError::Config {
            message: "at least one device is required".into(),
        })?;
        let slice = first.geometry();
        if devices.iter().any(|d| d.geometry() != slice) {
            return Err(LumigridError::Config {
                message: "all devices must share the same strip layout".into(),
            });
        }

        let geometry = DeviceGeometry::new(
            slice.strip_count() * devices.len(),
            slice.leds_per_strip(),
        );
        Ok(Self {
            devices,
            geometry,
            strips_per_device: slice.strip_count(),
            fanout_timeout,
        })
    }

    fn leds_per_device(&self) -> usize {
        self.strips_per_device * self.geometry.leds_per_strip()
    }

    /// Partition a full frame into per-device chunks of consecutive strips,
    /// padding with black where the input runs short.
    fn split_frame(&self, frame: &[Rgb]) -> Vec<Frame> {
        let per_device = self.leds_per_device();
        (0..self.devices.len())
            .map(|device_index| {
                let start = device_index * per_device;
                let mut chunk: Frame = frame
                    .iter()
                    .skip(start)
                    .take(per_device)
                    .copied()
                    .collect();
                chunk.resize(per_device, Rgb::BLACK);
                chunk
            })
            .collect()
    }

    /// Run `op` on every device concurrently, waiting up to the fan-out
    /// timeout. Per-device failures and timeouts are logged, never
    /// propagated: the next frame retries naturally.
    fn fan_out<F>(&self, op_name: &str, op: F)
    where
        F: Fn(&DeviceTransport, usize) -> Result<()> + Send + Sync + 'static,
    {
        if self.devices.len() == 1 {
            if let Err(e) = op(&self.devices[0], 0) {
                warn!("Device {}: {} failed: {}", self.devices[0].label(), op_name, e);
            }
            return;
        }

        let op = Arc::new(op);
        let (done_tx, done_rx) = mpsc::channel::<(usize, Result<()>)>();

        for (index, device) in self.devices.iter().enumerate() {
            let device = device.clone();
            let op = op.clone();
            let done_tx = done_tx.clone();
            let builder = thread::Builder::new().name(format!("fanout-{}", index));
            let spawned = builder.spawn(move || {
                let result = op(&device, index);
                let _ = done_tx.send((index, result));
            });
            if let Err(e) = spawned {
                warn!("Failed to spawn fan-out worker {}: {}", index, e);
            }
        }
        drop(done_tx);

        let deadline = Instant::now() + self.fanout_timeout;
        let mut completed = 0;
        while completed < self.devices.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match done_rx.recv_timeout(remaining) {
                Ok((index, Ok(()))) => {
                    let _ = index;
                    completed += 1;
                }
                Ok((index, Err(e))) => {
                    warn!(
                        "Device {}: {} failed: {}",
                        self.devices[index].label(),
                        op_name,
                        e
                    );
                    completed += 1;
                }
                Err(_) => {
                    warn!(
                        "{} timed out with {}/{} devices done; late devices miss this frame",
                        op_name,
                        completed,
                        self.devices.len()
                    );
                    break;
                }
            }
        }
    }
}

impl PixelTransport for MultiDeviceTransport {
    fn geometry(&self) -> DeviceGeometry {
        self.geometry
    }

    fn set_all_pixels(&self, frame: &[Rgb]) -> Result<()> {
        let chunks = self.split_frame(frame);
        self.fan_out("set_all_pixels", move |device, index| {
            device.set_all_pixels(&chunks[index])
        });
        Ok(())
    }

    fn set_pixel(&self, index: usize, color: Rgb) -> Result<()> {
        if index >= self.geometry.total_leds() {
            return Ok(());
        }
        let strip = index / self.geometry.leds_per_strip();
        let offset = index % self.geometry.leds_per_strip();
        let device_index = strip / self.strips_per_device;
        let local_strip = strip % self.strips_per_device;
        let local_index = local_strip * self.geometry.leds_per_strip() + offset;
        self.devices[device_index].set_pixel(local_index, color)
    }

    fn set_brightness(&self, value: u8) -> Result<()> {
        self.fan_out("set_brightness", move |device, _| {
            device.set_brightness(value)
        });
        Ok(())
    }

    fn show(&self) -> Result<()> {
        self.fan_out("show", |device, _| device.show());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.fan_out("clear", |device, _| device.clear());
        Ok(())
    }

    fn configure(&self) -> Result<()> {
        self.fan_out("configure", |device, _| device.configure());
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        self.fan_out("ping", |device, _| device.ping());
        Ok(())
    }

    fn commits_inline(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::bus::{CommandBus, MemoryBus};
    use crate::transport::device::BusOptions;
    use crate::transport::protocol::CMD_SET_ALL;
    use std::io;
    use std::sync::Mutex;

    /// Bus that stalls before recording, to simulate an unresponsive device.
    struct SlowBus {
        delay: Duration,
        transactions: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl CommandBus for SlowBus {
        fn transfer(&mut self, data: &[u8]) -> io::Result<()> {
            thread::sleep(self.delay);
            self.transactions.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    fn quiet_options() -> BusOptions {
        BusOptions {
            max_transfer: 65536,
            config_refresh: Duration::from_secs(3600),
        }
    }

    fn memory_device(
        geometry: DeviceGeometry,
    ) -> (Arc<DeviceTransport>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let bus = MemoryBus::new();
        let log = bus.log();
        let device = Arc::new(DeviceTransport::new(
            Box::new(bus),
            geometry,
            quiet_options(),
        ));
        device.configure().unwrap(); // absorb the initial config push
        log.lock().unwrap().clear();
        (device, log)
    }

    fn set_all_payload(log: &Arc<Mutex<Vec<Vec<u8>>>>) -> Vec<u8> {
        let recorded = log.lock().unwrap();
        let txn = recorded
            .iter()
            .find(|t| t[0] == CMD_SET_ALL)
            .expect("device should have received a SET_ALL");
        txn[1..1 + 8 * 140 * 3].to_vec()
    }

    #[test]
    fn test_each_device_gets_its_contiguous_strip_range() {
        let slice = DeviceGeometry::new(8, 140);
        let (device_a, log_a) = memory_device(slice);
        let (device_b, log_b) = memory_device(slice);
        let multi = MultiDeviceTransport::new(vec![device_a, device_b]).unwrap();

        assert_eq!(multi.geometry().total_leds(), 2240);

        // First half red, second half blue.
        let mut frame = vec![Rgb(255, 0, 0); 1120];
        frame.extend(vec![Rgb(0, 0, 255); 1120]);
        multi.set_all_pixels(&frame).unwrap();

        let payload_a = set_all_payload(&log_a);
        let payload_b = set_all_payload(&log_b);
        assert_eq!(&payload_a[..3], &[255, 0, 0]);
        assert_eq!(&payload_a[payload_a.len() - 3..], &[255, 0, 0]);
        assert_eq!(&payload_b[..3], &[0, 0, 255]);
        assert_eq!(&payload_b[payload_b.len() - 3..], &[0, 0, 255]);
    }

    #[test]
    fn test_slow_device_does_not_stall_the_other() {
        let slice = DeviceGeometry::new(8, 140);
        let slow_log = Arc::new(Mutex::new(Vec::new()));
        let slow = Arc::new(DeviceTransport::new(
            Box::new(SlowBus {
                delay: Duration::from_millis(500),
                transactions: slow_log.clone(),
            }),
            slice,
            quiet_options(),
        ));
        let (fast, fast_log) = memory_device(slice);

        let multi = MultiDeviceTransport::with_timeout(
            vec![slow, fast],
            Duration::from_millis(100),
        )
        .unwrap();

        let start = Instant::now();
        multi.set_all_pixels(&vec![Rgb(1, 2, 3); 2240]).unwrap();
        let elapsed = start.elapsed();

        // Returned within the bounded wait, not the slow device's delay.
        assert!(elapsed < Duration::from_millis(400));
        // The fast device still received its chunk.
        assert!(fast_log
            .lock()
            .unwrap()
            .iter()
            .any(|t| t[0] == CMD_SET_ALL));
    }

    #[test]
    fn test_set_pixel_routes_to_correct_device() {
        let slice = DeviceGeometry::new(8, 140);
        let (device_a, log_a) = memory_device(slice);
        let (device_b, log_b) = memory_device(slice);
        let multi = MultiDeviceTransport::new(vec![device_a, device_b]).unwrap();

        // Strip 9 lives on the second device (local strip 1).
        let global = 9 * 140 + 5;
        multi.set_pixel(global, Rgb(7, 8, 9)).unwrap();

        assert!(log_a.lock().unwrap().is_empty());
        let recorded = log_b.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let local = u16::from_be_bytes([recorded[0][1], recorded[0][2]]) as usize;
        assert_eq!(local, 140 + 5);
    }

    #[test]
    fn test_mismatched_device_layouts_rejected() {
        let (device_a, _) = memory_device(DeviceGeometry::new(8, 140));
        let (device_b, _) = memory_device(DeviceGeometry::new(7, 140));
        assert!(MultiDeviceTransport::new(vec![device_a, device_b]).is_err());
    }
}
