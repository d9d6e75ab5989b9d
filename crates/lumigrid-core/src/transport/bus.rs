//! Command bus seam between the transport and the physical wire.
//!
//! The transport only needs half-duplex writes of padded command buffers, so
//! the seam is a single-method trait. Hardware builds get the Linux spidev
//! implementation; everything else (tests, mock daemon runs, previews) uses
//! the in-memory buses.

use std::io;
use std::sync::{Arc, Mutex};

/// Half-duplex command bus carrying padded command buffers to one device.
pub trait CommandBus: Send {
    /// Write one complete transaction.
    fn transfer(&mut self, data: &[u8]) -> io::Result<()>;

    /// Human-readable bus identity for logs.
    fn describe(&self) -> String {
        "bus".to_string()
    }
}

/// Bus that discards every write. Used for mock daemon runs without hardware.
#[derive(Debug, Default)]
pub struct NullBus;

impl CommandBus for NullBus {
    fn transfer(&mut self, _data: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "null".to_string()
    }
}

/// Bus that records every transaction, for assertions in tests.
#[derive(Debug, Default)]
pub struct MemoryBus {
    transactions: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded transactions.
    pub fn log(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.transactions.clone()
    }
}

impl CommandBus for MemoryBus {
    fn transfer(&mut self, data: &[u8]) -> io::Result<()> {
        self.transactions.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Linux SPI bus via `/dev/spidevB.D`.
#[cfg(feature = "hardware")]
pub mod spi {
    use super::CommandBus;
    use crate::config::BusConfig;
    use spidev::{SpiModeFlags, Spidev, SpidevOptions};
    use std::io::{self, Write};
    use tracing::info;

    pub struct SpidevBus {
        spi: Spidev,
        path: String,
    }

    impl SpidevBus {
        /// Open `/dev/spidev{bus}.{cs}` and configure it.
        ///
        /// This is the one fatal acquisition point: if the device node cannot
        /// be opened or configured there is no point starting the daemon.
        pub fn open(bus: u8, cs: u8, speed_hz: u32, mode: u8) -> io::Result<Self> {
            let path = format!("/dev/spidev{}.{}", bus, cs);
            let mut spi = Spidev::open(&path)?;
            let mode_flags = match mode {
                0 => SpiModeFlags::SPI_MODE_0,
                1 => SpiModeFlags::SPI_MODE_1,
                2 => SpiModeFlags::SPI_MODE_2,
                _ => SpiModeFlags::SPI_MODE_3,
            };
            let options = SpidevOptions::new()
                .bits_per_word(8)
                .max_speed_hz(speed_hz)
                .mode(mode_flags)
                .build();
            spi.configure(&options)?;
            info!(
                "SPI bus {} ready ({:.1} MHz, mode {})",
                path,
                speed_hz as f64 / 1e6,
                mode
            );
            Ok(Self { spi, path })
        }

        /// Open with the configured default speed and mode.
        pub fn open_default(bus: u8, cs: u8) -> io::Result<Self> {
            Self::open(bus, cs, BusConfig::SPI_SPEED_HZ, BusConfig::SPI_MODE)
        }
    }

    impl CommandBus for SpidevBus {
        fn transfer(&mut self, data: &[u8]) -> io::Result<()> {
            self.spi.write_all(data)
        }

        fn describe(&self) -> String {
            self.path.clone()
        }
    }
}

#[cfg(feature = "hardware")]
pub use spi::SpidevBus;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_bus_records_transactions() {
        let mut bus = MemoryBus::new();
        let log = bus.log();
        bus.transfer(&[0x03, 0, 0, 0]).unwrap();
        bus.transfer(&[0x04, 0, 0, 0]).unwrap();

        let recorded = log.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0][0], 0x03);
    }

    #[test]
    fn test_null_bus_accepts_writes() {
        let mut bus = NullBus;
        assert!(bus.transfer(&[0xFF]).is_ok());
    }
}
