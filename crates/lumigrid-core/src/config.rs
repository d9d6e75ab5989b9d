//! Centralized configuration constants for the lumigrid stack.
//!
//! Groups the tunables for grid geometry, bus transfers, the runtime
//! scheduler, and the file channel so every layer stays in sync. None of
//! these appear as inline literals in logic code.

use std::time::Duration;

/// Default grid layout shared by the whole stack.
pub struct GridDefaults;

impl GridDefaults {
    /// 2 driver devices x 8 strips each.
    pub const STRIP_COUNT: usize = 16;
    pub const LEDS_PER_STRIP: usize = 140;
    pub const STRIPS_PER_DEVICE: usize = 8;
    pub const DEVICE_COUNT: usize = 2;
    pub const BRIGHTNESS: u8 = 50;
}

/// Command bus tuning.
pub struct BusConfig;

impl BusConfig {
    /// Upper bound for a single bus transaction, in bytes.
    pub const MAX_TRANSFER: usize = 4096;
    /// Outbound buffers are zero-padded to this boundary.
    pub const WORD_ALIGN: usize = 4;
    /// SET_RANGE carries its pixel count in one byte.
    pub const MAX_RANGE_PIXELS: usize = 255;
    /// How often geometry and brightness are unconditionally re-pushed so a
    /// silently reset device recovers without an explicit error signal.
    pub const CONFIG_REFRESH_INTERVAL: Duration = Duration::from_secs(1);
    /// Per-frame bound on the multi-device fan-out wait.
    pub const FANOUT_TIMEOUT: Duration = Duration::from_secs(1);
    /// Default SPI bus settings (hardware builds).
    pub const SPI_SPEED_HZ: u32 = 8_000_000;
    pub const SPI_MODE: u8 = 3;
}

/// Animation runtime tuning.
pub struct RuntimeConfig;

impl RuntimeConfig {
    pub const TARGET_FPS: u32 = 40;
    /// Rolling window used for measured-FPS calculation.
    pub const FPS_WINDOW: Duration = Duration::from_secs(5);
    /// Backoff after a plugin raises during frame generation.
    pub const FRAME_ERROR_BACKOFF: Duration = Duration::from_millis(50);
    /// Bounded join when stopping the playback thread.
    pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);
    /// Bounded wait for the animation instance when applying live updates.
    pub const PARAM_LOCK_TIMEOUT: Duration = Duration::from_millis(100);
    /// Retained per-frame timing samples.
    pub const PERF_SAMPLE_CAPACITY: usize = 300;
    /// Frames captured when previewing a self-paced animation.
    pub const PREVIEW_STEPS: usize = 5;
    /// Deadline for a self-paced preview run.
    pub const PREVIEW_DEADLINE: Duration = Duration::from_millis(250);
}

/// File-based control channel tuning.
pub struct ChannelConfig;

impl ChannelConfig {
    pub const CONTROL_FILE: &'static str = "control.json";
    pub const STATUS_FILE: &'static str = "status.json";
    pub const DEFAULT_STATE_DIR: &'static str = "run_state";
    /// How often the owner process checks for new control commands.
    pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(200);
    /// How often the owner process publishes status, independent of polling.
    pub const STATUS_PUBLISH_INTERVAL: Duration = Duration::from_millis(500);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        assert_eq!(
            GridDefaults::STRIP_COUNT,
            GridDefaults::DEVICE_COUNT * GridDefaults::STRIPS_PER_DEVICE
        );
        assert!(BusConfig::MAX_TRANSFER % BusConfig::WORD_ALIGN == 0);
        assert!(ChannelConfig::STATUS_PUBLISH_INTERVAL > Duration::ZERO);
    }
}
