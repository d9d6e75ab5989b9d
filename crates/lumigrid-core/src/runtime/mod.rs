//! Playback runtime: scheduling, lifecycle, status reporting.

pub mod manager;
pub mod perf;

pub use manager::{AnimationRuntime, PreviewResult, RuntimeOptions};
pub use perf::{PerfRing, PerfSample, PerfSummary};

use serde::{Deserialize, Serialize};

/// Grid layout facts echoed into every status document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LedInfo {
    pub total_leds: usize,
    pub strip_count: usize,
    pub leds_per_strip: usize,
}

/// Point-in-time state of the runtime, published for other processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub current_animation: Option<String>,
    pub animation_hash: Option<String>,
    pub frame_count: u64,
    pub uptime_secs: f64,
    pub target_fps: f64,
    pub actual_fps: f64,
    pub speed_scale: f64,
    pub led_info: LedInfo,
    pub animation_info: Option<serde_json::Value>,
    pub animation_stats: serde_json::Value,
    pub performance: Option<PerfSummary>,
    /// Compressed copy of the most recent frame, omitted when idle.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub frame_payload: Option<String>,
    /// Encoding of `frame_payload`, so readers can reject formats they
    /// do not understand.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub frame_encoding: Option<String>,
    pub written_at: String,
}
