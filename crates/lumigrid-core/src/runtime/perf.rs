//! Frame-loop performance sampling.
//!
//! Diagnostics only: a bounded ring of per-frame timings, summarized into
//! the status document. Dropping old samples is the point, not a loss.

use crate::config::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Timings for one frame iteration, in seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfSample {
    pub generate: f64,
    pub send: f64,
    pub show: f64,
    pub process: f64,
    pub sleep: f64,
    pub frame: f64,
}

/// Aggregate view over the ring, serialized into status documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerfSummary {
    pub samples: usize,
    pub target_frame_ms: f64,
    pub avg_generate_ms: f64,
    pub avg_send_ms: f64,
    pub avg_show_ms: f64,
    pub avg_process_ms: f64,
    pub avg_sleep_ms: f64,
    pub avg_frame_ms: f64,
    pub last_generate_ms: f64,
    pub last_send_ms: f64,
    pub last_show_ms: f64,
    pub last_frame_ms: f64,
}

/// Bounded ring of recent frame samples.
#[derive(Debug)]
pub struct PerfRing {
    samples: VecDeque<PerfSample>,
    capacity: usize,
}

impl Default for PerfRing {
    fn default() -> Self {
        Self::with_capacity(RuntimeConfig::PERF_SAMPLE_CAPACITY)
    }
}

impl PerfRing {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: PerfSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn summary(&self, target_frame: Duration) -> PerfSummary {
        let count = self.samples.len().max(1) as f64;
        let avg = |pick: fn(&PerfSample) -> f64| {
            self.samples.iter().map(pick).sum::<f64>() / count * 1000.0
        };
        let last = self.samples.back().copied().unwrap_or_default();

        PerfSummary {
            samples: self.samples.len(),
            target_frame_ms: target_frame.as_secs_f64() * 1000.0,
            avg_generate_ms: avg(|s| s.generate),
            avg_send_ms: avg(|s| s.send),
            avg_show_ms: avg(|s| s.show),
            avg_process_ms: avg(|s| s.process),
            avg_sleep_ms: avg(|s| s.sleep),
            avg_frame_ms: avg(|s| s.frame),
            last_generate_ms: last.generate * 1000.0,
            last_send_ms: last.send * 1000.0,
            last_show_ms: last.show * 1000.0,
            last_frame_ms: last.frame * 1000.0,
        }
    }
}
