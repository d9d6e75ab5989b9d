//! Animation plugin contract and registry.
//!
//! A plugin is an opaque capability: it either produces a frame on demand
//! (frame-based) or owns its own thread and timing (self-paced). The mode is
//! a tag fixed at construction; the runtime reads it exactly once when
//! starting playback and never branches on concrete types afterwards.

pub mod builtin;
pub mod registry;
pub mod schema;

pub use registry::{AnimationDescriptor, PluginRegistry};
pub use schema::{ParameterKind, ParameterMap, ParameterSchema, ParameterSpec};

use crate::cancel::CancellationToken;
use crate::error::{LumigridError, Result};
use crate::layout::Frame;
use crate::transport::PixelTransport;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static metadata describing an animation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationMetadata {
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
}

/// Playback strategy tag, fixed per instance at start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// The runtime drives a scheduler thread calling [`Animation::generate_frame`].
    FrameBased,
    /// The plugin owns its own thread via [`Animation::run_self_paced`].
    SelfPaced,
}

/// The animation capability set.
///
/// Implementations must be `Send`: instances move onto a playback thread.
/// Exactly one of `generate_frame` / `run_self_paced` is exercised per
/// instance, selected by [`Animation::playback_mode`].
pub trait Animation: Send {
    /// Static metadata (name, author, version, description).
    fn metadata(&self) -> AnimationMetadata;

    /// Declared tunable parameters.
    fn parameter_schema(&self) -> ParameterSchema;

    /// Snapshot of the live parameter values.
    fn params(&self) -> ParameterMap;

    /// Merge new values into the live parameter map without interrupting
    /// playback.
    fn update_parameters(&mut self, updates: &ParameterMap) -> Result<()>;

    /// Which playback strategy drives this instance.
    fn playback_mode(&self) -> PlaybackMode {
        PlaybackMode::FrameBased
    }

    /// Lifecycle hook invoked before the first frame.
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Lifecycle hook invoked when playback stops.
    fn on_stop(&mut self) {}

    /// Lifecycle hook invoked when the instance is being destroyed.
    fn cleanup(&mut self) {}

    /// Produce one frame (frame-based mode).
    ///
    /// `elapsed` is the time since `on_start`; `frame_count` the number of
    /// frames rendered so far. The returned frame is normalized by the
    /// runtime, so any length is acceptable.
    fn generate_frame(&mut self, elapsed: Duration, frame_count: u64) -> Result<Frame> {
        let _ = (elapsed, frame_count);
        Err(LumigridError::plugin(
            self.metadata().name,
            "animation is not frame-based",
        ))
    }

    /// Run the plugin's own playback loop (self-paced mode).
    ///
    /// The implementation owns its timing but must observe `token` at safe
    /// points and return promptly once it is cancelled.
    fn run_self_paced(
        &mut self,
        transport: &dyn PixelTransport,
        token: &CancellationToken,
    ) -> Result<()> {
        let _ = (transport, token);
        Err(LumigridError::plugin(
            self.metadata().name,
            "animation is not self-paced",
        ))
    }

    /// Optional self-reported runtime statistics for status documents.
    fn runtime_stats(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }
}
