//! Animation lifecycle and frame scheduling.
//!
//! At most one animation is active at a time. Frame-based animations run on
//! a runtime-owned scheduler thread that paces them against the target
//! frame rate; self-paced animations get their own thread, which owns the
//! instance for the whole run. Readers never wait on a held instance:
//! `status` falls back to a snapshot captured at start, and live parameter
//! updates give up after a bounded wait. Either way the playback thread is
//! stopped through a cancellation token and a bounded join, so a
//! misbehaving plugin can delay shutdown but never wedge it.

use super::perf::{PerfRing, PerfSample};
use super::{LedInfo, StatusSnapshot};
use crate::animation::schema::{param_f64, ParameterMap};
use crate::animation::{Animation, PlaybackMode, PluginRegistry};
use crate::animation::registry::AnimationDescriptor;
use crate::cancel::CancellationToken;
use crate::codec::{encode_frame, FRAME_ENCODING_NAME};
use crate::config::RuntimeConfig;
use crate::error::{LumigridError, Result};
use crate::layout::{DeviceGeometry, Frame, Rgb};
use crate::transport::{CapturingTransport, PixelTransport};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Runtime tunables fixed at construction.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub target_fps: f64,
    /// Global multiplier applied to a plugin's `speed` parameter at start.
    pub speed_scale: f64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            target_fps: RuntimeConfig::TARGET_FPS as f64,
            speed_scale: 1.0,
        }
    }
}

/// State shared between the runtime and the playback thread.
struct PlaybackShared {
    frame_buffer: Mutex<Frame>,
    frame_count: AtomicU64,
    fps_stamps: Mutex<VecDeque<Instant>>,
    perf: Mutex<PerfRing>,
    last_error: Mutex<Option<String>>,
}

impl PlaybackShared {
    fn new() -> Self {
        Self {
            frame_buffer: Mutex::new(Frame::new()),
            frame_count: AtomicU64::new(0),
            fps_stamps: Mutex::new(VecDeque::new()),
            perf: Mutex::new(PerfRing::default()),
            last_error: Mutex::new(None),
        }
    }
}

struct ActiveAnimation {
    name: String,
    content_hash: String,
    mode: PlaybackMode,
    started_at: Instant,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    animation: Arc<Mutex<Box<dyn Animation>>>,
    /// Metadata, mode and params as of start, for when the instance is held.
    info_snapshot: Value,
    shared: Arc<PlaybackShared>,
}

/// Result of an offline preview render.
#[derive(Debug, Clone)]
pub struct PreviewResult {
    pub frame: Frame,
    pub error: Option<String>,
}

/// Owns the registry, the transport and the single active animation.
pub struct AnimationRuntime {
    registry: Mutex<PluginRegistry>,
    transport: Arc<dyn PixelTransport>,
    options: RuntimeOptions,
    active: Mutex<Option<ActiveAnimation>>,
}

impl AnimationRuntime {
    pub fn new(
        registry: PluginRegistry,
        transport: Arc<dyn PixelTransport>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            registry: Mutex::new(registry),
            transport,
            options,
            active: Mutex::new(None),
        }
    }

    pub fn scan(&self) -> Vec<String> {
        self.registry.lock().unwrap().scan()
    }

    /// (Re)load an animation's registration, returning its content hash.
    /// A running instance built from the old registration keeps running.
    pub fn reload(&self, name: &str) -> Result<String> {
        self.registry.lock().unwrap().load(name)
    }

    pub fn describe(&self, name: &str) -> Result<AnimationDescriptor> {
        self.registry.lock().unwrap().describe(name)
    }

    /// Start an animation, stopping whichever one is already running first.
    pub fn start(&self, name: &str, params: &ParameterMap) -> Result<()> {
        self.stop();

        let (mut instance, content_hash) = {
            let mut registry = self.registry.lock().unwrap();
            if !registry.is_loaded(name) {
                registry.load(name)?;
            }
            let hash = registry
                .content_hash(name)
                .map(str::to_string)
                .unwrap_or_default();
            let instance = registry.instantiate(name, &self.transport.geometry(), params)?;
            (instance, hash)
        };

        self.apply_speed_scale(instance.as_mut());

        // Fresh geometry push before the first frame; a device that missed
        // it recovers via the periodic refresh, so failure is not fatal.
        if let Err(e) = self.transport.configure() {
            warn!("Pre-start configure failed: {}", e);
        }

        instance.on_start()?;

        let mode = instance.playback_mode();
        let info_snapshot = json!({
            "metadata": instance.metadata(),
            "mode": mode,
            "params": instance.params(),
        });
        let token = CancellationToken::new();
        let animation = Arc::new(Mutex::new(instance));
        let shared = Arc::new(PlaybackShared::new());

        let handle = {
            let animation = animation.clone();
            let shared = shared.clone();
            let transport = self.transport.clone();
            let token = token.clone();
            let target_fps = self.options.target_fps;
            let builder = thread::Builder::new().name(format!("play-{}", name));
            let thread_name = name.to_string();
            builder
                .spawn(move || match mode {
                    PlaybackMode::FrameBased => {
                        frame_loop(&animation, &shared, transport.as_ref(), &token, target_fps)
                    }
                    PlaybackMode::SelfPaced => {
                        // The run owns the instance until it returns; readers
                        // go through `info_snapshot` or `try_lock` instead.
                        let result = animation
                            .lock()
                            .unwrap()
                            .run_self_paced(transport.as_ref(), &token);
                        if let Err(e) = result {
                            warn!("Self-paced animation '{}' exited: {}", thread_name, e);
                            *shared.last_error.lock().unwrap() = Some(e.to_string());
                        }
                    }
                })
                .map_err(|e| LumigridError::Config {
                    message: format!("failed to spawn playback thread: {}", e),
                })?
        };

        info!("Started animation '{}' ({:?})", name, mode);
        *self.active.lock().unwrap() = Some(ActiveAnimation {
            name: name.to_string(),
            content_hash,
            mode,
            started_at: Instant::now(),
            token,
            handle: Some(handle),
            animation,
            info_snapshot,
            shared,
        });
        Ok(())
    }

    /// Stop the active animation. Idempotent; a second call is a no-op.
    pub fn stop(&self) {
        let Some(mut active) = self.active.lock().unwrap().take() else {
            return;
        };

        active.token.cancel();
        if let Some(handle) = active.handle.take() {
            join_bounded(handle, RuntimeConfig::STOP_JOIN_TIMEOUT, &active.name);
        }

        // The joined thread has released the instance; only a detached,
        // still-running run can hold it here.
        match active.animation.try_lock() {
            Ok(mut animation) => {
                animation.on_stop();
                animation.cleanup();
            }
            Err(_) => warn!(
                "Animation '{}' still owns its instance; skipping stop hooks",
                active.name
            ),
        }
        active.shared.frame_buffer.lock().unwrap().clear();

        if let Err(e) = self.transport.clear() {
            warn!("Hardware clear on stop failed: {}", e);
        }
        info!("Stopped animation '{}'", active.name);
    }

    /// Merge parameter updates into the running animation.
    ///
    /// A frame-based animation releases its instance between frames, so the
    /// bounded acquire succeeds almost immediately. A self-paced animation
    /// owns its instance for the whole run and cannot take live updates;
    /// the acquire times out and the caller gets an error.
    pub fn update_parameters(&self, updates: &ParameterMap) -> Result<()> {
        let guard = self.active.lock().unwrap();
        let active = guard.as_ref().ok_or(LumigridError::NoActiveAnimation)?;
        let deadline = Instant::now() + RuntimeConfig::PARAM_LOCK_TIMEOUT;
        loop {
            if let Ok(mut animation) = active.animation.try_lock() {
                let applied = animation.update_parameters(updates);
                return applied;
            }
            if Instant::now() >= deadline {
                return Err(LumigridError::plugin(
                    &active.name,
                    "instance is busy; parameters were not applied",
                ));
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|a| a.handle.as_ref())
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn status(&self) -> StatusSnapshot {
        let geometry = self.transport.geometry();
        let led_info = LedInfo {
            total_leds: geometry.total_leds(),
            strip_count: geometry.strip_count(),
            leds_per_strip: geometry.leds_per_strip(),
        };
        let written_at = chrono::Utc::now().to_rfc3339();

        let guard = self.active.lock().unwrap();
        let Some(active) = guard.as_ref() else {
            return StatusSnapshot {
                is_running: false,
                current_animation: None,
                animation_hash: None,
                frame_count: 0,
                uptime_secs: 0.0,
                target_fps: self.options.target_fps,
                actual_fps: 0.0,
                speed_scale: self.options.speed_scale,
                led_info,
                animation_info: None,
                animation_stats: Value::Object(serde_json::Map::new()),
                performance: None,
                frame_payload: None,
                frame_encoding: None,
                written_at,
            };
        };

        let is_running = active
            .handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);
        let frame_count = active.shared.frame_count.load(Ordering::Relaxed);
        let actual_fps = measured_fps(&active.shared.fps_stamps.lock().unwrap());

        let (animation_info, mut animation_stats) = match active.animation.try_lock() {
            Ok(animation) => {
                let info = json!({
                    "metadata": animation.metadata(),
                    "mode": active.mode,
                    "params": animation.params(),
                });
                (Some(info), Value::Object(animation.runtime_stats()))
            }
            // A self-paced run owns the instance; report what start captured.
            Err(_) => (
                Some(active.info_snapshot.clone()),
                Value::Object(serde_json::Map::new()),
            ),
        };
        if let Some(error) = active.shared.last_error.lock().unwrap().clone() {
            if let Value::Object(map) = &mut animation_stats {
                map.insert("error".into(), Value::String(error));
            }
        }

        let frame_payload = {
            let buffer = active.shared.frame_buffer.lock().unwrap();
            let encoded = encode_frame(&buffer);
            (!encoded.is_empty()).then_some(encoded)
        };
        let target_frame = Duration::from_secs_f64(1.0 / self.options.target_fps);
        let performance = Some(active.shared.perf.lock().unwrap().summary(target_frame));

        StatusSnapshot {
            is_running,
            current_animation: Some(active.name.clone()),
            animation_hash: Some(active.content_hash.clone()),
            frame_count,
            uptime_secs: active.started_at.elapsed().as_secs_f64(),
            target_fps: self.options.target_fps,
            actual_fps,
            speed_scale: self.options.speed_scale,
            led_info,
            animation_info,
            animation_stats,
            performance,
            frame_encoding: frame_payload
                .is_some()
                .then(|| FRAME_ENCODING_NAME.to_string()),
            frame_payload,
            written_at,
        }
    }

    /// Render an animation offline against a stand-in transport. Safe to
    /// call while another animation is live; never touches hardware.
    ///
    /// Failures come back as a dim gray frame plus an error message rather
    /// than an `Err`, so callers always have something to display.
    pub fn preview(&self, name: &str, params: &ParameterMap) -> PreviewResult {
        let geometry = self.transport.geometry();
        match self.preview_frame(name, params, geometry) {
            Ok(frame) => PreviewResult { frame, error: None },
            Err(e) => PreviewResult {
                frame: vec![Rgb(32, 32, 32); geometry.total_leds()],
                error: Some(e.to_string()),
            },
        }
    }

    fn preview_frame(
        &self,
        name: &str,
        params: &ParameterMap,
        geometry: DeviceGeometry,
    ) -> Result<Frame> {
        let mut instance = {
            let mut registry = self.registry.lock().unwrap();
            if !registry.is_loaded(name) {
                registry.load(name)?;
            }
            registry.instantiate(name, &geometry, params)?
        };

        match instance.playback_mode() {
            PlaybackMode::FrameBased => {
                instance.on_start()?;
                let period = Duration::from_secs_f64(1.0 / self.options.target_fps);
                let mut last = geometry.blank_frame();
                for step in 0..RuntimeConfig::PREVIEW_STEPS {
                    last = instance.generate_frame(period * step as u32, step as u64)?;
                }
                instance.on_stop();
                instance.cleanup();
                Ok(geometry.normalize_frame(last))
            }
            PlaybackMode::SelfPaced => {
                let transport = Arc::new(CapturingTransport::new(geometry));
                let token = CancellationToken::new();
                let worker_transport = transport.clone();
                let worker_token = token.clone();
                let handle = thread::Builder::new()
                    .name(format!("preview-{}", name))
                    .spawn(move || {
                        let mut instance = instance;
                        if let Err(e) = instance.on_start() {
                            debug!("Preview on_start failed: {}", e);
                            return;
                        }
                        if let Err(e) =
                            instance.run_self_paced(worker_transport.as_ref(), &worker_token)
                        {
                            debug!("Preview run failed: {}", e);
                        }
                        instance.on_stop();
                        instance.cleanup();
                    })
                    .map_err(|e| LumigridError::Config {
                        message: format!("failed to spawn preview thread: {}", e),
                    })?;

                thread::sleep(RuntimeConfig::PREVIEW_DEADLINE);
                // Captured before cancellation: the plugin's exit path may
                // blank the stand-in transport.
                let captured = transport.last_frame();
                token.cancel();
                join_bounded(handle, RuntimeConfig::STOP_JOIN_TIMEOUT, name);

                match captured {
                    Some(frame) => Ok(geometry.normalize_frame(frame)),
                    None => Err(LumigridError::plugin(
                        name,
                        "produced no frames within the preview deadline",
                    )),
                }
            }
        }
    }

    fn apply_speed_scale(&self, instance: &mut dyn Animation) {
        if (self.options.speed_scale - 1.0).abs() < f64::EPSILON {
            return;
        }
        let Some(base) = param_f64(&instance.params(), "speed") else {
            return;
        };
        let scaled = base * self.options.speed_scale;
        if scaled <= 0.0 {
            warn!(
                "Speed scale {} yields non-positive speed; keeping base {}",
                self.options.speed_scale, base
            );
            return;
        }
        let mut update = ParameterMap::new();
        update.insert("speed".into(), Value::from(scaled));
        if let Err(e) = instance.update_parameters(&update) {
            warn!("Could not apply speed scale: {}", e);
        }
    }
}

impl Drop for AnimationRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Join a playback thread, giving up after `timeout` so shutdown cannot
/// wedge on a stuck plugin. An unjoined thread is detached and logged.
fn join_bounded(handle: JoinHandle<()>, timeout: Duration, name: &str) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(
                "Playback thread for '{}' did not stop within {:?}; detaching",
                name, timeout
            );
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        warn!("Playback thread for '{}' panicked", name);
    }
}

/// The frame-based scheduler loop.
///
/// Recoverable generation errors (plugin raised, transport hiccup) are
/// logged and skipped with a short backoff; anything else ends playback
/// with the failure left in `last_error`. Send and show errors are
/// best-effort since the next frame retries naturally.
fn frame_loop(
    animation: &Mutex<Box<dyn Animation>>,
    shared: &PlaybackShared,
    transport: &dyn PixelTransport,
    token: &CancellationToken,
    target_fps: f64,
) {
    let geometry = transport.geometry();
    let period = Duration::from_secs_f64(1.0 / target_fps);
    let started = Instant::now();

    while !token.is_cancelled() {
        let frame_start = Instant::now();
        let count = shared.frame_count.load(Ordering::Relaxed);

        let generated = animation
            .lock()
            .unwrap()
            .generate_frame(started.elapsed(), count);
        let generate = frame_start.elapsed().as_secs_f64();

        let frame = match generated {
            Ok(frame) => geometry.normalize_frame(frame),
            Err(e) => {
                *shared.last_error.lock().unwrap() = Some(e.to_string());
                if !e.is_frame_recoverable() {
                    warn!("Frame {} failed: {}; ending playback", count, e);
                    break;
                }
                warn!("Frame {} failed: {}", count, e);
                if token.wait(RuntimeConfig::FRAME_ERROR_BACKOFF) {
                    break;
                }
                continue;
            }
        };
        *shared.last_error.lock().unwrap() = None;
        *shared.frame_buffer.lock().unwrap() = frame.clone();

        let send_start = Instant::now();
        if let Err(e) = transport.set_all_pixels(&frame) {
            debug!("Frame {} send failed: {}", count, e);
        }
        let send = send_start.elapsed().as_secs_f64();

        let show_start = Instant::now();
        if !transport.commits_inline() {
            if let Err(e) = transport.show() {
                debug!("Frame {} show failed: {}", count, e);
            }
        }
        let show = show_start.elapsed().as_secs_f64();

        shared.frame_count.fetch_add(1, Ordering::Relaxed);
        {
            let mut stamps = shared.fps_stamps.lock().unwrap();
            let now = Instant::now();
            stamps.push_back(now);
            while let Some(front) = stamps.front() {
                if now.duration_since(*front) > RuntimeConfig::FPS_WINDOW {
                    stamps.pop_front();
                } else {
                    break;
                }
            }
        }

        let process = frame_start.elapsed();
        let sleep = period.saturating_sub(process);
        if !sleep.is_zero() && token.wait(sleep) {
            break;
        }

        shared.perf.lock().unwrap().push(PerfSample {
            generate,
            send,
            show,
            process: process.as_secs_f64(),
            sleep: sleep.as_secs_f64(),
            frame: frame_start.elapsed().as_secs_f64(),
        });
    }
}

/// Frames per second over the retained stamp window.
fn measured_fps(stamps: &VecDeque<Instant>) -> f64 {
    if stamps.len() < 2 {
        return 0.0;
    }
    let span = stamps
        .back()
        .and_then(|last| stamps.front().map(|first| last.duration_since(*first)))
        .unwrap_or_default();
    if span.is_zero() {
        return 0.0;
    }
    (stamps.len() - 1) as f64 / span.as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::builtin::default_registry;
    use crate::animation::schema::ParameterSchema;
    use crate::animation::AnimationMetadata;

    fn capture_runtime(options: RuntimeOptions) -> (AnimationRuntime, Arc<CapturingTransport>) {
        let transport = Arc::new(CapturingTransport::new(DeviceGeometry::new(16, 140)));
        let runtime = AnimationRuntime::new(default_registry(), transport.clone(), options);
        (runtime, transport)
    }

    #[test]
    fn test_frame_loop_paces_to_target_fps() {
        let (runtime, transport) = capture_runtime(RuntimeOptions::default());
        runtime.start("solid", &ParameterMap::new()).unwrap();
        thread::sleep(Duration::from_secs(1));

        let status = runtime.status();
        assert!(status.is_running);
        assert_eq!(status.current_animation.as_deref(), Some("solid"));
        // ~40 frames after ~1 s, with generous scheduling slack.
        assert!(
            (25..=55).contains(&status.frame_count),
            "frame_count = {}",
            status.frame_count
        );
        assert!(
            status.actual_fps > 25.0 && status.actual_fps < 55.0,
            "actual_fps = {}",
            status.actual_fps
        );
        assert!(status.frame_payload.is_some());
        assert_eq!(status.frame_encoding.as_deref(), Some(FRAME_ENCODING_NAME));
        assert_eq!(status.led_info.total_leds, 2240);

        runtime.stop();
        assert!(!runtime.is_running());
        assert!(transport.frames_seen() >= 25);
        // Stop issues a hardware clear.
        assert_eq!(
            transport.last_frame(),
            Some(DeviceGeometry::new(16, 140).blank_frame())
        );
    }

    #[test]
    fn test_double_stop_is_idempotent() {
        let (runtime, _transport) = capture_runtime(RuntimeOptions::default());
        runtime.start("solid", &ParameterMap::new()).unwrap();
        runtime.stop();
        runtime.stop();
        assert!(!runtime.status().is_running);
    }

    #[test]
    fn test_start_unknown_animation_fails() {
        let (runtime, _transport) = capture_runtime(RuntimeOptions::default());
        assert!(matches!(
            runtime.start("missing", &ParameterMap::new()),
            Err(LumigridError::PluginNotFound(_))
        ));
    }

    #[test]
    fn test_update_parameters_without_active_fails() {
        let (runtime, _transport) = capture_runtime(RuntimeOptions::default());
        assert!(matches!(
            runtime.update_parameters(&ParameterMap::new()),
            Err(LumigridError::NoActiveAnimation)
        ));
    }

    #[test]
    fn test_update_parameters_applies_live() {
        let (runtime, transport) = capture_runtime(RuntimeOptions::default());
        runtime.start("solid", &ParameterMap::new()).unwrap();
        thread::sleep(Duration::from_millis(100));

        let mut updates = ParameterMap::new();
        updates.insert("red".into(), Value::from(0));
        updates.insert("green".into(), Value::from(0));
        updates.insert("blue".into(), Value::from(9));
        runtime.update_parameters(&updates).unwrap();
        thread::sleep(Duration::from_millis(200));

        let frame = transport.last_frame().unwrap();
        assert_eq!(frame[0], Rgb(0, 0, 9));
        runtime.stop();
    }

    /// Records lifecycle hook calls into a shared log.
    struct HookProbe {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl HookProbe {
        fn push(&self, event: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.label, event));
        }
    }

    impl Animation for HookProbe {
        fn metadata(&self) -> AnimationMetadata {
            AnimationMetadata {
                name: self.label.into(),
                description: String::new(),
                author: "tests".into(),
                version: "0.0.0".into(),
            }
        }

        fn parameter_schema(&self) -> ParameterSchema {
            ParameterSchema::new()
        }

        fn params(&self) -> ParameterMap {
            ParameterMap::new()
        }

        fn update_parameters(&mut self, _updates: &ParameterMap) -> Result<()> {
            Ok(())
        }

        fn on_start(&mut self) -> Result<()> {
            self.push("start");
            Ok(())
        }

        fn on_stop(&mut self) {
            self.push("stop");
        }

        fn cleanup(&mut self) {
            self.push("cleanup");
        }

        fn generate_frame(&mut self, _elapsed: Duration, _count: u64) -> Result<Frame> {
            Ok(Frame::new())
        }
    }

    #[test]
    fn test_start_stops_previous_before_new_hooks() {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut registry = PluginRegistry::new(["first".to_string(), "second".to_string()]);
        for label in ["first", "second"] {
            let log = log.clone();
            registry.register(
                label,
                "0.0.0",
                None,
                Box::new(move |_, _| {
                    Ok(Box::new(HookProbe {
                        label,
                        log: log.clone(),
                    }) as Box<dyn Animation>)
                }),
            );
        }

        let transport = Arc::new(CapturingTransport::new(DeviceGeometry::new(2, 4)));
        let runtime = AnimationRuntime::new(registry, transport, RuntimeOptions::default());

        runtime.start("first", &ParameterMap::new()).unwrap();
        thread::sleep(Duration::from_millis(50));
        runtime.start("second", &ParameterMap::new()).unwrap();
        thread::sleep(Duration::from_millis(50));
        runtime.stop();

        let events = log.lock().unwrap().clone();
        let events: Vec<&str> = events.iter().map(String::as_str).collect();
        let second_start = events
            .iter()
            .position(|e| *e == "second:start")
            .expect("second animation should start");
        let slots_before = &events[..second_start];
        assert!(slots_before.contains(&"first:stop"));
        assert!(slots_before.contains(&"first:cleanup"));
    }

    #[test]
    fn test_speed_scale_rescales_speed_parameter() {
        let (runtime, _transport) = capture_runtime(RuntimeOptions {
            target_fps: 40.0,
            speed_scale: 2.0,
        });
        runtime.start("rainbow", &ParameterMap::new()).unwrap();
        let status = runtime.status();
        let info = status.animation_info.unwrap();
        assert_eq!(info["params"]["speed"], json!(2.0));
        runtime.stop();
    }

    #[test]
    fn test_nonpositive_scaled_speed_keeps_base() {
        let (runtime, _transport) = capture_runtime(RuntimeOptions {
            target_fps: 40.0,
            speed_scale: 0.0,
        });
        runtime.start("rainbow", &ParameterMap::new()).unwrap();
        let status = runtime.status();
        let info = status.animation_info.unwrap();
        assert_eq!(info["params"]["speed"], json!(1.0));
        runtime.stop();
    }

    #[test]
    fn test_preview_frame_based_is_side_effect_free() {
        let (runtime, transport) = capture_runtime(RuntimeOptions::default());
        let preview = runtime.preview("rainbow", &ParameterMap::new());
        assert!(preview.error.is_none());
        assert_eq!(preview.frame.len(), 2240);
        assert_eq!(transport.frames_seen(), 0);
    }

    #[test]
    fn test_preview_self_paced_captures_a_frame() {
        let (runtime, transport) = capture_runtime(RuntimeOptions::default());
        let mut params = ParameterMap::new();
        params.insert("hold_ms".into(), Value::from(20));
        let preview = runtime.preview("strip_test", &params);
        assert!(preview.error.is_none(), "{:?}", preview.error);
        assert_eq!(preview.frame.len(), 2240);
        // Something actually lit, not the fallback gray.
        assert!(preview.frame.iter().any(|&px| px != Rgb::BLACK));
        assert_eq!(transport.frames_seen(), 0);
    }

    #[test]
    fn test_status_stays_responsive_during_self_paced_run() {
        let (runtime, _transport) = capture_runtime(RuntimeOptions::default());
        let runtime = Arc::new(runtime);
        let mut params = ParameterMap::new();
        params.insert("hold_ms".into(), Value::from(50));
        runtime.start("strip_test", &params).unwrap();
        thread::sleep(Duration::from_millis(100));

        let (tx, rx) = std::sync::mpsc::channel();
        let reader = runtime.clone();
        thread::spawn(move || {
            let _ = tx.send(reader.status());
        });
        let status = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("status must not block on a running self-paced animation");
        assert!(status.is_running);
        assert_eq!(status.current_animation.as_deref(), Some("strip_test"));
        let info = status.animation_info.expect("start-time snapshot");
        assert_eq!(info["metadata"]["name"], json!("strip_test"));
        assert_eq!(info["mode"], json!("self_paced"));

        runtime.stop();
        assert!(!runtime.is_running());
    }

    #[test]
    fn test_self_paced_rejects_live_updates_within_bound() {
        let (runtime, _transport) = capture_runtime(RuntimeOptions::default());
        let mut params = ParameterMap::new();
        params.insert("hold_ms".into(), Value::from(50));
        runtime.start("strip_test", &params).unwrap();
        thread::sleep(Duration::from_millis(50));

        let mut updates = ParameterMap::new();
        updates.insert("hold_ms".into(), Value::from(10));
        let begun = Instant::now();
        assert!(runtime.update_parameters(&updates).is_err());
        assert!(begun.elapsed() < Duration::from_secs(1));
        runtime.stop();
    }

    /// Fails every frame, fatally or transiently.
    struct FlakyFrames {
        fatal: bool,
    }

    impl Animation for FlakyFrames {
        fn metadata(&self) -> AnimationMetadata {
            AnimationMetadata {
                name: "flaky".into(),
                description: String::new(),
                author: "tests".into(),
                version: "0.0.0".into(),
            }
        }

        fn parameter_schema(&self) -> ParameterSchema {
            ParameterSchema::new()
        }

        fn params(&self) -> ParameterMap {
            ParameterMap::new()
        }

        fn update_parameters(&mut self, _updates: &ParameterMap) -> Result<()> {
            Ok(())
        }

        fn generate_frame(&mut self, _elapsed: Duration, _count: u64) -> Result<Frame> {
            if self.fatal {
                Err(LumigridError::Config {
                    message: "corrupt state".into(),
                })
            } else {
                Err(LumigridError::plugin("flaky", "transient failure"))
            }
        }
    }

    #[test]
    fn test_unrecoverable_frame_error_ends_playback() {
        let mut registry = PluginRegistry::new(["fatal".to_string(), "transient".to_string()]);
        registry.register(
            "fatal",
            "0.0.0",
            None,
            Box::new(|_, _| Ok(Box::new(FlakyFrames { fatal: true }) as Box<dyn Animation>)),
        );
        registry.register(
            "transient",
            "0.0.0",
            None,
            Box::new(|_, _| Ok(Box::new(FlakyFrames { fatal: false }) as Box<dyn Animation>)),
        );
        let transport = Arc::new(CapturingTransport::new(DeviceGeometry::new(2, 4)));
        let runtime = AnimationRuntime::new(registry, transport, RuntimeOptions::default());

        runtime.start("fatal", &ParameterMap::new()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(1);
        while runtime.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!runtime.is_running());
        let status = runtime.status();
        let error = status.animation_stats["error"].as_str().unwrap_or_default();
        assert!(error.contains("corrupt state"), "error = {:?}", error);
        runtime.stop();

        // A plugin-raised error only backs off; playback keeps going.
        runtime.start("transient", &ParameterMap::new()).unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(runtime.is_running());
        runtime.stop();
    }

    #[test]
    fn test_preview_unknown_name_yields_fallback() {
        let (runtime, _transport) = capture_runtime(RuntimeOptions::default());
        let preview = runtime.preview("missing", &ParameterMap::new());
        assert!(preview.error.is_some());
        assert_eq!(preview.frame, vec![Rgb(32, 32, 32); 2240]);
    }
}
