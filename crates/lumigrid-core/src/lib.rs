//! Lumigrid Core - Headless library for LED grid animation playback.
//!
//! This crate provides the animation registry, the playback runtime, the
//! device transport stack and the file-based control channel. It can be
//! used programmatically without the daemon binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use lumigrid_core::animation::builtin::default_registry;
//! use lumigrid_core::runtime::{AnimationRuntime, RuntimeOptions};
//! use lumigrid_core::transport::CapturingTransport;
//! use lumigrid_core::DeviceGeometry;
//! use std::sync::Arc;
//!
//! fn main() -> lumigrid_core::Result<()> {
//!     let transport = Arc::new(CapturingTransport::new(DeviceGeometry::default()));
//!     let runtime = AnimationRuntime::new(
//!         default_registry(),
//!         transport,
//!         RuntimeOptions::default(),
//!     );
//!
//!     runtime.start("rainbow", &Default::default())?;
//!     println!("running: {}", runtime.status().is_running);
//!     runtime.stop();
//!     Ok(())
//! }
//! ```

pub mod animation;
pub mod cancel;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod layout;
pub mod runtime;
pub mod transport;

// Re-export commonly used types
pub use animation::{
    Animation, AnimationDescriptor, AnimationMetadata, ParameterKind, ParameterMap,
    ParameterSchema, ParameterSpec, PlaybackMode, PluginRegistry,
};
pub use cancel::CancellationToken;
pub use channel::{CommandGate, ControlAction, ControlCommand, FileChannel};
pub use codec::{decode_frame, encode_frame};
pub use error::{LumigridError, Result};
pub use layout::{DeviceGeometry, Frame, Rgb};
pub use runtime::{AnimationRuntime, RuntimeOptions, StatusSnapshot};
pub use transport::{
    CapturingTransport, CommandBus, DeviceTransport, MemoryBus, MultiDeviceTransport, NullBus,
    PixelTransport, PreviewTransport,
};
