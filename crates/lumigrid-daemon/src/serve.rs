//! The hardware-owner loop: poll control commands, publish status.

use crate::ServeArgs;
use anyhow::{Context, Result};
use lumigrid_core::animation::builtin::default_registry;
use lumigrid_core::cancel::CancellationToken;
use lumigrid_core::config::ChannelConfig;
use lumigrid_core::runtime::{AnimationRuntime, RuntimeOptions};
use lumigrid_core::transport::BusOptions;
use lumigrid_core::{
    CommandBus, CommandGate, ControlAction, ControlCommand, DeviceGeometry, DeviceTransport,
    FileChannel, MultiDeviceTransport, PixelTransport,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub fn run(state_dir: &Path, args: &ServeArgs) -> Result<()> {
    let slice = DeviceGeometry::new(args.strips_per_device, args.leds_per_strip);
    let mut devices = Vec::with_capacity(args.devices);
    for index in 0..args.devices {
        let bus = open_bus(args.bus, index)?;
        devices.push(Arc::new(DeviceTransport::new(
            bus,
            slice,
            BusOptions::default(),
        )));
    }
    let transport: Arc<dyn PixelTransport> = Arc::new(MultiDeviceTransport::new(devices)?);
    let geometry = transport.geometry();

    if let Err(e) = transport.set_brightness(args.brightness) {
        warn!("Initial brightness push failed: {}", e);
    }

    let mut registry = default_registry();
    for name in registry.scan() {
        if let Err(e) = registry.load(&name) {
            warn!("Could not load animation '{}': {}", name, e);
        }
    }

    let runtime = AnimationRuntime::new(
        registry,
        transport.clone(),
        RuntimeOptions {
            target_fps: args.fps as f64,
            speed_scale: args.speed_scale,
        },
    );
    let channel = FileChannel::new(state_dir)?;

    let shutdown = CancellationToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install signal handler")?;

    info!(
        "Serving {} LEDs ({} strips x {}) across {} device(s), state in {}",
        geometry.total_leds(),
        geometry.strip_count(),
        geometry.leds_per_strip(),
        args.devices,
        state_dir.display()
    );

    let mut gate = CommandGate::new();
    let mut last_publish: Option<Instant> = None;
    loop {
        if let Some(command) = channel.read_command() {
            if gate.accept(&command) {
                dispatch(&runtime, transport.as_ref(), &command);
            }
        }

        let publish_due = last_publish
            .map(|at| at.elapsed() >= ChannelConfig::STATUS_PUBLISH_INTERVAL)
            .unwrap_or(true);
        if publish_due {
            if let Err(e) = channel.write_status(&runtime.status()) {
                warn!("Status publish failed: {}", e);
            }
            last_publish = Some(Instant::now());
        }

        if shutdown.wait(ChannelConfig::CONTROL_POLL_INTERVAL) {
            break;
        }
    }

    info!("Shutdown signal received, exiting");
    runtime.stop();
    let _ = channel.write_status(&runtime.status());
    Ok(())
}

fn dispatch(runtime: &AnimationRuntime, transport: &dyn PixelTransport, command: &ControlCommand) {
    info!("Command {}: {:?}", command.command_id, command.action);
    match &command.action {
        ControlAction::Start { animation, params } => {
            if let Err(e) = runtime.start(animation, params) {
                warn!("Start '{}' failed: {}", animation, e);
            }
        }
        ControlAction::Stop => runtime.stop(),
        ControlAction::UpdateParameters { params } => {
            if let Err(e) = runtime.update_parameters(params) {
                warn!("Parameter update failed: {}", e);
            }
        }
        ControlAction::SetBrightness { value } => {
            if let Err(e) = transport.set_brightness(*value) {
                warn!("Brightness change failed: {}", e);
            }
        }
        ControlAction::Reload { animation } => match runtime.reload(animation) {
            Ok(hash) => info!("Reloaded '{}' ({})", animation, &hash[..8]),
            Err(e) => warn!("Reload '{}' failed: {}", animation, e),
        },
        ControlAction::Clear => {
            runtime.stop();
            if let Err(e) = transport.clear() {
                warn!("Clear failed: {}", e);
            }
        }
    }
}

#[cfg(feature = "hardware")]
fn open_bus(bus: u8, cs: usize) -> Result<Box<dyn CommandBus>> {
    use lumigrid_core::transport::SpidevBus;
    let spi = SpidevBus::open_default(bus, cs as u8)
        .with_context(|| format!("failed to open /dev/spidev{}.{}", bus, cs))?;
    Ok(Box::new(spi))
}

#[cfg(not(feature = "hardware"))]
fn open_bus(_bus: u8, cs: usize) -> Result<Box<dyn CommandBus>> {
    info!("Hardware support not compiled in; device {} uses a no-op bus", cs);
    Ok(Box::new(lumigrid_core::NullBus))
}
