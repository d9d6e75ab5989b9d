//! Lumigrid daemon - LED grid animation playback and control.
//!
//! This binary wraps the lumigrid-core library: `serve` runs the hardware
//! owner process, the remaining subcommands are thin clients that talk to it
//! through the shared state directory.

mod serve;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lumigrid_core::animation::builtin::default_registry;
use lumigrid_core::animation::ParameterMap;
use lumigrid_core::config::{ChannelConfig, GridDefaults, RuntimeConfig};
use lumigrid_core::{ControlAction, ControlCommand, FileChannel};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lumigridd")]
#[command(about = "LED grid animation daemon")]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Shared state directory for the control/status files
    #[arg(long, default_value = ChannelConfig::DEFAULT_STATE_DIR)]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the hardware-owner process
    Serve(ServeArgs),

    /// Write one control command for a running daemon
    Send {
        #[command(subcommand)]
        action: SendAction,
    },

    /// Print the latest published status document
    Status,

    /// Render an animation offline and report what it produced
    Preview {
        name: String,

        /// Parameter overrides as a JSON object
        #[arg(long)]
        params: Option<String>,
    },

    /// Print an animation's metadata and parameter schema
    Describe { name: String },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Number of driver devices
    #[arg(long, default_value_t = GridDefaults::DEVICE_COUNT)]
    devices: usize,

    /// SPI bus number (hardware builds only)
    #[arg(long, default_value_t = 0)]
    bus: u8,

    /// Strips wired to each device
    #[arg(long, default_value_t = GridDefaults::STRIPS_PER_DEVICE)]
    strips_per_device: usize,

    /// LEDs per strip
    #[arg(long, default_value_t = GridDefaults::LEDS_PER_STRIP)]
    leds_per_strip: usize,

    /// Target frame rate
    #[arg(long, default_value_t = RuntimeConfig::TARGET_FPS)]
    fps: u32,

    /// Global multiplier applied to animation speed parameters
    #[arg(long, default_value_t = 1.0)]
    speed_scale: f64,

    /// Initial global brightness (0-255)
    #[arg(long, default_value_t = GridDefaults::BRIGHTNESS)]
    brightness: u8,
}

#[derive(Subcommand, Debug)]
enum SendAction {
    /// Start an animation
    Start {
        animation: String,

        /// Parameter overrides as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
    /// Stop the running animation
    Stop,
    /// Merge parameters into the running animation
    UpdateParameters {
        /// Parameter updates as a JSON object
        params: String,
    },
    /// Set global brightness (0-255)
    SetBrightness { value: u8 },
    /// Reload an animation's registration
    Reload { animation: String },
    /// Stop and blank the grid
    Clear,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match args.command {
        Command::Serve(serve_args) => serve::run(&args.state_dir, &serve_args),
        Command::Send { action } => send(&args.state_dir, action),
        Command::Status => status(&args.state_dir),
        Command::Preview { name, params } => preview(&name, params.as_deref()),
        Command::Describe { name } => describe(&name),
    }
}

fn parse_params(raw: Option<&str>) -> Result<ParameterMap> {
    match raw {
        Some(text) => {
            serde_json::from_str(text).context("--params must be a JSON object")
        }
        None => Ok(ParameterMap::new()),
    }
}

fn send(state_dir: &Path, action: SendAction) -> Result<()> {
    let action = match action {
        SendAction::Start { animation, params } => ControlAction::Start {
            animation,
            params: parse_params(params.as_deref())?,
        },
        SendAction::Stop => ControlAction::Stop,
        SendAction::UpdateParameters { params } => ControlAction::UpdateParameters {
            params: parse_params(Some(&params))?,
        },
        SendAction::SetBrightness { value } => ControlAction::SetBrightness { value },
        SendAction::Reload { animation } => ControlAction::Reload { animation },
        SendAction::Clear => ControlAction::Clear,
    };

    let channel = FileChannel::new(state_dir)?;
    let command = ControlCommand::new(action);
    channel.write_command(&command)?;
    info!("Sent command {}", command.command_id);
    Ok(())
}

fn status(state_dir: &Path) -> Result<()> {
    let channel = FileChannel::new(state_dir)?;
    match channel.read_status_value() {
        Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
        None => println!("No status published in {}", state_dir.display()),
    }
    Ok(())
}

fn preview(name: &str, params: Option<&str>) -> Result<()> {
    use lumigrid_core::runtime::{AnimationRuntime, RuntimeOptions};
    use lumigrid_core::{CapturingTransport, DeviceGeometry, Rgb};
    use std::sync::Arc;

    let transport = Arc::new(CapturingTransport::new(DeviceGeometry::default()));
    let runtime = AnimationRuntime::new(default_registry(), transport, RuntimeOptions::default());

    let result = runtime.preview(name, &parse_params(params)?);
    let lit = result.frame.iter().filter(|&&px| px != Rgb::BLACK).count();
    println!("{}: {} pixels, {} lit", name, result.frame.len(), lit);
    if let Some(error) = result.error {
        println!("error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

fn describe(name: &str) -> Result<()> {
    let mut registry = default_registry();
    if let Err(e) = registry.load(name) {
        info!("Load failed, describing registration anyway: {}", e);
    }
    let descriptor = registry.describe(name)?;
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}
