mod domain;
mod infrastructure;
mod presentation;

use crate::domain::error::ClientError;
use crate::domain::settings::{MatchPolicy, Settings, SettingsService};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::replay::ReplayTransport;
use crate::infrastructure::bluetooth::transport::Transport;
use crate::infrastructure::bluetooth::{ClientConfig, ImuClient};
use crate::infrastructure::logging;
use crate::presentation::render::{ConsoleRenderer, OutputMode};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Stream IMU telemetry from an Arduino Nano 33 BLE peripheral.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Print comma-separated values, one line per sample
    #[arg(long)]
    csv: bool,

    /// Consume samples without printing them
    #[arg(long)]
    quiet: bool,

    /// Settings file to use instead of the per-user one
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Discovery scan duration in seconds
    #[arg(long, value_name = "SECS")]
    scan_timeout: Option<u64>,

    /// Connect to this address (AA:BB:CC:DD:EE:FF) instead of matching by name
    #[arg(long, value_parser = protocol::parse_address)]
    address: Option<u64>,

    /// Play back a capture of raw 28-byte frames instead of using Bluetooth
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if self.csv {
            settings.csv_output = true;
        }
        if self.quiet {
            settings.print_data = false;
        }
        if let Some(secs) = self.scan_timeout {
            settings.scan_timeout_secs = secs;
        }
        if let Some(address) = self.address {
            settings.match_policy = MatchPolicy::Address(address);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings_service = match &args.config {
        Some(path) => SettingsService::from_path(path)?,
        None => SettingsService::new()?,
    };
    let mut settings = settings_service.get().clone();
    args.apply(&mut settings);

    let _logging_guard = logging::init_logger(&settings.log_settings)?;
    info!(
        "Nano IMU BLE client, settings from {}",
        settings_service.path().display()
    );
    if let Some(e) = settings_service.load_error() {
        warn!(
            "Ignoring unreadable settings file {}: {}",
            settings_service.path().display(),
            e
        );
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(&args, &settings));

    eprintln!("Program finished");
    result
}

async fn run(args: &Args, settings: &Settings) -> anyhow::Result<()> {
    if let Some(path) = &args.replay {
        return stream(ReplayTransport::open(path)?, settings).await;
    }
    stream_ble(settings).await
}

#[cfg(windows)]
async fn stream_ble(settings: &Settings) -> anyhow::Result<()> {
    use crate::infrastructure::bluetooth::winrt::WinRtTransport;
    stream(WinRtTransport::new(), settings).await
}

#[cfg(not(windows))]
async fn stream_ble(_settings: &Settings) -> anyhow::Result<()> {
    anyhow::bail!("Bluetooth streaming needs the WinRT backend; use --replay on this platform")
}

/// Run one session against `transport`, stopping cleanly on Ctrl-C.
async fn stream<T: Transport>(transport: T, settings: &Settings) -> anyhow::Result<()> {
    let mut client = ImuClient::new(transport, ClientConfig::from(settings));
    info!("IMU service on characteristic {}", client.channel_uuid());

    let shutdown = client.shutdown_token();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived keyboard interrupt");
                interrupt.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let mut renderer = ConsoleRenderer::new(
        std::io::stdout().lock(),
        OutputMode::from_csv_flag(settings.csv_output),
        settings.print_data,
    );
    let result = client.connect(&mut renderer).await;
    renderer.finish()?;

    match result {
        Ok(()) => Ok(()),
        Err(ClientError::TransportDisconnected) => {
            if let Some(device) = client.peripheral() {
                warn!(
                    "Lost connection to {} ({})",
                    device.name,
                    protocol::format_address(device.address)
                );
            }
            Ok(())
        }
        Err(e) => {
            error!("Session failed: {}", e);
            if client.is_connected() {
                client.disconnect().await?;
            }
            Err(e.into())
        }
    }
}
