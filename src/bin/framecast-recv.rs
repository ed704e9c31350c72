//! Framecast consumer - receives, decompresses and presents frames from one producer.

use anyhow::{Context, Result};
use clap::Parser;
use framecast::stages::{DeflateCodec, LogPresenter};
use framecast::{Framecast, ReceiverConfig, StreamError};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "framecast-recv")]
#[command(about = "Receive and present frames from a framecast-send producer")]
struct Args {
    /// YAML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Producer address
    #[arg(long)]
    host: Option<String>,

    /// Producer port
    #[arg(short, long)]
    port: Option<u16>,

    /// Frames buffered between the network and presentation
    #[arg(short, long)]
    buffer: Option<usize>,

    /// Connection retries after the first failed attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Delay before each retry, in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Quit after presenting this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn to_config(&self) -> Result<ReceiverConfig> {
        let mut config = match &self.config {
            Some(path) => ReceiverConfig::from_yaml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ReceiverConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(buffer) = self.buffer {
            config.buffer_capacity = buffer;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(delay) = self.retry_delay_ms {
            config.retry_delay_ms = delay;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = args.to_config()?;
    info!("Starting framecast consumer for {}", config.addr());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            on_signal.cancel();
        }
    });

    let presenter = LogPresenter::new(args.max_frames);
    let summary =
        match Framecast::watch(config.clone(), DeflateCodec::default(), presenter, cancel).await {
            Ok(summary) => summary,
            Err(StreamError::Cancelled) => {
                info!("Cancelled before connecting");
                return Ok(());
            }
            Err(e) => {
                for hint in e.recovery_suggestions() {
                    error!("hint: {}", hint);
                }
                return Err(e).with_context(|| format!("receiving from {}", config.addr()));
            }
        };

    println!(
        "Received {} frames ({:.2} MB), displayed {} at {:.1} fps, {} dropped, {} corrupt",
        summary.received.frames,
        summary.received.megabytes(),
        summary.displayed.frames,
        summary.displayed.fps(),
        summary.dropped,
        summary.displayed.skipped
    );
    Ok(())
}
