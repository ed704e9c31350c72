//! Framecast producer - captures, compresses and streams frames to one consumer.

use anyhow::{Context, Result};
use clap::Parser;
use framecast::stages::{DeflateCodec, TestPatternSource};
use framecast::{Framecast, Quality, SenderConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "framecast-send")]
#[command(about = "Stream compressed frames to a framecast-recv consumer")]
struct Args {
    /// YAML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long)]
    port: Option<u16>,

    /// Capture device index
    #[arg(short, long)]
    device: Option<u32>,

    /// Frame width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Target frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Compression quality (1-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Frames buffered between capture and the network
    #[arg(short, long)]
    buffer: Option<usize>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn into_config(self) -> Result<SenderConfig> {
        let mut config = match &self.config {
            Some(path) => SenderConfig::from_yaml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SenderConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(quality) = self.quality {
            config.quality = Quality::new(quality)?;
        }
        if let Some(buffer) = self.buffer {
            config.buffer_capacity = buffer;
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

    let config = args.into_config()?;
    info!("Starting framecast producer");

    let source = TestPatternSource::new(config.device, config.width, config.height);
    let producer = Framecast::serve(&config, source, DeflateCodec::default())
        .await
        .with_context(|| format!("starting producer on {}", config.addr()))?;

    println!("Listening on {} - press Ctrl+C to stop", producer.local_addr());

    let summary = producer
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    println!(
        "Sent {} frames ({:.2} MB) in {:.1}s, {:.1} fps average, {} dropped",
        summary.sent.frames,
        summary.sent.megabytes(),
        summary.sent.elapsed.as_secs_f64(),
        summary.sent.fps(),
        summary.dropped
    );
    Ok(())
}
