//! Real-time compressed frame transport over TCP.
//!
//! Framecast moves a live stream of compressed images from a producer to a
//! single consumer with bounded memory and latency. Whenever a stage falls
//! behind, the oldest frames are dropped so what arrives is always recent.
//!
//! # Features
//!
//! - **Drop-oldest buffering**: fixed-capacity buffers on both ends, never blocking the writer
//! - **Simple framing**: 8-byte big-endian length prefix per frame, no handshake
//! - **Resilient producer**: consumers come and go; the producer keeps serving
//! - **Bounded startup**: the consumer retries a fixed number of times, then fails loudly
//!
//! # Quick Start
//!
//! The `framecast-send` and `framecast-recv` binaries wire the reference
//! stages together. Libraries plug in their own [`FrameSource`],
//! [`Compressor`], [`Decompressor`] and [`Presenter`].
//!
//! ## Example (producer)
//!
//! ```rust,no_run
//! use framecast::stages::{DeflateCodec, TestPatternSource};
//! use framecast::{Framecast, SenderConfig};
//!
//! #[tokio::main]
//! async fn main() -> framecast::Result<()> {
//!     let config = SenderConfig::default();
//!     let source = TestPatternSource::new(config.device, config.width, config.height);
//!     let producer = Framecast::serve(&config, source, DeflateCodec::default()).await?;
//!
//!     let summary = producer
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!     println!("sent {} frames", summary.sent.frames);
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod buffer;
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;
pub mod wire;

// Pipeline stages and assembly
pub mod connection;
pub mod driver;
pub mod pacing;
pub mod pipeline;
pub mod stage;
pub mod stages;
pub mod stats;

// Core exports
pub use buffer::{BufferError, DropOldestBuffer, FrameBuffer, PutOutcome};
pub use config::{ReceiverConfig, SenderConfig};
pub use error::*;
pub use types::*;

// Main API exports
pub use connection::{
    ConnectOutcome, NetworkReceiver, NetworkSender, ReceiverState, RetryPolicy, SenderState,
    SessionEnd, SessionId,
};
pub use pipeline::{Consumer, ConsumerSummary, Producer, ProducerHandle, ProducerSummary};
pub use stage::{Compressor, Decompressor, FrameSource, Overlay, Presenter, PresenterControl};
pub use stats::{PipelineStats, StatsSnapshot};

use tokio_util::sync::CancellationToken;

/// Unified entry point for both ends of a Framecast stream.
///
/// # Examples
///
/// ## Consumer
/// ```rust,no_run
/// use framecast::stages::{DeflateCodec, LogPresenter};
/// use framecast::{Framecast, ReceiverConfig};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> framecast::Result<()> {
///     let summary = Framecast::watch(
///         ReceiverConfig::default(),
///         DeflateCodec::default(),
///         LogPresenter::default(),
///         CancellationToken::new(),
///     )
///     .await?;
///     println!("displayed {} frames", summary.displayed.frames);
///     Ok(())
/// }
/// ```
pub struct Framecast;

impl Framecast {
    /// Start a producer.
    ///
    /// Binds the listening socket and spawns the acquisition and sender
    /// activities. The returned handle keeps running until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration fails validation
    /// - The listen address can't be resolved or bound
    pub async fn serve<S, C>(config: &SenderConfig, source: S, compressor: C) -> Result<ProducerHandle>
    where
        S: FrameSource,
        C: Compressor,
    {
        Producer::start(config, source, compressor).await
    }

    /// Run a consumer to completion.
    ///
    /// Connects with bounded retries, then presents frames until the producer
    /// session ends, the presenter quits or `cancel` fires. There is no
    /// automatic reconnect.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration fails validation
    /// - Every connection attempt failed (`RetriesExhausted`)
    /// - `cancel` fired before a connection was made (`Cancelled`)
    pub async fn watch<D, P>(
        config: ReceiverConfig,
        decompressor: D,
        presenter: P,
        cancel: CancellationToken,
    ) -> Result<ConsumerSummary>
    where
        D: Decompressor,
        P: Presenter,
    {
        Consumer::new(config, decompressor, presenter).run(cancel).await
    }
}
