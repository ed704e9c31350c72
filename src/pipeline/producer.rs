//! Producer process: acquisition → compression → buffer → sender

use futures::Stream;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{JOIN_BUDGET, join_with_budget};
use crate::Result;
use crate::buffer::FrameBuffer;
use crate::config::SenderConfig;
use crate::connection::{NetworkSender, SenderState};
use crate::driver::{Driver, DriverShared};
use crate::pacing::Pacer;
use crate::stage::{Compressor, FrameSource};
use crate::stats::{PipelineStats, StatsSnapshot, log_summary};

/// Starts producer pipelines
pub struct Producer;

impl Producer {
    /// Bind the listener and spawn the acquisition and sender activities.
    ///
    /// Fails fast on invalid configuration or when the address can't be bound.
    pub async fn start<S, C>(config: &SenderConfig, source: S, compressor: C) -> Result<ProducerHandle>
    where
        S: FrameSource,
        C: Compressor,
    {
        config.validate()?;

        let sender = NetworkSender::bind(&config.addr(), config.backlog).await?;
        let local_addr = sender.local_addr();
        let state = sender.subscribe();

        let buffer = Arc::new(FrameBuffer::new(config.buffer_capacity)?);
        let stats = Arc::new(PipelineStats::new());
        let cancel = CancellationToken::new();

        info!(
            "Producer on {}: {}x{} @ {} fps, quality {}, buffer {}",
            local_addr, config.width, config.height, config.fps, config.quality, config.buffer_capacity
        );

        let driver = Driver::spawn(
            source,
            Arc::new(compressor),
            config.quality,
            Pacer::new(config.frame_interval()),
            DriverShared {
                buffer: Arc::clone(&buffer),
                stats: Arc::clone(&stats),
                cancel: cancel.clone(),
            },
        );
        let sender = tokio::spawn(sender.run(
            Arc::clone(&buffer),
            Arc::clone(&stats),
            config.sender_options(),
            cancel.clone(),
        ));

        Ok(ProducerHandle { local_addr, buffer, stats, state, cancel, driver, sender })
    }
}

/// Running producer
pub struct ProducerHandle {
    local_addr: SocketAddr,
    buffer: Arc<FrameBuffer>,
    stats: Arc<PipelineStats>,
    state: watch::Receiver<SenderState>,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
    sender: JoinHandle<()>,
}

/// Final producer counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProducerSummary {
    /// Frames and bytes sent, plus frames skipped during acquisition
    pub sent: StatsSnapshot,
    /// Frames evicted from the buffer before they could be sent
    pub dropped: u64,
}

impl ProducerHandle {
    /// Address consumers should connect to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Current sender state
    pub fn state(&self) -> SenderState {
        self.state.borrow().clone()
    }

    /// Sender state changes as a stream
    pub fn state_updates(&self) -> impl Stream<Item = SenderState> + 'static {
        WatchStream::new(self.state.clone())
    }

    /// Token that stops the whole producer when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until `shutdown` resolves or the token is cancelled, then shut down.
    pub async fn run_until<F>(self, shutdown: F) -> ProducerSummary
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => info!("Shutdown requested"),
            _ = self.cancel.cancelled() => {}
        }
        self.shutdown().await
    }

    /// Stop both activities, join them within the budget and report.
    pub async fn shutdown(self) -> ProducerSummary {
        self.cancel.cancel();
        join_with_budget("acquisition", self.driver, JOIN_BUDGET).await;
        join_with_budget("sender", self.sender, JOIN_BUDGET).await;
        self.buffer.close();

        let summary =
            ProducerSummary { sent: self.stats.snapshot(), dropped: self.buffer.dropped() };
        log_summary("Producer", &summary.sent);
        info!(
            skipped = summary.sent.skipped,
            dropped = summary.dropped,
            "{} frames skipped at acquisition, {} evicted from the buffer",
            summary.sent.skipped,
            summary.dropped
        );
        summary
    }
}
