//! Driver spawns and manages the acquisition task

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::buffer::{FrameBuffer, PutOutcome};
use crate::pacing::Pacer;
use crate::stage::{Compressor, FrameSource};
use crate::stats::PipelineStats;
use crate::types::Quality;

/// Pause before asking an unavailable source again
pub const ACQUISITION_BACKOFF: Duration = Duration::from_millis(100);

/// State the acquisition task shares with the rest of the producer
#[derive(Clone)]
pub struct DriverShared {
    /// Destination for compressed frames
    pub buffer: Arc<FrameBuffer>,
    /// Skipped-frame accounting
    pub stats: Arc<PipelineStats>,
    /// Shutdown signal
    pub cancel: CancellationToken,
}

/// Driver spawns the acquisition + compression activity of a producer
///
/// The task owns the frame source. Compression runs on the blocking pool so
/// a slow encoder never stalls the runtime's reactor threads.
pub struct Driver;

impl Driver {
    /// Spawn the acquisition task for `source`
    pub fn spawn<S, C>(
        source: S,
        compressor: Arc<C>,
        quality: Quality,
        pacer: Pacer,
        shared: DriverShared,
    ) -> JoinHandle<()>
    where
        S: FrameSource,
        C: Compressor,
    {
        tokio::spawn(async move {
            Self::acquisition_task(source, compressor, quality, pacer, shared).await;
        })
    }

    async fn acquisition_task<S, C>(
        mut source: S,
        compressor: Arc<C>,
        quality: Quality,
        mut pacer: Pacer,
        shared: DriverShared,
    ) where
        S: FrameSource,
        C: Compressor,
    {
        let DriverShared { buffer, stats, cancel } = shared;
        info!(
            "Acquisition started: {} at {:?} per frame, quality {}",
            source.describe(),
            pacer.interval(),
            quality
        );
        let mut captured = 0u64;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let image = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                image = source.capture_frame() => image,
            };

            let image = match image {
                Ok(image) => image,
                Err(e) => {
                    stats.record_skip();
                    if e.is_frame_local() {
                        warn!("No frame from source: {}", e);
                    } else {
                        error!("Frame source failed: {}", e);
                    }
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(ACQUISITION_BACKOFF) => continue,
                    }
                }
            };

            let encoder = Arc::clone(&compressor);
            let compressed =
                tokio::task::spawn_blocking(move || encoder.compress(&image, quality)).await;

            match compressed {
                Ok(Ok(frame)) => {
                    captured += 1;
                    trace!(captured, bytes = frame.len(), "Frame compressed");
                    match buffer.put(frame) {
                        PutOutcome::Stored => {}
                        PutOutcome::Evicted(_) => debug!("Buffer full, dropped oldest frame"),
                        PutOutcome::Rejected(_) => {
                            debug!("Buffer closed, stopping acquisition");
                            break;
                        }
                    }
                }
                Ok(Err(e)) => {
                    stats.record_skip();
                    warn!("Skipping frame: {}", e);
                }
                Err(e) => {
                    stats.record_skip();
                    error!("Compression task failed: {}", e);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = pacer.wait() => {}
            }
        }

        info!("Acquisition stopped after {} frames", captured);
    }
}
