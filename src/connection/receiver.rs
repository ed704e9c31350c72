//! Consumer-side network endpoint

use futures::Stream;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use super::SessionEnd;
use super::retry::{ConnectOutcome, RetryPolicy, connect_with_retry};
use crate::buffer::{FrameBuffer, PutOutcome};
use crate::stats::{PipelineStats, report_progress};
use crate::wire::{DEFAULT_MAX_FRAME_LEN, read_frame};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Lifecycle of a [`NetworkReceiver`]
///
/// `Connecting → Connected → Draining (local shutdown) → Closed`. There is no
/// automatic reconnect: once `Closed`, the receiver is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverState {
    /// Trying to reach the producer; `attempt` is 0 before the first try
    Connecting { attempt: u32 },
    Connected { peer: SocketAddr },
    Draining,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverOptions {
    /// Largest payload accepted from the wire
    pub max_frame_len: u64,
    /// Log throughput every N frames (0 disables)
    pub report_every: u64,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self { max_frame_len: DEFAULT_MAX_FRAME_LEN, report_every: 100 }
    }
}

/// Closes the buffer however the receive loop exits, aborts and panics included.
struct CloseOnExit<'a>(&'a FrameBuffer);

impl Drop for CloseOnExit<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Outbound connection that decodes frames into the local buffer.
pub struct NetworkReceiver {
    options: ReceiverOptions,
    state_tx: watch::Sender<ReceiverState>,
    state_rx: watch::Receiver<ReceiverState>,
}

impl NetworkReceiver {
    pub fn new(options: ReceiverOptions) -> Self {
        let (state_tx, state_rx) = watch::channel(ReceiverState::Connecting { attempt: 0 });
        Self { options, state_tx, state_rx }
    }

    /// Current state snapshot
    pub fn state(&self) -> ReceiverState {
        self.state_rx.borrow().clone()
    }

    /// Watch receiver for state changes; stays valid after `run` consumes the receiver
    pub fn subscribe(&self) -> watch::Receiver<ReceiverState> {
        self.state_rx.clone()
    }

    /// State changes as a stream, starting with the current state
    pub fn state_updates(&self) -> impl Stream<Item = ReceiverState> + 'static {
        WatchStream::new(self.state_rx.clone())
    }

    fn set_state(&self, state: ReceiverState) {
        self.state_tx.send_replace(state);
    }

    /// Connect to the producer at `addr` with bounded retries.
    ///
    /// Exhausted retries and cancellation leave the receiver `Closed`.
    pub async fn connect(
        &self,
        addr: &str,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> ConnectOutcome {
        let max_attempts = policy.max_attempts();
        let outcome = connect_with_retry(addr, policy, cancel, |attempt| {
            info!("Connecting to {} (attempt {}/{})", addr, attempt, max_attempts);
            self.set_state(ReceiverState::Connecting { attempt });
        })
        .await;

        match &outcome {
            ConnectOutcome::Connected { peer, attempts, .. } => {
                info!(%peer, attempts, "Connected to producer");
                self.set_state(ReceiverState::Connected { peer: *peer });
            }
            ConnectOutcome::ExhaustedRetries { attempts, last_error } => {
                warn!("Giving up on {} after {} attempts: {}", addr, attempts, last_error);
                self.set_state(ReceiverState::Closed);
            }
            ConnectOutcome::Cancelled => self.set_state(ReceiverState::Closed),
        }
        outcome
    }

    /// Decode frames from `stream` into `buffer` until the session ends.
    ///
    /// The buffer is closed on exit so the presentation side drains what is
    /// left and then stops.
    pub async fn run(
        self,
        stream: TcpStream,
        buffer: Arc<FrameBuffer>,
        stats: Arc<PipelineStats>,
        cancel: CancellationToken,
    ) -> SessionEnd {
        let close_on_exit = CloseOnExit(&buffer);
        if let Ok(peer) = stream.peer_addr() {
            self.set_state(ReceiverState::Connected { peer });
        }
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, stream);

        let end = loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.set_state(ReceiverState::Draining);
                    break SessionEnd::Cancelled;
                }
                read = read_frame(&mut reader, self.options.max_frame_len) => read,
            };

            let frame = match read {
                Ok(frame) => frame,
                Err(e) => break SessionEnd::Disconnected(e),
            };

            let bytes = frame.wire_len();
            match buffer.put(frame) {
                PutOutcome::Stored => {}
                PutOutcome::Evicted(_) => trace!("Buffer full, dropped oldest frame"),
                PutOutcome::Rejected(_) => break SessionEnd::BufferClosed,
            }

            let total = stats.record_frame(bytes);
            report_progress(
                "Received",
                &stats,
                total,
                self.options.report_every,
                buffer.size(),
                buffer.capacity(),
            );
        };

        match &end {
            SessionEnd::Disconnected(e) => info!("Producer session ended: {}", e),
            SessionEnd::Cancelled => info!("Receiver stopped by shutdown"),
            SessionEnd::BufferClosed => info!("Frame buffer closed, receiver stopping"),
        }

        drop(close_on_exit);
        self.set_state(ReceiverState::Closed);
        end
    }
}
