//! Producer-side network endpoint

use futures::Stream;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{SessionEnd, SessionId};
use crate::buffer::{BufferError, FrameBuffer};
use crate::stats::{PipelineStats, report_progress};
use crate::wire::write_frame;
use crate::{Result, StreamError};

/// Lifecycle of a [`NetworkSender`]
///
/// `Listening → AwaitingClient → Streaming → AwaitingClient → ...`, with
/// `Shutdown` reachable from any state once cancellation is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderState {
    Listening,
    AwaitingClient,
    Streaming { session: SessionId, peer: SocketAddr },
    Shutdown,
}

/// Tuning knobs for the streaming loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderOptions {
    /// How long one buffer `get` waits before checking for shutdown again
    pub get_timeout: Duration,
    /// A peer that stops reading for this long is treated as gone
    pub write_timeout: Duration,
    /// Pause after a failed `accept`
    pub accept_backoff: Duration,
    /// Log throughput every N frames (0 disables)
    pub report_every: u64,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            get_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(5),
            accept_backoff: Duration::from_secs(1),
            report_every: 100,
        }
    }
}

/// Listening socket that streams buffered frames to one consumer at a time.
///
/// Additional consumers wait in the listen backlog and are accepted once the
/// current session ends. A consumer disconnecting never stops the sender.
pub struct NetworkSender {
    listener: TcpListener,
    local_addr: SocketAddr,
    state_tx: watch::Sender<SenderState>,
    state_rx: watch::Receiver<SenderState>,
    sessions: u64,
}

impl NetworkSender {
    /// Bind and listen on `addr` (`host:port`; port 0 picks a free port).
    pub async fn bind(addr: &str, backlog: u32) -> Result<Self> {
        let bind_error = |source| StreamError::Bind { addr: addr.to_string(), source };

        let socket_addr = tokio::net::lookup_host(addr)
            .await
            .map_err(bind_error)?
            .next()
            .ok_or_else(|| {
                bind_error(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "address resolved to nothing",
                ))
            })?;

        let socket = match socket_addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(socket_addr).map_err(bind_error)?;
        let listener = socket.listen(backlog.max(1)).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let (state_tx, state_rx) = watch::channel(SenderState::Listening);
        info!("Listening on {} (backlog {})", local_addr, backlog.max(1));

        Ok(Self { listener, local_addr, state_tx, state_rx, sessions: 0 })
    }

    /// Address the listener is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current state snapshot
    pub fn state(&self) -> SenderState {
        self.state_rx.borrow().clone()
    }

    /// Watch receiver for state changes; stays valid after `run` consumes the sender
    pub fn subscribe(&self) -> watch::Receiver<SenderState> {
        self.state_rx.clone()
    }

    /// State changes as a stream, starting with the current state
    pub fn state_updates(&self) -> impl Stream<Item = SenderState> + 'static {
        WatchStream::new(self.state_rx.clone())
    }

    fn set_state(&self, state: SenderState) {
        self.state_tx.send_replace(state);
    }

    /// Accept consumers and stream frames from `buffer` until cancelled.
    ///
    /// Returns once `cancel` fires or the buffer is closed.
    pub async fn run(
        mut self,
        buffer: Arc<FrameBuffer>,
        stats: Arc<PipelineStats>,
        options: SenderOptions,
        cancel: CancellationToken,
    ) {
        loop {
            self.set_state(SenderState::AwaitingClient);
            info!("Waiting for a consumer on {}", self.local_addr);

            let accepted = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}; retrying in {:?}", e, options.accept_backoff);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(options.accept_backoff) => continue,
                    }
                }
            };

            self.sessions += 1;
            let session = SessionId(self.sessions);
            if let Err(e) = stream.set_nodelay(true) {
                debug!(%session, "Could not disable Nagle: {}", e);
            }
            self.set_state(SenderState::Streaming { session, peer });
            info!(%session, %peer, "Consumer connected");

            let (end, sent) =
                stream_session(stream, session, &buffer, &stats, &options, &cancel).await;
            match end {
                SessionEnd::Disconnected(e) => {
                    info!(%session, %peer, sent, "Consumer disconnected: {}", e);
                }
                SessionEnd::Cancelled => {
                    info!(%session, %peer, sent, "Session stopped by shutdown");
                    break;
                }
                SessionEnd::BufferClosed => {
                    info!(%session, %peer, sent, "Frame buffer closed, ending session");
                    break;
                }
            }
        }

        self.set_state(SenderState::Shutdown);
        info!("Sender stopped after {} sessions", self.sessions);
    }
}

/// Stream frames to one peer until it goes away. Returns why the session
/// ended and how many frames it carried.
async fn stream_session(
    mut stream: TcpStream,
    session: SessionId,
    buffer: &FrameBuffer,
    stats: &PipelineStats,
    options: &SenderOptions,
    cancel: &CancellationToken,
) -> (SessionEnd, u64) {
    let mut sent = 0u64;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (SessionEnd::Cancelled, sent),
            next = buffer.get(options.get_timeout) => next,
        };
        let frame = match next {
            Ok(frame) => frame,
            Err(BufferError::Empty) => {
                trace!(%session, "No frame within {:?}", options.get_timeout);
                continue;
            }
            Err(BufferError::Closed) => return (SessionEnd::BufferClosed, sent),
        };

        let write = tokio::time::timeout(options.write_timeout, write_frame(&mut stream, &frame));
        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (SessionEnd::Cancelled, sent),
            written = write => written,
        };

        match written {
            Ok(Ok(bytes)) => {
                sent += 1;
                let total = stats.record_frame(bytes);
                trace!(%session, bytes, "Frame sent");
                report_progress(
                    "Sent",
                    stats,
                    total,
                    options.report_every,
                    buffer.size(),
                    buffer.capacity(),
                );
            }
            Ok(Err(e)) => return (SessionEnd::Disconnected(e), sent),
            Err(_) => {
                let e = StreamError::Timeout { duration: options.write_timeout };
                return (SessionEnd::Disconnected(e), sent);
            }
        }
    }
}
