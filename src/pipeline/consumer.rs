//! Consumer process: receiver → buffer → decompression → presentation

use futures::Stream;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{JOIN_BUDGET, join_with_budget};
use crate::Result;
use crate::buffer::{BufferError, FrameBuffer};
use crate::config::ReceiverConfig;
use crate::connection::{NetworkReceiver, ReceiverState, SessionEnd};
use crate::stage::{Decompressor, Overlay, Presenter, PresenterControl};
use crate::stats::{PipelineStats, StatsSnapshot, log_summary};

/// Frames buffered before playback starts (capped at the buffer capacity)
pub const PREBUFFER_FRAMES: usize = 3;

/// How long one presentation `get` waits before checking for shutdown again
pub const PRESENT_GET_TIMEOUT: Duration = Duration::from_secs(1);

const PREBUFFER_POLL: Duration = Duration::from_millis(10);

/// Display rate over one-second windows
#[derive(Debug)]
struct DisplayRate {
    window_start: Instant,
    window_frames: u64,
    fps: f64,
}

impl DisplayRate {
    fn new(now: Instant) -> Self {
        Self { window_start: now, window_frames: 0, fps: 0.0 }
    }

    /// Count a displayed frame; the rate is recomputed once per second.
    fn tick(&mut self, now: Instant) -> f64 {
        self.window_frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.window_frames as f64 / elapsed.as_secs_f64();
            self.window_frames = 0;
            self.window_start = now;
        }
        self.fps
    }
}

/// Final consumer counters
#[derive(Debug)]
pub struct ConsumerSummary {
    /// Frames and bytes taken off the wire
    pub received: StatsSnapshot,
    /// Frames presented; `skipped` counts frames that failed to decompress
    pub displayed: StatsSnapshot,
    /// Frames evicted from the buffer before presentation reached them
    pub dropped: u64,
    /// How the producer session ended, if the receiver finished in time
    pub session_end: Option<SessionEnd>,
}

/// Consumer pipeline: one session, then done
pub struct Consumer<D, P> {
    config: ReceiverConfig,
    decompressor: D,
    presenter: P,
    receiver: NetworkReceiver,
}

impl<D, P> Consumer<D, P>
where
    D: Decompressor,
    P: Presenter,
{
    pub fn new(config: ReceiverConfig, decompressor: D, presenter: P) -> Self {
        let receiver = NetworkReceiver::new(config.receiver_options());
        Self { config, decompressor, presenter, receiver }
    }

    /// Watch receiver for the network receiver's state
    pub fn subscribe(&self) -> watch::Receiver<ReceiverState> {
        self.receiver.subscribe()
    }

    /// Receiver state changes as a stream
    pub fn state_updates(&self) -> impl Stream<Item = ReceiverState> + 'static {
        self.receiver.state_updates()
    }

    /// Connect, then present frames until the session ends, the presenter
    /// quits or `cancel` fires.
    ///
    /// Teardown uses a child of `cancel`, so the caller's token is never
    /// cancelled by this call.
    ///
    /// Fails with [`StreamError::RetriesExhausted`](crate::StreamError::RetriesExhausted)
    /// if the producer can't be reached, or `Cancelled` if shutdown came first.
    pub async fn run(self, cancel: CancellationToken) -> Result<ConsumerSummary> {
        let Consumer { config, decompressor, mut presenter, receiver } = self;
        config.validate()?;
        let cancel = cancel.child_token();

        let addr = config.addr();
        let buffer = Arc::new(FrameBuffer::new(config.buffer_capacity)?);
        let received = Arc::new(PipelineStats::new());

        let (stream, peer) =
            receiver.connect(&addr, &config.retry_policy(), &cancel).await.into_result(&addr)?;
        info!("Receiving from {} into a {} frame buffer", peer, config.buffer_capacity);

        let receiver_task = tokio::spawn(receiver.run(
            stream,
            Arc::clone(&buffer),
            Arc::clone(&received),
            cancel.clone(),
        ));

        let displayed = PipelineStats::new();
        present(&decompressor, &mut presenter, &buffer, &displayed, &cancel).await;

        cancel.cancel();
        let session_end = join_with_budget("receiver", receiver_task, JOIN_BUDGET).await;
        presenter.close();

        let summary = ConsumerSummary {
            received: received.snapshot(),
            displayed: displayed.snapshot(),
            dropped: buffer.dropped(),
            session_end,
        };
        log_summary("Received", &summary.received);
        log_summary("Displayed", &summary.displayed);
        info!(
            dropped = summary.dropped,
            corrupt = summary.displayed.skipped,
            "{} frames evicted before display, {} failed to decompress",
            summary.dropped,
            summary.displayed.skipped
        );
        Ok(summary)
    }
}

/// Wait for the pre-buffer to fill, or for the stream to end first.
async fn prebuffer(buffer: &FrameBuffer, cancel: &CancellationToken) {
    let target = PREBUFFER_FRAMES.min(buffer.capacity());
    info!("Buffering {} frames before playback", target);
    while buffer.size() < target && !buffer.is_closed() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(PREBUFFER_POLL) => {}
        }
    }
    debug!("Pre-buffer ready with {} frames", buffer.size());
}

/// Foreground presentation loop
async fn present<D, P>(
    decompressor: &D,
    presenter: &mut P,
    buffer: &FrameBuffer,
    displayed: &PipelineStats,
    cancel: &CancellationToken,
) where
    D: Decompressor,
    P: Presenter,
{
    prebuffer(buffer, cancel).await;
    let mut rate = DisplayRate::new(Instant::now());

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = buffer.get(PRESENT_GET_TIMEOUT) => next,
        };
        let frame = match next {
            Ok(frame) => frame,
            Err(BufferError::Empty) => {
                debug!("No frame for {:?}, waiting", PRESENT_GET_TIMEOUT);
                continue;
            }
            Err(BufferError::Closed) => {
                info!("Stream ended and buffer drained");
                break;
            }
        };

        let image = match decompressor.decompress(&frame) {
            Ok(image) => image,
            Err(e) => {
                displayed.record_skip();
                warn!("Dropping frame that failed to decompress: {}", e);
                continue;
            }
        };

        let frames_displayed = displayed.record_frame(frame.len() as u64);
        let overlay = Overlay {
            display_fps: rate.tick(Instant::now()),
            buffered: buffer.size(),
            capacity: buffer.capacity(),
            frames_displayed,
        };

        match presenter.render(&image, &overlay) {
            Ok(PresenterControl::Continue) => {}
            Ok(PresenterControl::Quit) => {
                info!("Quit requested by presenter");
                break;
            }
            Err(e) => warn!("Render failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamError;
    use crate::stages::DeflateCodec;
    use crate::test_utils::{RecordingPresenter, closed_port, solid_image};
    use crate::stage::Compressor;
    use crate::types::{Frame, Quality};
    use crate::wire::encode;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn display_rate_updates_once_per_second() {
        let start = Instant::now();
        let mut rate = DisplayRate::new(start);
        for i in 1..30 {
            assert_eq!(rate.tick(start + Duration::from_millis(i * 33)), 0.0);
        }
        let fps = rate.tick(start + Duration::from_secs(1));
        assert!((fps - 30.0).abs() < 0.01, "fps = {fps}");
        assert_eq!(rate.tick(start + Duration::from_millis(1100)), fps);
    }

    fn config_for(port: u16) -> ReceiverConfig {
        ReceiverConfig {
            port,
            max_retries: 0,
            retry_delay_ms: 10,
            connect_timeout_ms: 1_000,
            ..ReceiverConfig::default()
        }
    }

    async fn serve_frames(frames: Vec<Frame>) -> (u16, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            for frame in &frames {
                socket.write_all(&encode(frame)).await.unwrap();
            }
            socket.shutdown().await.unwrap();
        });
        (port, task)
    }

    #[tokio::test]
    async fn presents_every_frame_then_ends_with_the_session() {
        let codec = DeflateCodec::default();
        let mut frames: Vec<Frame> = (0..6u8)
            .map(|v| codec.compress(&solid_image(4, 4, v * 10), Quality::MAX).unwrap())
            .collect();
        frames.insert(3, Frame::from(b"not a frame".to_vec()));
        let (port, server) = serve_frames(frames).await;

        let presenter = RecordingPresenter::new(None);
        let recorded = presenter.recorded();
        let summary = Consumer::new(config_for(port), codec, presenter)
            .run(CancellationToken::new())
            .await
            .unwrap();
        server.await.unwrap();

        let recorded = recorded.lock().unwrap();
        let values: Vec<u8> = recorded.images.iter().map(|img| img.pixels()[0]).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50]);
        assert!(recorded.closed);
        assert_eq!(recorded.overlays.last().unwrap().frames_displayed, 6);
        assert_eq!(recorded.overlays[0].capacity, 10);

        assert_eq!(summary.received.frames, 7);
        assert_eq!(summary.displayed.frames, 6);
        assert_eq!(summary.displayed.skipped, 1);
        assert!(matches!(
            summary.session_end,
            Some(SessionEnd::Disconnected(StreamError::ConnectionClosed { .. }))
        ));
    }

    #[tokio::test]
    async fn presenter_quit_ends_the_pipeline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let codec = DeflateCodec::default();
            for v in (0..=u8::MAX).cycle() {
                let frame = codec.compress(&solid_image(2, 2, v), Quality::MAX).unwrap();
                if socket.write_all(&encode(&frame)).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let presenter = RecordingPresenter::new(Some(4));
        let recorded = presenter.recorded();
        let cancel = CancellationToken::new();
        let summary = tokio::time::timeout(
            Duration::from_secs(10),
            Consumer::new(config_for(port), DeflateCodec::default(), presenter).run(cancel.clone()),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(!cancel.is_cancelled(), "caller's token must stay live");
        assert_eq!(recorded.lock().unwrap().images.len(), 4);
        assert!(matches!(summary.session_end, Some(SessionEnd::Cancelled)));
        server.abort();
    }

    #[tokio::test]
    async fn caller_cancellation_still_stops_the_consumer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let cancel = CancellationToken::new();
        let consumer = Consumer::new(config_for(port), DeflateCodec::default(), RecordingPresenter::new(None));
        let mut state = consumer.subscribe();
        let run = tokio::spawn(consumer.run(cancel.clone()));

        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| matches!(s, ReceiverState::Connected { .. })),
        )
        .await
        .unwrap()
        .unwrap();
        cancel.cancel();

        let summary = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap().unwrap();
        assert!(matches!(summary.session_end, Some(SessionEnd::Cancelled)));
        server.abort();
    }

    #[tokio::test]
    async fn unreachable_producer_is_fatal() {
        let consumer = Consumer::new(
            config_for(closed_port()),
            DeflateCodec::default(),
            RecordingPresenter::new(None),
        );
        let mut state = consumer.subscribe();
        let err = consumer.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, StreamError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(*state.borrow_and_update(), ReceiverState::Closed);
    }
}
