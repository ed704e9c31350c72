//! Bounded connect retry for the consumer

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Result, StreamError};

/// How hard the consumer tries to reach the producer at startup.
///
/// One initial attempt is made, followed by up to `max_retries` retries with
/// `retry_delay` slept before each retry. Every attempt is bounded by
/// `connect_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            retry_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Result of [`connect_with_retry`]
#[derive(Debug)]
pub enum ConnectOutcome {
    Connected { stream: TcpStream, peer: SocketAddr, attempts: u32 },
    ExhaustedRetries { attempts: u32, last_error: StreamError },
    Cancelled,
}

impl ConnectOutcome {
    /// Collapse into a `Result`, turning exhaustion into
    /// [`StreamError::RetriesExhausted`].
    pub fn into_result(self, addr: &str) -> Result<(TcpStream, SocketAddr)> {
        match self {
            ConnectOutcome::Connected { stream, peer, .. } => Ok((stream, peer)),
            ConnectOutcome::ExhaustedRetries { attempts, last_error } => {
                Err(StreamError::RetriesExhausted {
                    addr: addr.to_string(),
                    attempts,
                    last_error: Box::new(last_error),
                })
            }
            ConnectOutcome::Cancelled => Err(StreamError::Cancelled),
        }
    }
}

/// Make a single connection attempt bounded by `timeout`.
pub async fn connect(addr: &str, timeout: Duration) -> Result<(TcpStream, SocketAddr)> {
    let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            return Err(StreamError::ConnectionRefused { addr: addr.to_string(), source: e });
        }
        Ok(Err(e)) => return Err(StreamError::io(format!("connecting to {}", addr), e)),
        Err(_) => {
            return Err(StreamError::ConnectTimeout { addr: addr.to_string(), duration: timeout });
        }
    };
    let peer = stream.peer_addr().map_err(|e| StreamError::io("reading peer address", e))?;
    Ok((stream, peer))
}

/// Connect to `addr`, retrying per `policy` until connected, out of attempts
/// or cancelled.
///
/// `on_attempt` is called with the 1-based attempt number before each try.
/// Every connect failure is retried, not only refusals: a producer that is
/// still starting up can fail in several ways.
pub async fn connect_with_retry<F>(
    addr: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut on_attempt: F,
) -> ConnectOutcome
where
    F: FnMut(u32),
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        on_attempt(attempt);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ConnectOutcome::Cancelled,
            result = connect(addr, policy.connect_timeout) => result,
        };

        let error = match result {
            Ok((stream, peer)) => {
                debug!(%peer, attempt, "Connected");
                return ConnectOutcome::Connected { stream, peer, attempts: attempt };
            }
            Err(e) => e,
        };

        if attempt >= max_attempts {
            return ConnectOutcome::ExhaustedRetries { attempts: attempt, last_error: error };
        }

        warn!(
            "Connection attempt {}/{} to {} failed: {}; retrying in {:?}",
            attempt, max_attempts, addr, error, policy.retry_delay
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return ConnectOutcome::Cancelled,
            _ = tokio::time::sleep(policy.retry_delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::closed_port;
    use std::time::Instant;

    #[test]
    fn attempts_include_the_first_try() {
        let policy = RetryPolicy { max_retries: 3, ..RetryPolicy::default() };
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(RetryPolicy { max_retries: u32::MAX, ..policy }.max_attempts(), u32::MAX);
    }

    #[tokio::test]
    async fn closed_port_exhausts_retries() {
        let addr = format!("127.0.0.1:{}", closed_port());
        let policy = RetryPolicy {
            max_retries: 2,
            retry_delay: Duration::from_millis(50),
            connect_timeout: Duration::from_secs(1),
        };

        let mut seen = Vec::new();
        let started = Instant::now();
        let outcome =
            connect_with_retry(&addr, &policy, &CancellationToken::new(), |n| seen.push(n)).await;

        assert_eq!(seen, vec![1, 2, 3]);
        assert!(started.elapsed() >= Duration::from_millis(100));
        match outcome {
            ConnectOutcome::ExhaustedRetries { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.is_retryable(), "unexpected error: {last_error}");
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_interrupts_retry_delay() {
        let addr = format!("127.0.0.1:{}", closed_port());
        let policy = RetryPolicy {
            max_retries: 10,
            retry_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(1),
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            connect_with_retry(&addr, &policy, &cancel, |_| {}),
        )
        .await
        .expect("cancellation should end the retry loop");
        assert!(matches!(outcome, ConnectOutcome::Cancelled));
    }

    #[tokio::test]
    async fn connects_to_listening_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let outcome =
            connect_with_retry(&addr, &RetryPolicy::default(), &CancellationToken::new(), |_| {})
                .await;
        let (_stream, peer) = outcome.into_result(&addr).unwrap();
        assert_eq!(peer, listener.local_addr().unwrap());
    }

    #[test]
    fn exhausted_outcome_maps_to_retries_exhausted() {
        let outcome = ConnectOutcome::ExhaustedRetries {
            attempts: 5,
            last_error: StreamError::Timeout { duration: Duration::from_secs(1) },
        };
        let err = outcome.into_result("10.0.0.1:9999").unwrap_err();
        assert!(matches!(err, StreamError::RetriesExhausted { attempts: 5, .. }));
        assert!(err.to_string().contains("10.0.0.1:9999"));
    }
}
