//! Producer and consumer assembly
//!
//! Each process runs three activities that share only a frame buffer, stats
//! counters and one cancellation token:
//!
//! | Process  | Activities |
//! |----------|------------|
//! | producer | acquisition + compression task, sender task, supervising caller |
//! | consumer | receiver task, presentation loop in the caller's task |
//!
//! Shutdown cancels the token and joins every background task with
//! [`JOIN_BUDGET`]; a task that overruns is aborted.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub mod consumer;
pub mod producer;

pub use consumer::{Consumer, ConsumerSummary};
pub use producer::{Producer, ProducerHandle, ProducerSummary};

/// Time each background activity gets to finish after cancellation
pub const JOIN_BUDGET: Duration = Duration::from_secs(2);

/// Await `handle` for at most `budget`, aborting it on overrun.
///
/// Returns the task's output, or `None` if it panicked or had to be aborted.
pub async fn join_with_budget<T>(
    name: &str,
    mut handle: JoinHandle<T>,
    budget: Duration,
) -> Option<T> {
    match tokio::time::timeout(budget, &mut handle).await {
        Ok(Ok(output)) => {
            debug!("{} task finished", name);
            Some(output)
        }
        Ok(Err(e)) => {
            error!("{} task failed: {}", name, e);
            None
        }
        Err(_) => {
            warn!("{} task did not stop within {:?}, aborting", name, budget);
            handle.abort();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn overrunning_task_is_aborted() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            1
        });
        let started = tokio::time::Instant::now();
        assert_eq!(join_with_budget("sleeper", handle, JOIN_BUDGET).await, None);
        assert!(started.elapsed() >= JOIN_BUDGET);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn finished_task_output_is_returned() {
        let handle = tokio::spawn(async { 7 });
        assert_eq!(join_with_budget("quick", handle, JOIN_BUDGET).await, Some(7));
    }
}
