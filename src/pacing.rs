//! Fixed-interval pacing for the acquisition loop

use std::time::Duration;
use tokio::time::Instant;

/// Paces a loop to a fixed frame interval without accumulating debt.
///
/// If an iteration overruns its deadline, the next deadline is recomputed from
/// the current time instead of bursting to catch up. Cadence is shed, never
/// made up.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_deadline: Instant,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, next_deadline: Instant::now() }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Advance to the next deadline as seen at `now`.
    ///
    /// Returns how long to sleep, or `None` when the loop is running behind
    /// (in which case the schedule restarts from `now`).
    pub fn schedule(&mut self, now: Instant) -> Option<Duration> {
        self.next_deadline += self.interval;
        if self.next_deadline > now {
            Some(self.next_deadline - now)
        } else {
            self.next_deadline = now;
            None
        }
    }

    /// Sleep until the next deadline
    pub async fn wait(&mut self) {
        if let Some(delay) = self.schedule(Instant::now()) {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn on_time_iterations_sleep_the_remainder() {
        let start = Instant::now();
        let mut pacer = Pacer::new(Duration::from_millis(100));

        let sleep = pacer.schedule(start + Duration::from_millis(30));
        assert_eq!(sleep, Some(Duration::from_millis(70)));
    }

    #[tokio::test(start_paused = true)]
    async fn overrun_resets_schedule_without_debt() {
        let start = Instant::now();
        let mut pacer = Pacer::new(Duration::from_millis(100));

        // A 350ms overrun must not produce three zero-length catch-up cycles.
        assert_eq!(pacer.schedule(start + Duration::from_millis(350)), None);
        assert_eq!(
            pacer.schedule(start + Duration::from_millis(360)),
            Some(Duration::from_millis(90))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_holds_target_rate() {
        let mut pacer = Pacer::new(Duration::from_millis(50));
        let start = Instant::now();
        for _ in 0..10 {
            pacer.wait().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(520), "{elapsed:?}");
    }
}
