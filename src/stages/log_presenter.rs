//! Headless presenter that reports the overlay through tracing

use std::time::{Duration, Instant};
use tracing::info;

use crate::Result;
use crate::stage::{Overlay, Presenter, PresenterControl};
use crate::types::RawImage;

/// Presenter for headless consumers.
///
/// Logs the overlay line at most once per `report_interval` and optionally
/// requests quit after a fixed number of displayed frames.
#[derive(Debug)]
pub struct LogPresenter {
    report_interval: Duration,
    last_report: Option<Instant>,
    max_frames: Option<u64>,
}

impl Default for LogPresenter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LogPresenter {
    pub fn new(max_frames: Option<u64>) -> Self {
        Self { report_interval: Duration::from_secs(1), last_report: None, max_frames }
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }
}

impl Presenter for LogPresenter {
    fn render(&mut self, image: &RawImage, overlay: &Overlay) -> Result<PresenterControl> {
        let due = self.last_report.is_none_or(|at| at.elapsed() >= self.report_interval);
        if due {
            info!(width = image.width(), height = image.height(), "{}", overlay);
            self.last_report = Some(Instant::now());
        }

        match self.max_frames {
            Some(max) if overlay.frames_displayed >= max => {
                info!("Displayed {} frames, quitting", overlay.frames_displayed);
                Ok(PresenterControl::Quit)
            }
            _ => Ok(PresenterControl::Continue),
        }
    }

    fn close(&mut self) {
        info!("Presentation closed");
    }
}
