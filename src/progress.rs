use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::executor::Outcome;
use crate::job::Job;
use crate::scanner::Reporter;

/// Completed-job counter. Workers only ever call [`Progress::inc`].
#[derive(Debug)]
pub struct Progress {
    completed: AtomicU64,
    total: u64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Progress {
            completed: AtomicU64::new(0),
            total,
        }
    }

    pub fn inc(&self, n: u64) {
        self.completed.fetch_add(n, Ordering::Relaxed);
    }

    /// `(completed, total)`
    pub fn snapshot(&self) -> (u64, u64) {
        (self.completed.load(Ordering::Relaxed), self.total)
    }
}

impl Reporter for Progress {
    fn record(&self, _job: &Job, _outcome: &Outcome) {
        self.inc(1);
    }
}

const BAR_TEMPLATE: &str = "[PROGRESS] {pos} / {len} ({percent}%)";

/// Live progress bar fed from a [`Progress`] counter once a second.
///
/// Lines meant for the terminal while the bar is up go through
/// [`ProgressTicker::bar`] so they print above it.
pub struct ProgressTicker {
    progress: Arc<Progress>,
    bar: ProgressBar,
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn start(progress: Arc<Progress>) -> Self {
        let (completed, total) = progress.snapshot();
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_position(completed);
        bar.enable_steady_tick(Duration::from_secs(1));

        let stop = CancellationToken::new();
        let handle = tokio::spawn(tick(Arc::clone(&progress), bar.clone(), stop.clone()));
        ProgressTicker {
            progress,
            bar,
            stop,
            handle,
        }
    }

    pub fn bar(&self) -> ProgressBar {
        self.bar.clone()
    }

    /// Stops the loop and leaves the final count on screen.
    pub async fn close(self) {
        self.stop.cancel();
        let _ = self.handle.await;
        self.bar.set_position(self.progress.snapshot().0);
        self.bar.finish();
    }
}

async fn tick(progress: Arc<Progress>, bar: ProgressBar, stop: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = interval.tick() => bar.set_position(progress.snapshot().0),
        }
    }
}
