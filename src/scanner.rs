use std::num::NonZeroU32;
use std::sync::Arc;

use futures::future::join_all;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use log::{debug, error};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::Method;
use crate::http::Transport;
use crate::job::{produce_jobs, Job};
use crate::executor::{execute, Outcome};

/// Receives every finished job exactly once, from whichever worker ran it.
pub trait Reporter: Send + Sync {
    fn record(&self, job: &Job, outcome: &Outcome);
}

impl Reporter for Vec<Arc<dyn Reporter>> {
    fn record(&self, job: &Job, outcome: &Outcome) {
        for reporter in self {
            reporter.record(job, outcome);
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub method: Method,
    pub workers: usize,
    /// Sustained requests per second; the burst allowance is the same number.
    pub rate: NonZeroU32,
    pub retries: u32,
    pub queue_capacity: usize,
}

type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Scans every target against every batch and returns once all workers have exited.
///
/// The returned count is the number of jobs that reached a worker and were
/// executed. It equals `targets x batches x 2` unless `cancel` fired.
pub async fn run(
    settings: &PoolSettings,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn Reporter>,
    targets: mpsc::Receiver<String>,
    batches: Arc<Vec<Vec<String>>>,
    cancel: CancellationToken,
) -> u64 {
    let limiter = Arc::new(RateLimiter::direct(
        Quota::per_second(settings.rate).allow_burst(settings.rate),
    ));
    let (job_tx, job_rx) = mpsc::channel(settings.queue_capacity.max(1));
    let queue: JobQueue = Arc::new(Mutex::new(job_rx));

    let workers: Vec<_> = (0..settings.workers.max(1))
        .map(|id| {
            tokio::spawn(worker(
                id,
                Arc::clone(&queue),
                Arc::clone(&limiter),
                Arc::clone(&transport),
                Arc::clone(&reporter),
                settings.retries,
                cancel.clone(),
            ))
        })
        .collect();
    drop(queue);

    let producer = tokio::spawn(produce_jobs(
        targets,
        batches,
        settings.method,
        job_tx,
        cancel.clone(),
    ));

    let mut processed = 0;
    for joined in join_all(workers).await {
        match joined {
            Ok(n) => processed += n,
            Err(e) => error!("worker task failed: {}", e),
        }
    }
    if let Err(e) = producer.await {
        error!("job producer failed: {}", e);
    }
    processed
}

async fn worker(
    id: usize,
    queue: JobQueue,
    limiter: Arc<DefaultDirectRateLimiter>,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn Reporter>,
    retries: u32,
    cancel: CancellationToken,
) -> u64 {
    let mut processed = 0;
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = next_job(&queue) => match job {
                Some(job) => job,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = limiter.until_ready() => {}
        }

        let outcome = execute(transport.as_ref(), &job, retries, &limiter, &cancel).await;
        reporter.record(&job, &outcome);
        processed += 1;
    }
    debug!("worker {} exiting after {} jobs", id, processed);
    processed
}

async fn next_job(queue: &JobQueue) -> Option<Job> {
    queue.lock().await.recv().await
}
