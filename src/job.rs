use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Method;
use crate::payload::{generate_payloads, Payload, Variant};

/// One HTTP request: a target, a parameter batch, and that batch's markers for one variant.
#[derive(Debug, Clone)]
pub struct Job {
    pub url: String,
    pub parameters: Vec<String>,
    pub payloads: Vec<Payload>,
    pub variant: Variant,
    pub method: Method,
}

/// Jobs for a single (url, batch) pair, double-quote variant first.
pub fn jobs_for(url: &str, batch: &[String], method: Method) -> Vec<Job> {
    let payloads = generate_payloads(batch);
    Variant::ALL
        .into_iter()
        .filter_map(|variant| {
            let subset: Vec<Payload> = payloads
                .iter()
                .filter(|p| p.variant == variant)
                .cloned()
                .collect();
            if subset.is_empty() {
                return None;
            }
            Some(Job {
                url: url.to_string(),
                parameters: batch.to_vec(),
                payloads: subset,
                variant,
                method,
            })
        })
        .collect()
}

/// Crosses every incoming target with every batch and pushes the jobs downstream.
///
/// Targets are handled in arrival order and batches in their original order.
/// `send` waits while the queue is full; cancellation abandons the rest
/// without error. Dropping `jobs` on return closes the queue for the workers.
pub async fn produce_jobs(
    mut targets: mpsc::Receiver<String>,
    batches: Arc<Vec<Vec<String>>>,
    method: Method,
    jobs: mpsc::Sender<Job>,
    cancel: CancellationToken,
) {
    loop {
        let url = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = targets.recv() => match next {
                Some(url) => url,
                None => return,
            },
        };

        for batch in batches.iter() {
            for job in jobs_for(&url, batch, method) {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("job producer cancelled at {}", url);
                        return;
                    }
                    sent = jobs.send(job) => {
                        if sent.is_err() {
                            // every worker is gone
                            return;
                        }
                    }
                }
            }
        }
    }
}
