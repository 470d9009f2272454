use std::sync::RwLock;

use crate::executor::Outcome;
use crate::job::Job;
use crate::scanner::Reporter;

/// One (job, payload) outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub url: String,
    pub method: String,
    pub parameter: String,
    pub payload: String,
    pub reflected: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

/// Append-only result store shared by all workers.
#[derive(Debug, Default)]
pub struct Collector {
    results: RwLock<Vec<ScanResult>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&self, result: ScanResult) {
        self.results
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(result);
    }

    /// Point-in-time copy of everything recorded so far.
    pub fn results(&self) -> Vec<ScanResult> {
        self.results
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn reflected(&self) -> Vec<ScanResult> {
        self.results()
            .into_iter()
            .filter(|r| r.reflected)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.results
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Reporter for Collector {
    fn record(&self, job: &Job, outcome: &Outcome) {
        let error = match outcome {
            Outcome::Failed(err) => Some(err.to_string()),
            _ => None,
        };
        let rows: Vec<ScanResult> = job
            .payloads
            .iter()
            .enumerate()
            .map(|(i, p)| ScanResult {
                url: job.url.clone(),
                method: job.method.to_string(),
                parameter: p.parameter.clone(),
                payload: p.value.clone(),
                reflected: match outcome {
                    Outcome::Checked { reflected, .. } => reflected.get(i).copied().unwrap_or(false),
                    _ => false,
                },
                status_code: outcome.status_code(),
                error: error.clone(),
            })
            .collect();

        self.results
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Method;
    use crate::error::TransportError;
    use crate::job::jobs_for;

    #[test]
    fn records_one_row_per_payload() {
        let collector = Collector::new();
        let job = jobs_for("http://a.test/", &["q".to_string(), "id".to_string()], Method::Get)
            .remove(0);
        collector.record(
            &job,
            &Outcome::Checked {
                status_code: 200,
                reflected: vec![false, true],
            },
        );
        let results = collector.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].parameter, "q");
        assert!(!results[0].reflected);
        assert_eq!(results[1].parameter, "id");
        assert!(results[1].reflected);
        assert_eq!(results[1].status_code, Some(200));
        assert_eq!(collector.reflected().len(), 1);
    }

    #[test]
    fn failures_carry_the_error() {
        let collector = Collector::new();
        let job = jobs_for("http://a.test/", &["q".to_string()], Method::Post).remove(1);
        collector.record(
            &job,
            &Outcome::Failed(TransportError::Other("connection refused".to_string())),
        );
        let results = collector.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].method, "POST");
        assert_eq!(results[0].status_code, None);
        assert_eq!(results[0].error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn snapshot_is_detached() {
        let collector = Collector::new();
        let before = collector.results();
        collector.add_result(ScanResult {
            url: "http://a.test/".to_string(),
            method: "GET".to_string(),
            parameter: "q".to_string(),
            payload: "769\">1d".to_string(),
            reflected: true,
            status_code: Some(200),
            error: None,
        });
        assert!(before.is_empty());
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let collector = Arc::new(Collector::new());
        let threads: Vec<_> = (0..16)
            .map(|t| {
                let collector = Arc::clone(&collector);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        collector.add_result(ScanResult {
                            url: format!("http://{}.test/", t),
                            method: "GET".to_string(),
                            parameter: format!("p{}", i),
                            payload: String::new(),
                            reflected: false,
                            status_code: None,
                            error: None,
                        });
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(collector.len(), 1600);
    }
}
