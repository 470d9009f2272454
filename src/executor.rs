use governor::DefaultDirectRateLimiter;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::http::Transport;
use crate::job::Job;
use crate::reflect::check_reflections;

#[derive(Debug)]
pub enum Outcome {
    /// The body was searched; one flag per job payload, in payload order.
    Checked { status_code: u16, reflected: Vec<bool> },
    /// A non-HTML content type; no reflection check was made.
    Skipped { status_code: u16, content_type: String },
    /// The last attempt failed at the transport level.
    Failed(TransportError),
}

impl Outcome {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Outcome::Checked { status_code, .. } | Outcome::Skipped { status_code, .. } => {
                Some(*status_code)
            }
            Outcome::Failed(_) => None,
        }
    }

    pub fn reflected_count(&self) -> usize {
        match self {
            Outcome::Checked { reflected, .. } => reflected.iter().filter(|r| **r).count(),
            _ => 0,
        }
    }
}

/// Whether a response with this `Content-Type` should be searched.
///
/// A missing or blank header is searched; anything else must mention "html"
/// in any letter case.
pub fn is_html(content_type: Option<&str>) -> bool {
    match content_type.map(str::trim) {
        None | Some("") => true,
        Some(ct) => ct.to_ascii_lowercase().contains("html"),
    }
}

/// Runs one job against `transport`, re-sending up to `retries` more times on
/// transport errors.
///
/// The caller takes the limiter token for the first attempt; every retry takes
/// its own. No retry is started once `cancel` has fired.
pub async fn execute(
    transport: &dyn Transport,
    job: &Job,
    retries: u32,
    limiter: &DefaultDirectRateLimiter,
    cancel: &CancellationToken,
) -> Outcome {
    let mut attempt = 0;
    let response = loop {
        match transport.request(job.method, &job.url, &job.payloads).await {
            Ok(response) => break response,
            Err(err) => {
                if attempt >= retries || cancel.is_cancelled() {
                    debug!("{} {} failed: {}", job.method, job.url, err);
                    return Outcome::Failed(err);
                }
                attempt += 1;
                debug!(
                    "{} {} failed ({}), retry {}/{}",
                    job.method, job.url, err, attempt, retries
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Outcome::Failed(err),
                    _ = limiter.until_ready() => {}
                }
            }
        }
    };

    if !is_html(response.content_type.as_deref()) {
        let content_type = response.content_type.unwrap_or_default();
        debug!("skipping {} ({})", job.url, content_type);
        return Outcome::Skipped {
            status_code: response.status_code,
            content_type,
        };
    }

    Outcome::Checked {
        status_code: response.status_code,
        reflected: check_reflections(&response.body, &job.payloads),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use governor::{Quota, RateLimiter};

    use crate::config::Method;
    use crate::http::Response;
    use crate::job::jobs_for;
    use crate::payload::Payload;

    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        content_type: Option<&'static str>,
    }

    #[async_trait]
    impl Transport for Flaky {
        async fn request(
            &self,
            _method: Method,
            _url: &str,
            payloads: &[Payload],
        ) -> Result<Response, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(TransportError::Other("connection refused".to_string()));
            }
            Ok(Response {
                status_code: 200,
                body: format!("<b>{}</b>", payloads[0].value).into_bytes(),
                content_type: self.content_type.map(str::to_string),
            })
        }
    }

    fn limiter(rate: u32) -> DefaultDirectRateLimiter {
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(rate).unwrap()))
    }

    fn failing(failures: usize) -> Flaky {
        Flaky {
            failures,
            calls: AtomicUsize::new(0),
            content_type: None,
        }
    }

    async fn unthrottled(transport: &Flaky, retries: u32) -> Outcome {
        execute(transport, &job(), retries, &limiter(1_000), &CancellationToken::new()).await
    }

    fn job() -> Job {
        jobs_for("http://a.test/", &["q".to_string(), "id".to_string()], Method::Get).remove(0)
    }

    #[test]
    fn content_type_classification() {
        assert!(is_html(None));
        assert!(is_html(Some("")));
        assert!(is_html(Some("text/html")));
        assert!(is_html(Some("text/HTML; charset=utf-8")));
        assert!(is_html(Some("application/xhtml+xml")));
        assert!(!is_html(Some("application/json")));
        // substring match, so a stray "html" anywhere counts
        assert!(is_html(Some("text/plain; name=html-export")));
        assert!(!is_html(Some("image/png")));
        assert!(!is_html(Some("charset=utf-8")));
    }

    #[tokio::test]
    async fn first_payload_reflected() {
        let transport = Flaky {
            failures: 0,
            calls: AtomicUsize::new(0),
            content_type: Some("text/html"),
        };
        let outcome = unthrottled(&transport, 0).await;
        match outcome {
            Outcome::Checked { status_code, reflected } => {
                assert_eq!(status_code, 200);
                assert_eq!(reflected, vec![true, false]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_html_is_skipped() {
        let transport = Flaky {
            failures: 0,
            calls: AtomicUsize::new(0),
            content_type: Some("application/json"),
        };
        let outcome = unthrottled(&transport, 0).await;
        assert!(matches!(outcome, Outcome::Skipped { status_code: 200, .. }));
        assert_eq!(outcome.reflected_count(), 0);
    }

    #[tokio::test]
    async fn retries_transport_errors() {
        let transport = failing(2);
        let outcome = unthrottled(&transport, 2).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.reflected_count(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_retries() {
        let transport = failing(5);
        let outcome = unthrottled(&transport, 1).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(outcome.status_code(), None);
    }

    #[tokio::test]
    async fn no_retry_after_cancel() {
        let transport = failing(5);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = execute(&transport, &job(), 3, &limiter(1_000), &cancel).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, Outcome::Failed(_)));
    }

    #[tokio::test]
    async fn each_retry_waits_for_a_token() {
        let limiter = limiter(1);
        // the caller's token for the first attempt
        assert!(limiter.check().is_ok());
        let transport = failing(1);
        let start = Instant::now();
        let outcome = execute(&transport, &job(), 1, &limiter, &CancellationToken::new()).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.reflected_count(), 1);
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test]
    async fn cancel_interrupts_retry_wait() {
        let limiter = limiter(1);
        assert!(limiter.check().is_ok());
        let transport = failing(5);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let start = Instant::now();
        let outcome = execute(&transport, &job(), 3, &limiter, &cancel).await;
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, Outcome::Failed(_)));
    }
}
