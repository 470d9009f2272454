use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{redirect, Client, Proxy};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::config::Method;
use crate::error::TransportError;
use crate::payload::Payload;
use crate::utils::{form_body, inject_query};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:15.0) Gecko/20100101 Firefox/15.0.1";

/// Responses are cut off after this many body bytes.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
    /// Raw `Content-Type` header, `None` when the server sent none.
    pub content_type: Option<String>,
}

/// Sends one request carrying `payloads` to `url`.
///
/// GET requests put the payloads in the query string, POST requests send them
/// as a form body to the unmodified URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        payloads: &[Payload],
    ) -> Result<Response, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub insecure: bool,
    pub max_conns_per_host: usize,
    pub max_body_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            timeout: Duration::from_secs(15),
            proxy: None,
            insecure: false,
            max_conns_per_host: 20,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}

pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    max_body_bytes: usize,
    max_conns_per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HttpTransport {
    pub fn new(settings: HttpSettings) -> Result<Self, TransportError> {
        // a proxy always implies insecure
        let insecure = settings.insecure || settings.proxy.is_some();
        if settings.proxy.is_some() && !settings.insecure {
            warn!("auto-enabling insecure mode for proxy");
        }

        let mut builder = Client::builder()
            // one job is one request; a 3xx body is checked like any other
            .redirect(redirect::Policy::none())
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(insecure);

        if let Some(proxy) = &settings.proxy {
            let proxy = Proxy::all(proxy.as_str()).map_err(|e| TransportError::Build(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(HttpTransport {
            client,
            timeout: settings.timeout,
            max_body_bytes: settings.max_body_bytes,
            max_conns_per_host: settings.max_conns_per_host.max(1),
            hosts: Mutex::new(HashMap::new()),
        })
    }

    async fn host_permit(&self, url: &str) -> Result<OwnedSemaphorePermit, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::Build(format!("{}: {}", url, e)))?;
        let key = format!(
            "{}:{}",
            parsed.host_str().unwrap_or_default(),
            parsed.port_or_known_default().unwrap_or_default()
        );
        let semaphore = {
            let mut hosts = self
                .hosts
                .lock()
                .map_err(|_| TransportError::Other("host table poisoned".to_string()))?;
            Arc::clone(
                hosts
                    .entry(key)
                    .or_insert_with(|| Arc::new(Semaphore::new(self.max_conns_per_host))),
            )
        };
        semaphore
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Other(format!("host limiter for {} closed", url)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        payloads: &[Payload],
    ) -> Result<Response, TransportError> {
        let _permit = self.host_permit(url).await?;

        let request = match method {
            Method::Get => {
                let target =
                    inject_query(url, payloads).map_err(|e| TransportError::Build(e.to_string()))?;
                self.client.get(target)
            }
            Method::Post => self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form_body(payloads)),
        };

        let mut response = request
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.timeout))?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Body(e)
            }
        })? {
            let room = self.max_body_bytes - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= self.max_body_bytes {
                debug!("truncated response body from {} at {} bytes", url, body.len());
                break;
            }
        }

        Ok(Response {
            status_code,
            body,
            content_type,
        })
    }
}
