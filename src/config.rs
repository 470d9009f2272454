use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::opt::Opt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            _ => Err(ConfigError::InvalidMethod(s.to_string())),
        }
    }
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub paths_file: PathBuf,
    pub parameters_file: PathBuf,
    pub method: Method,
    /// Requests per second, also the limiter's burst size.
    pub rate: u32,
    pub workers: usize,
    /// Jobs buffered ahead of the workers before the producer has to wait.
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub insecure: bool,
    pub retries: u32,
    pub verbose: bool,
    pub shuffle: bool,
}

impl TryFrom<Opt> for ScanConfig {
    type Error = ConfigError;

    fn try_from(opt: Opt) -> Result<Self, Self::Error> {
        let paths_file = opt.paths.ok_or(ConfigError::MissingFile("paths"))?;
        let parameters_file = opt.parameters.ok_or(ConfigError::MissingFile("parameters"))?;
        let method: Method = opt.method.parse()?;

        if opt.concurrency <= 0 {
            return Err(ConfigError::NotPositive("concurrency"));
        }
        if opt.parameter_batch <= 0 {
            return Err(ConfigError::NotPositive("parameter-batch"));
        }
        if opt.queue_size == 0 {
            return Err(ConfigError::NotPositive("queue-size"));
        }
        if opt.timeout == 0 {
            return Err(ConfigError::NotPositive("timeout"));
        }
        let rate = u32::try_from(opt.concurrency).unwrap_or(u32::MAX);
        let batch_size = usize::try_from(opt.parameter_batch).unwrap_or(usize::MAX);

        let workers = if opt.workers == 0 {
            rate as usize
        } else {
            opt.workers
        };

        let proxy = opt
            .proxy
            .filter(|p| !p.trim().is_empty())
            .map(|p| normalize_proxy(&p))
            .transpose()?;

        Ok(ScanConfig {
            paths_file,
            parameters_file,
            method,
            rate,
            workers,
            queue_capacity: opt.queue_size,
            batch_size,
            timeout: Duration::from_secs(opt.timeout),
            proxy,
            insecure: opt.insecure,
            retries: opt.retries,
            verbose: opt.verbose,
            shuffle: !opt.no_shuffle,
        })
    }
}

/// Adds `http://` when the scheme is missing and checks the result parses.
fn normalize_proxy(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let proxy = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    url::Url::parse(&proxy).map_err(|e| ConfigError::InvalidProxy {
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(proxy)
}
