use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Problems with the flag values, reported once before any file is read.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} file is required")]
    MissingFile(&'static str),
    #[error("method must be GET or POST, got {0:?}")]
    InvalidMethod(String),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("invalid proxy URL {value:?}: {reason}")]
    InvalidProxy { value: String, reason: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("opening {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid URL at line {line}: {value}")]
    InvalidUrl { line: usize, value: String },
    #[error("invalid parameter name at line {line}: {value} (should not contain = or &)")]
    InvalidParameter { line: usize, value: String },
    #[error("no valid {0} found in file")]
    Empty(&'static str),
}

/// Per-request failure. Never fatal to a scan; the job is counted and skipped.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("building request: {0}")]
    Build(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("executing request: {0}")]
    Send(#[source] reqwest::Error),
    #[error("reading response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else if err.is_builder() {
            TransportError::Build(err.to_string())
        } else {
            TransportError::Send(err)
        }
    }
}
