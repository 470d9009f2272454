use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::debug;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::LoadError;

/// Capacity of the channel between the target feeder and the job producer.
pub const TARGET_BUFFER: usize = 128;

fn read_lines(path: &Path) -> Result<io::Lines<BufReader<File>>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file).lines())
}

/// Non-blank, non-comment lines with their 1-based line numbers, trimmed.
fn entries(path: &Path) -> Result<Vec<(usize, String)>, LoadError> {
    let mut out = Vec::new();
    for (i, line) in read_lines(path)?.enumerate() {
        let line = line.map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        out.push((i + 1, line.to_string()));
    }
    Ok(out)
}

/// Reads target URLs, one per line. Every entry must be an absolute URL.
pub fn load_targets(path: &Path) -> Result<Vec<String>, LoadError> {
    let mut targets = Vec::new();
    for (line, value) in entries(path)? {
        if Url::parse(&value).is_err() {
            return Err(LoadError::InvalidUrl { line, value });
        }
        targets.push(value);
    }
    if targets.is_empty() {
        return Err(LoadError::Empty("paths"));
    }
    Ok(targets)
}

/// Reads parameter names, one per line. Names may not contain `=` or `&`.
pub fn load_parameters(path: &Path) -> Result<Vec<String>, LoadError> {
    let mut parameters = Vec::new();
    for (line, value) in entries(path)? {
        if value.contains('=') || value.contains('&') {
            return Err(LoadError::InvalidParameter { line, value });
        }
        parameters.push(value);
    }
    if parameters.is_empty() {
        return Err(LoadError::Empty("parameters"));
    }
    Ok(parameters)
}

/// Pushes targets into `tx` in order, giving up quietly on cancellation.
pub async fn feed_targets(
    targets: Vec<String>,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    for target in targets {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("target feed cancelled");
                return;
            }
            sent = tx.send(target) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}
