use std::collections::BTreeMap;

use colored::*;
use indicatif::ProgressBar;

use crate::collector::ScanResult;
use crate::config::Method;
use crate::executor::Outcome;
use crate::job::Job;
use crate::payload::Payload;
use crate::scanner::Reporter;
use crate::utils::{form_body, inject_query, print_error};

/// Prints each reflection the moment a worker finds it; in verbose mode also
/// every request with its status.
pub struct ConsoleReporter {
    verbose: bool,
    bar: Option<ProgressBar>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        ConsoleReporter { verbose, bar: None }
    }

    /// Prints above `bar` instead of writing to stdout directly.
    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.bar = Some(bar);
        self
    }

    fn emit(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }

    fn request_line(&self, job: &Job, status_code: u16) {
        let status = status_code.to_string();
        let status = match status_code {
            s if s >= 400 => status.red(),
            s if s >= 300 => status.yellow(),
            _ => status.green(),
        };
        self.emit(format!(
            "[{}] {} {}",
            status,
            job.method,
            target_for(job, &job.payloads)
        ));
        if job.method == Method::Post {
            self.emit(format!("    Body: {}", form_body(&job.payloads)));
        }
    }
}

/// The URL as it was requested: with injected query for GET, as-is for POST.
fn target_for(job: &Job, payloads: &[Payload]) -> String {
    match job.method {
        Method::Get => inject_query(&job.url, payloads)
            .map(String::from)
            .unwrap_or_else(|_| job.url.clone()),
        Method::Post => job.url.clone(),
    }
}

pub fn reflection_notice(job: &Job, payload: &Payload) -> String {
    let tag = "REFLECTED".red();
    let method = job.method.as_str().green();
    match job.method {
        Method::Get => format!(
            "[{}] [{}] {}",
            tag,
            method,
            target_for(job, std::slice::from_ref(payload))
        ),
        Method::Post => format!(
            "[{}] [{}] {}\n{}={}",
            tag, method, job.url, payload.parameter, payload.value
        ),
    }
}

impl Reporter for ConsoleReporter {
    fn record(&self, job: &Job, outcome: &Outcome) {
        match outcome {
            Outcome::Failed(err) => {
                let what = format!("[{}] {} {}", "ERROR".red(), job.method, job.url);
                print_error(self.verbose, &what, err);
            }
            Outcome::Skipped {
                status_code,
                content_type,
            } => {
                if self.verbose {
                    self.request_line(job, *status_code);
                    self.emit(format!("    Skipped: content type {}", content_type));
                }
            }
            Outcome::Checked {
                status_code,
                reflected,
            } => {
                if self.verbose {
                    self.request_line(job, *status_code);
                }
                for (payload, hit) in job.payloads.iter().zip(reflected) {
                    if *hit {
                        self.emit(reflection_notice(job, payload));
                    }
                }
            }
        }
    }
}

/// End-of-run summary of reflected results, grouped by URL.
pub fn write_console_report(results: &[ScanResult]) {
    let mut reflected: Vec<&ScanResult> = results.iter().filter(|r| r.reflected).collect();
    if reflected.is_empty() {
        println!("[!] No XSS reflections found");
        return;
    }

    reflected.sort_by(|a, b| (&a.url, &a.parameter).cmp(&(&b.url, &b.parameter)));

    let mut by_url: BTreeMap<&str, Vec<&ScanResult>> = BTreeMap::new();
    for result in &reflected {
        by_url.entry(result.url.as_str()).or_default().push(result);
    }

    println!("\n{}", "REFLECTION SUMMARY".cyan());
    println!("{}", "==================".cyan());
    for (url, hits) in by_url {
        println!("\n{} ({} reflections)", url.blue(), hits.len());
        for hit in hits {
            println!("  └─ {} [{}]: {}", hit.parameter.yellow(), hit.method, hit.payload);
        }
    }
    println!(
        "\n{}",
        format!("Total reflections found: {}", reflected.len()).red()
    );
    println!("Please verify these findings manually.");
}
