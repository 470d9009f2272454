use std::io::{self, Write};
use std::num::NonZeroU32;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use colored::*;
use log::warn;
use rand::seq::SliceRandom;
use structopt::StructOpt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use xssbatch::batcher::create_batches;
use xssbatch::collector::Collector;
use xssbatch::config::ScanConfig;
use xssbatch::http::{HttpSettings, HttpTransport, MAX_BODY_BYTES};
use xssbatch::loader::{feed_targets, load_parameters, load_targets, TARGET_BUFFER};
use xssbatch::opt::Opt;
use xssbatch::payload::Variant;
use xssbatch::progress::{Progress, ProgressTicker};
use xssbatch::scanner::{self, PoolSettings, Reporter};
use xssbatch::summary::{write_console_report, ConsoleReporter};

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();
    env_logger::Builder::new()
        .filter_level(if opt.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    println!("{}", "XSSBATCH - Starting scan...".green().bold());

    let config = match ScanConfig::try_from(opt) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Configuration error".red(), e);
            process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(handle_shutdown(cancel.clone()));

    if let Err(e) = run(config, cancel).await {
        eprintln!("{}: {:#}", "Scan failed".red(), e);
        process::exit(1);
    }
}

async fn handle_shutdown(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    println!("\n[!] Received interrupt signal, shutting down gracefully...");
    cancel.cancel();
}

async fn run(config: ScanConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    print!("[+] Loading input files...");
    let _ = io::stdout().flush();
    let mut targets = load_targets(&config.paths_file).context("loading paths")?;
    if config.shuffle {
        targets.shuffle(&mut rand::thread_rng());
    }
    let parameters = load_parameters(&config.parameters_file).context("loading parameters")?;
    println!(" Done");

    let batches = create_batches(&parameters, config.batch_size);
    let total = targets.len() * batches.len() * Variant::ALL.len();

    println!("[+] Loaded:");
    println!("    • {} paths", targets.len());
    println!("    • {} parameters", parameters.len());
    println!(
        "    • {} chunks (parameters/chunk size: {}/{})",
        batches.len(),
        parameters.len(),
        config.batch_size
    );
    println!(
        "    • {} HTTP requests total ({} paths × {} chunks × 2 variants)",
        total,
        targets.len(),
        batches.len()
    );

    let transport = HttpTransport::new(HttpSettings {
        timeout: config.timeout,
        proxy: config.proxy.clone(),
        insecure: config.insecure,
        max_conns_per_host: config.workers,
        max_body_bytes: MAX_BODY_BYTES,
    })
    .context("building HTTP client")?;
    if let Some(proxy) = &config.proxy {
        println!("[+] Using proxy: {}", proxy);
    }

    let settings = PoolSettings {
        method: config.method,
        workers: config.workers,
        rate: NonZeroU32::new(config.rate).context("concurrency must be positive")?,
        retries: config.retries,
        queue_capacity: config.queue_capacity,
    };

    println!(
        "[+] Starting {} RPS with {} workers...",
        config.rate, config.workers
    );
    if config.verbose {
        println!("[+] Verbose mode enabled - showing all requests");
    }
    println!("[+] Reflections will be reported immediately as found:");

    let collector = Arc::new(Collector::new());
    let progress = Arc::new(Progress::new(total as u64));
    // the bar would bury the per-request lines
    let ticker = if config.verbose {
        None
    } else {
        Some(ProgressTicker::start(progress.clone()))
    };
    let console = match &ticker {
        Some(ticker) => ConsoleReporter::new(config.verbose).with_progress_bar(ticker.bar()),
        None => ConsoleReporter::new(config.verbose),
    };
    let reporters: Vec<Arc<dyn Reporter>> = vec![
        collector.clone() as Arc<dyn Reporter>,
        progress.clone() as Arc<dyn Reporter>,
        Arc::new(console) as Arc<dyn Reporter>,
    ];

    let (target_tx, target_rx) = mpsc::channel(TARGET_BUFFER);
    let feeder = tokio::spawn(feed_targets(targets, target_tx, cancel.clone()));

    let processed = scanner::run(
        &settings,
        Arc::new(transport),
        Arc::new(reporters),
        target_rx,
        Arc::new(batches),
        cancel.clone(),
    )
    .await;
    feeder.await.context("target feeder")?;

    if let Some(ticker) = ticker {
        ticker.close().await;
    }
    if cancel.is_cancelled() {
        println!(
            "[!] Scan interrupted after {} of {} requests",
            processed, total
        );
    }

    write_console_report(&collector.results());
    println!("\n[+] Scan completed.");
    Ok(())
}
