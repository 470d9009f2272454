use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "xssbatch",
    about = "Batched reflected-XSS discovery: injects per-parameter markers and reports unescaped reflections"
)]
pub struct Opt {
    #[structopt(short = "p", long, parse(from_os_str), help = "File with target URLs (one per line)")]
    pub paths: Option<PathBuf>,

    #[structopt(short = "P", long, parse(from_os_str), help = "File with parameter names (one per line)")]
    pub parameters: Option<PathBuf>,

    #[structopt(short, long, default_value = "GET", help = "HTTP method (GET or POST)")]
    pub method: String,

    #[structopt(short, long, default_value = "20", help = "Max requests per second")]
    pub concurrency: i64,

    #[structopt(short = "b", long, default_value = "5", help = "Number of parameters per request")]
    pub parameter_batch: i64,

    #[structopt(short, long, default_value = "15", help = "Client timeout per request, in seconds")]
    pub timeout: u64,

    #[structopt(long, help = "Optional upstream proxy (e.g. 127.0.0.1:8080)")]
    pub proxy: Option<String>,

    #[structopt(short, long, default_value = "0", help = "Number of workers (default: concurrency)")]
    pub workers: usize,

    #[structopt(long, default_value = "1000", help = "Capacity of the pending job queue")]
    pub queue_size: usize,

    #[structopt(short = "k", long, help = "Ignore TLS certificate errors")]
    pub insecure: bool,

    #[structopt(long, default_value = "0", help = "Number of retries on transport failure")]
    pub retries: u32,

    #[structopt(short, long, help = "Show all requests and HTTP status codes")]
    pub verbose: bool,

    #[structopt(long, help = "Scan targets in file order instead of shuffling them")]
    pub no_shuffle: bool,
}
