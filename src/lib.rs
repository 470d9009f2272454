pub mod batcher;
pub mod collector;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod job;
pub mod loader;
pub mod opt;
pub mod payload;
pub mod progress;
pub mod reflect;
pub mod scanner;
pub mod summary;
pub mod utils;
