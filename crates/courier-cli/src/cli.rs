//! CLI argument parsing with clap

use std::path::PathBuf;

use clap::Parser;

/// courier - run one request through the execution engine
///
/// Without a URL the request goes to a scripted transport that fails a few
/// times before answering, which shows the retry loop at work.
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON file with engine defaults (timeout_ms, retry_count, ...)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Submit asynchronously and wait on the result future
    #[arg(long = "async")]
    pub async_mode: bool,

    /// Retries after the first attempt; overrides the config file
    #[arg(long)]
    pub retries: Option<u32>,

    /// Log body download progress every N bytes
    #[arg(long, value_name = "BYTES")]
    pub progress_step: Option<u64>,

    /// Target URL, sent with reqwest
    pub url: Option<String>,
}
