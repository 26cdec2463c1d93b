use clap::Parser;
use std::path::PathBuf;

/// SentinelOne Exporter
///
/// Pulls sites, policies, exclusions, deployment packs, agents, rules, alerts
/// and API tokens from the management console and writes each to a CSV file.
///
/// The API token is read from S1_API_TOKEN, falling back to API_TOKEN.
#[derive(Parser, Debug)]
#[command(name = "s1-export")]
#[command(author, version)]
pub struct Args {
    /// Output directory for CSV files and logs [env: S1_OUTPUT_DIR] [default: output]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only export these endpoints (default: all)
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    pub endpoints: Option<Vec<String>>,

    /// Optional TOML settings file (retry, timeouts, export options)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List the supported endpoints and exit
    #[arg(long)]
    pub list_endpoints: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
