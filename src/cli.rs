//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Resolve cloud-storage share links into direct download links.
///
/// Share links are discovered anywhere in the input text; each one is
/// resolved independently, folders are crawled recursively.
#[derive(Parser, Debug)]
#[command(name = "teralink")]
#[command(author, version, about)]
pub struct Args {
    /// Text containing share links (reads stdin when omitted)
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Print results as JSON instead of text cards
    #[arg(long)]
    pub json: bool,

    /// Long-lived account credential (overrides TERA_COOKIE and the config file)
    #[arg(long, value_name = "VALUE")]
    pub cookie: Option<String>,

    /// Config file path (defaults to $XDG_CONFIG_HOME/teralink/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Attempts per HTTP request before giving up (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Deepest sub-folder level to crawl (1-64)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=64))]
    pub max_depth: Option<u64>,

    /// Overall deadline per link in seconds (1-3600)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub deadline: Option<u64>,
}
