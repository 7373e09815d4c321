//! CLI entry point for the teralink tool.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use teralink_core::config::{ResolverConfig, load_default_file_config, load_file_config};
use teralink_core::{HttpFetcher, ShareResolver, extract_share_links};
use tracing::{debug, info, warn};

mod cli;
mod output;

use cli::Args;

/// Exit status when at least one link failed.
const EXIT_PARTIAL_FAILURE: u8 = 1;
/// Exit status when the input held no share link.
const EXIT_NO_LINKS: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries only rendered results.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(
        inputs = args.inputs.len(),
        json = args.json,
        "CLI arguments parsed"
    );

    let Some(input_text) = read_input(&args)? else {
        output::print_quick_start_guidance();
        return Ok(ExitCode::from(EXIT_NO_LINKS));
    };

    let links = extract_share_links(&input_text);
    if links.is_empty() {
        eprintln!("{}", output::NO_LINKS_GUIDANCE);
        return Ok(ExitCode::from(EXIT_NO_LINKS));
    }
    info!(links = links.len(), "Resolving share links");

    let config = load_config(&args)?;
    if config.cookie.is_empty() {
        warn!("No credential configured (--cookie, TERA_COOKIE or config `cookie`); listing calls may be rejected");
    }

    let fetcher = HttpFetcher::new(&config.fetch_settings(), config.credential())
        .context("Failed to initialize HTTP client")?;
    let resolver = ShareResolver::new(Arc::new(fetcher), config.resolver_settings());

    let outcomes = resolver.resolve_text(&input_text).await;

    if args.json {
        println!("{}", output::render_json(&outcomes)?);
    } else {
        print!("{}", output::render_text(&outcomes));
    }

    let resolved = outcomes.iter().filter(|(_, outcome)| outcome.is_ok()).count();
    info!(
        resolved,
        failed = outcomes.len() - resolved,
        "Resolution complete"
    );

    if output::all_resolved(&outcomes) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    }
}

/// Joins positional inputs, or reads stdin when it is piped. `None` when empty.
fn read_input(args: &Args) -> Result<Option<String>> {
    let text = if !args.inputs.is_empty() {
        args.inputs.join("\n")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        buffer
    } else {
        String::new()
    };

    Ok((!text.trim().is_empty()).then_some(text))
}

/// Defaults < config file < `TERA_COOKIE` < command-line flags.
fn load_config(args: &Args) -> Result<ResolverConfig> {
    let file = match &args.config {
        Some(path) => Some(load_file_config(path)?),
        None => {
            let loaded = load_default_file_config()?;
            if let (Some(path), Some(_)) = (&loaded.path, &loaded.config) {
                debug!(path = %path.display(), "Loaded config file");
            }
            loaded.config
        }
    };

    let mut config = ResolverConfig::default();
    if let Some(file) = &file {
        config = config.with_file(file);
    }
    let mut config = config.with_env().with_cookie(args.cookie.as_deref());

    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(max_depth) = args.max_depth {
        config.max_depth = usize::try_from(max_depth).unwrap_or(usize::MAX);
    }
    if let Some(deadline) = args.deadline {
        config.deadline = Some(Duration::from_secs(deadline));
    }

    debug!(?config, "Effective configuration");
    Ok(config)
}
