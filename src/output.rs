//! CLI output formatting: text cards and JSON.

use anyhow::Result;
use serde::Serialize;
use teralink_core::{FileDescriptor, Resolution, ResolveError};

/// Message when no input was provided at all.
pub const NO_INPUT_GUIDANCE: &str = "No input provided. Pipe text via stdin or pass it as arguments.";

/// Example for piping input.
pub const INPUT_PIPE_EXAMPLE: &str = "Example: echo 'https://terabox.com/s/1AbC' | teralink";

/// Example for passing links as arguments.
pub const INPUT_ARG_EXAMPLE: &str = "Example: teralink https://terabox.com/s/1AbC";

/// Message when the input contained no share link.
pub const NO_LINKS_GUIDANCE: &str = "No supported share link found in input.";

/// Thumbnail shown for files without a generated preview.
pub const PLACEHOLDER_THUMBNAIL: &str = "https://via.placeholder.com/500x300?text=No+Thumbnail";

/// One resolved link together with its outcome.
pub type Outcome = (String, Result<Resolution, ResolveError>);

/// Prints quick-start guidance to stderr.
pub fn print_quick_start_guidance() {
    for line in [NO_INPUT_GUIDANCE, INPUT_PIPE_EXAMPLE, INPUT_ARG_EXAMPLE] {
        eprintln!("{line}");
    }
}

/// Renders one card per file, and one `Error:` line per failed link.
pub fn render_text(outcomes: &[Outcome]) -> String {
    let mut blocks = Vec::new();
    for (link, outcome) in outcomes {
        match outcome {
            Ok(resolution) => blocks.extend(resolution.files.iter().map(file_card)),
            Err(error) => blocks.push(format!("Link: {link}\nError: {error}")),
        }
    }
    let mut rendered = blocks.join("\n\n");
    if !rendered.is_empty() {
        rendered.push('\n');
    }
    rendered
}

fn file_card(file: &FileDescriptor) -> String {
    format!(
        "Name:      {}\nSize:      {}\nLink:      {}\nThumbnail: {}",
        file.display_name,
        file.human_size,
        file.download_link,
        file.thumbnail_url.as_deref().unwrap_or(PLACEHOLDER_THUMBNAIL),
    )
}

#[derive(Serialize)]
#[serde(untagged)]
enum JsonOutcome<'a> {
    Resolved {
        link: &'a str,
        files: &'a [FileDescriptor],
    },
    Failed {
        link: &'a str,
        error: String,
        kind: &'static str,
        retryable: bool,
    },
}

/// Renders all outcomes as a pretty-printed JSON array.
pub fn render_json(outcomes: &[Outcome]) -> Result<String> {
    let entries: Vec<JsonOutcome<'_>> = outcomes
        .iter()
        .map(|(link, outcome)| match outcome {
            Ok(resolution) => JsonOutcome::Resolved {
                link,
                files: &resolution.files,
            },
            Err(error) => JsonOutcome::Failed {
                link,
                error: error.to_string(),
                kind: error.kind(),
                retryable: error.is_retryable(),
            },
        })
        .collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}

/// True when every link resolved.
pub fn all_resolved(outcomes: &[Outcome]) -> bool {
    outcomes.iter().all(|(_, outcome)| outcome.is_ok())
}
