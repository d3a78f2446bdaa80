// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Output file names derived from document content.
//!
//! Exported files are named after what they contain:
//!
//! ```text
//! {prefix}-{title}-{YYYY-MM-DD}.{extension}
//! ```
//!
//! The title is the first heading in the Markdown, or the start of its plain
//! text when there is no heading. It is stripped of characters that are not
//! allowed in file names on common platforms and capped at
//! [`MAX_TITLE_CHARS`] characters.

use crate::parser::is_closing_fence;
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Longest title, in characters, that goes into a file name.
pub const MAX_TITLE_CHARS: usize = 40;

/// Title used when the document has no usable text.
pub const FALLBACK_TITLE: &str = "export";

static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s+(.+)$").expect("valid heading pattern"));
static LINK_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid link pattern"));
static MARKER_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#>*`_-]").expect("valid marker pattern"));
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("valid unsafe pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Builds the output file name for a document.
///
/// # Arguments
///
/// * `markdown` - The source text the title is taken from
/// * `prefix` - Leading name component, such as `chat`
/// * `date` - Date stamped into the name
/// * `extension` - File extension without the dot
///
/// # Example
///
/// ```
/// use chatmd2pdf::naming::file_name;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
///
/// assert_eq!(
///     file_name("# Plan: Q2 / Q3\n\nbody", "chat", date, "pdf"),
///     "chat-Plan Q2 Q3-2025-03-09.pdf"
/// );
/// ```
#[must_use]
pub fn file_name(markdown: &str, prefix: &str, date: NaiveDate, extension: &str) -> String {
    format!(
        "{prefix}-{}-{}.{extension}",
        title_for(markdown),
        date.format("%Y-%m-%d")
    )
}

/// Returns the sanitized title for a document.
///
/// Never empty: falls back to [`FALLBACK_TITLE`].
#[must_use]
pub fn title_for(markdown: &str) -> String {
    let raw = first_heading(markdown).map_or_else(|| plain_text_prefix(markdown), str::to_owned);
    let title = sanitize(&raw);
    if title.is_empty() {
        FALLBACK_TITLE.to_owned()
    } else {
        title
    }
}

/// File names handed out during one run.
///
/// Two documents with the same title and date produce the same
/// [`file_name`]. Claiming names through this set keeps the second from
/// replacing the first: repeats get a ` (2)`, ` (3)`, ... counter before the
/// extension.
///
/// # Example
///
/// ```
/// use chatmd2pdf::naming::UniqueNames;
///
/// let mut names = UniqueNames::default();
///
/// assert_eq!(names.claim("chat-Summary-2025-03-09.pdf", "pdf"), "chat-Summary-2025-03-09.pdf");
/// assert_eq!(names.claim("chat-Summary-2025-03-09.pdf", "pdf"), "chat-Summary-2025-03-09 (2).pdf");
/// ```
#[derive(Debug, Default)]
pub struct UniqueNames {
    claimed: HashSet<String>,
}

impl UniqueNames {
    /// Returns `file_name`, or a numbered variant of it if it was already
    /// claimed.
    pub fn claim(&mut self, file_name: &str, extension: &str) -> String {
        let dotted = format!(".{extension}");
        let (stem, extension) = file_name
            .strip_suffix(&dotted)
            .map_or((file_name, ""), |stem| (stem, dotted.as_str()));

        let mut candidate = file_name.to_owned();
        let mut counter = 1;
        while !self.claimed.insert(candidate.clone()) {
            counter += 1;
            candidate = format!("{stem} ({counter}){extension}");
        }
        candidate
    }
}

/// Finds the text of the first heading outside fenced code.
fn first_heading(markdown: &str) -> Option<&str> {
    let mut in_fence = false;
    for line in markdown.lines() {
        let trimmed = line.trim();
        if in_fence {
            in_fence = !is_closing_fence(trimmed);
            continue;
        }
        if trimmed.starts_with("```") {
            in_fence = true;
            continue;
        }
        if let Some(text) = HEADING_LINE.captures(trimmed).and_then(|caps| caps.get(1)) {
            return Some(text.as_str());
        }
    }
    None
}

/// Reduces Markdown to its leading plain text.
///
/// Links keep their label; marker characters are dropped.
fn plain_text_prefix(markdown: &str) -> String {
    let text = LINK_SYNTAX.replace_all(markdown, "$1");
    let text = MARKER_CHARS.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().chars().take(MAX_TITLE_CHARS).collect()
}

fn sanitize(title: &str) -> String {
    let title = UNSAFE_CHARS.replace_all(title, "");
    let title = WHITESPACE.replace_all(&title, " ");
    let truncated: String = title.trim().chars().take(MAX_TITLE_CHARS).collect();
    truncated.trim_end().to_owned()
}
