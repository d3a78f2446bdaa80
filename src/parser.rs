// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Line-oriented Markdown parsing for chat exports.
//!
//! This module turns the Markdown text copied out of a chat message into an
//! ordered list of [`Block`]s. It is deliberately small: it understands the
//! subset of Markdown that chat assistants actually produce (headings,
//! paragraphs, flat lists, blockquotes, fenced code, and pipe tables) and
//! degrades anything else to paragraph text instead of failing.
//!
//! # Parsing Model
//!
//! The input is walked once, line by line, with a single line of lookahead.
//! At most one buffer is open at a time (a paragraph, a list of one kind, a
//! blockquote, or a code fence). Any line that starts a different construct
//! closes the open buffer first, so blocks come out in reading order.
//!
//! Inline formatting is resolved once, when a buffer closes, by
//! [`format_inline`]. The result is an opaque [`Inline`] value that is never
//! scanned again.
//!
//! # Example
//!
//! ```
//! use chatmd2pdf::parser::{parse, Block};
//!
//! let blocks = parse("# Notes\n\n- first\n- second");
//!
//! assert_eq!(blocks.len(), 2);
//! assert!(matches!(&blocks[0], Block::Heading { level: 1, .. }));
//! assert!(matches!(&blocks[1], Block::BulletList { items } if items.len() == 2));
//! ```

use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Opens a placeholder token. Private-use code points never appear in
/// Markdown syntax, so emphasis scanning cannot see inside a token.
const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

static CODE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid code span pattern"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link pattern"));
static STRONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").expect("valid strong pattern"));
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*([^*_]+?)\*|_([^*_]+?)_").expect("valid emphasis pattern")
});
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").expect("valid placeholder pattern"));
static BULLET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+]\s+").expect("valid bullet pattern"));
static ORDERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+").expect("valid ordered pattern"));

/// Text whose inline formatting has already been resolved to HTML markup.
///
/// Values are only produced by [`format_inline`]. The wrapped markup is
/// final: it is safe to embed in an HTML document as-is and is never parsed
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Inline(String);

impl Inline {
    /// Returns the resolved markup.
    #[must_use]
    pub fn as_markup(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Inline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Inline {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Inline {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A structural unit of a parsed document.
///
/// Blocks serialize as JSON objects tagged with a `snake_case` `"type"` field,
/// which is the hand-off format for renderers other than [`crate::renderer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A heading line (`# Title`).
    Heading {
        /// Heading level, 1 through 6.
        level: u8,
        /// The heading text.
        text: Inline,
    },

    /// A run of ordinary lines; source line breaks become `<br>`.
    Paragraph {
        /// The paragraph text.
        text: Inline,
    },

    /// A run of `-`, `*` or `+` list items.
    BulletList {
        /// One entry per list line, in source order.
        items: Vec<Inline>,
    },

    /// A run of `1.` style list items.
    OrderedList {
        /// One entry per list line, in source order.
        items: Vec<Inline>,
    },

    /// Consecutive `>` lines, joined with line breaks.
    Blockquote {
        /// The quoted text.
        text: Inline,
    },

    /// A fenced code block.
    CodeBlock {
        /// The info string after the opening fence, if any.
        language: Option<String>,
        /// The lines between the fences, verbatim and unescaped.
        code: String,
    },

    /// A pipe table with a header-divider row.
    Table {
        /// Cells of the first row.
        header: Vec<Inline>,
        /// Body rows below the divider.
        rows: Vec<Vec<Inline>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

/// The single buffer that may be open while walking the input.
#[derive(Debug, Default)]
enum OpenBuffer<'a> {
    #[default]
    Empty,
    Paragraph(Vec<&'a str>),
    List(ListKind, Vec<&'a str>),
    Blockquote(Vec<&'a str>),
    Code {
        language: Option<String>,
        lines: Vec<&'a str>,
    },
}

impl<'a> OpenBuffer<'a> {
    /// Closes the buffer, pushing its block (if any) onto `blocks`.
    fn flush_into(&mut self, blocks: &mut Vec<Block>) {
        if let Some(block) = std::mem::take(self).close() {
            blocks.push(block);
        }
    }

    fn push_paragraph_line(&mut self, blocks: &mut Vec<Block>, line: &'a str) {
        match self {
            Self::Paragraph(lines) => lines.push(line),
            _ => {
                self.flush_into(blocks);
                *self = Self::Paragraph(vec![line]);
            }
        }
    }

    fn push_list_item(&mut self, blocks: &mut Vec<Block>, kind: ListKind, item: &'a str) {
        match self {
            Self::List(open_kind, items) if *open_kind == kind => items.push(item),
            _ => {
                self.flush_into(blocks);
                *self = Self::List(kind, vec![item]);
            }
        }
    }

    fn push_quote_line(&mut self, blocks: &mut Vec<Block>, line: &'a str) {
        match self {
            Self::Blockquote(lines) => lines.push(line),
            _ => {
                self.flush_into(blocks);
                *self = Self::Blockquote(vec![line]);
            }
        }
    }

    fn close(self) -> Option<Block> {
        match self {
            Self::Empty => None,
            Self::Paragraph(lines) => {
                let joined = lines.join("\n");
                let text = joined.trim();
                (!text.is_empty()).then(|| Block::Paragraph {
                    text: format_inline(text),
                })
            }
            Self::List(ListKind::Bullet, items) => Some(Block::BulletList {
                items: items.into_iter().map(format_inline).collect(),
            }),
            Self::List(ListKind::Ordered, items) => Some(Block::OrderedList {
                items: items.into_iter().map(format_inline).collect(),
            }),
            Self::Blockquote(lines) => Some(Block::Blockquote {
                text: format_inline(&lines.join("\n")),
            }),
            Self::Code { language, lines } => Some(Block::CodeBlock {
                language,
                code: lines.join("\n"),
            }),
        }
    }
}

/// Parses Markdown text into an ordered list of blocks.
///
/// Parsing never fails. Lines that do not form a recognized construct are
/// kept as paragraph text, so no non-blank input line is dropped.
///
/// # Arguments
///
/// * `markdown` - The raw Markdown; `\n` and `\r\n` line endings are accepted
///
/// # Returns
///
/// The blocks in reading order.
#[must_use]
pub fn parse(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut open = OpenBuffer::Empty;
    let mut lines = markdown.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();

        if let OpenBuffer::Code { lines: code, .. } = &mut open {
            if is_closing_fence(trimmed) {
                open.flush_into(&mut blocks);
            } else {
                code.push(line);
            }
            continue;
        }

        if let Some(info) = trimmed.strip_prefix("```") {
            open.flush_into(&mut blocks);
            let info = info.trim();
            open = OpenBuffer::Code {
                language: (!info.is_empty()).then(|| info.to_owned()),
                lines: Vec::new(),
            };
            continue;
        }

        if trimmed.is_empty() {
            open.flush_into(&mut blocks);
            continue;
        }

        let next = lines.peek().copied().map(str::trim);

        if let Some((level, text)) = heading(trimmed) {
            open.flush_into(&mut blocks);
            blocks.push(Block::Heading {
                level,
                text: format_inline(text),
            });
            continue;
        }

        if let Some(quoted) = blockquote(trimmed) {
            open.push_quote_line(&mut blocks, quoted);
            if !next.is_some_and(|n| n.starts_with('>')) {
                open.flush_into(&mut blocks);
            }
            continue;
        }

        if let Some((kind, item)) = list_item(trimmed) {
            open.push_list_item(&mut blocks, kind, item);
            if !next.and_then(list_item).is_some_and(|(k, _)| k == kind) {
                open.flush_into(&mut blocks);
            }
            continue;
        }

        if trimmed.contains('|') && next.is_some_and(is_divider_row) {
            open.flush_into(&mut blocks);
            lines.next();
            let header = split_row(trimmed).into_iter().map(format_inline).collect();
            let mut rows = Vec::new();
            while let Some(row) = lines.next_if(|l| !l.trim().is_empty() && l.contains('|')) {
                rows.push(split_row(row).into_iter().map(format_inline).collect());
            }
            log::debug!("table with {} body rows", rows.len());
            blocks.push(Block::Table { header, rows });
            continue;
        }

        open.push_paragraph_line(&mut blocks, line);
        if next.is_none_or(str::is_empty) {
            open.flush_into(&mut blocks);
        }
    }

    if matches!(open, OpenBuffer::Code { .. }) {
        log::warn!("unterminated code fence, closing at end of input");
    }
    open.flush_into(&mut blocks);

    log::debug!("parsed {} blocks from {} bytes", blocks.len(), markdown.len());
    blocks
}

/// Returns `true` for a line that ends an open fence.
///
/// Only backticks may follow the marker; a line such as ```` ```rust ````
/// inside a fence is code.
pub(crate) fn is_closing_fence(trimmed: &str) -> bool {
    trimmed.starts_with("```") && trimmed.chars().all(|c| c == '`')
}

/// Returns the level and text of a heading line.
///
/// A heading is a run of `#` followed by whitespace or the end of the line.
/// Runs longer than six are clamped to level 6.
fn heading(trimmed: &str) -> Option<(u8, &str)> {
    let rest = trimmed.trim_start_matches('#');
    let hashes = trimmed.len() - rest.len();
    if hashes == 0 || !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    let level = u8::try_from(hashes.min(6)).unwrap_or(6);
    Some((level, rest.trim()))
}

/// Strips `>` and at most one following whitespace character.
fn blockquote(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix('>')?;
    Some(rest.strip_prefix(char::is_whitespace).unwrap_or(rest))
}

fn list_item(trimmed: &str) -> Option<(ListKind, &str)> {
    if let Some(marker) = BULLET_MARKER.find(trimmed) {
        return Some((ListKind::Bullet, &trimmed[marker.end()..]));
    }
    ORDERED_MARKER
        .find(trimmed)
        .map(|marker| (ListKind::Ordered, &trimmed[marker.end()..]))
}

/// Returns `true` for a table header divider such as `|---|:--:|`.
fn is_divider_row(line: &str) -> bool {
    line.contains('|')
        && split_row(line).iter().all(|cell| {
            cell.contains('-') && cell.chars().all(|c| c == '-' || c == ':')
        })
}

/// Splits a table row into trimmed cells.
///
/// A single leading and trailing pipe is ignored.
fn split_row(row: &str) -> Vec<&str> {
    let row = row.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = row.strip_suffix('|').unwrap_or(row);
    row.split('|').map(str::trim).collect()
}

/// Markup fragments held out of the text while emphasis is resolved.
#[derive(Default)]
struct Stash(Vec<String>);

impl Stash {
    /// Stores `markup` and returns the token that stands in for it.
    fn hold(&mut self, markup: String) -> String {
        self.0.push(markup);
        format!("{PLACEHOLDER_OPEN}{}{PLACEHOLDER_CLOSE}", self.0.len() - 1)
    }

    fn restore(&self, text: &str) -> String {
        PLACEHOLDER
            .replace_all(text, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| self.0.get(idx))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

/// Resolves inline Markdown in `text` to HTML markup.
///
/// The steps run in a fixed order, and each sees only the output of the
/// previous one:
///
/// 1. `` `code` `` spans are escaped and replaced by placeholders
/// 2. the remaining text is HTML-escaped
/// 3. `[label](url)` becomes a link (its opening tag is held out as well)
/// 4. `**x**` / `__x__` becomes `<strong>`
/// 5. `*x*` / `_x_` becomes `<em>`
/// 6. placeholders are substituted back
/// 7. newlines become `<br>`
///
/// Emphasis markers inside code spans or link URLs are therefore never
/// interpreted.
///
/// # Example
///
/// ```
/// use chatmd2pdf::parser::format_inline;
///
/// assert_eq!(
///     format_inline("**bold** and `**code**`").as_markup(),
///     "<strong>bold</strong> and <code>**code**</code>"
/// );
/// ```
#[must_use]
pub fn format_inline(text: &str) -> Inline {
    let text = text.replace([PLACEHOLDER_OPEN, PLACEHOLDER_CLOSE], "");
    let mut stash = Stash::default();

    let result = CODE_SPAN.replace_all(&text, |caps: &Captures| {
        stash.hold(format!("<code>{}</code>", html_escape::encode_text(&caps[1])))
    });
    let result = html_escape::encode_text(&result);
    let result = LINK.replace_all(&result, |caps: &Captures| {
        // The tag is stashed whole, so code spans in the URL must resolve now
        let url = stash.restore(&caps[2]);
        let url = html_escape::decode_html_entities(&url);
        let open_tag = stash.hold(format!(
            r#"<a href="{}" target="_blank" rel="noreferrer noopener">"#,
            html_escape::encode_double_quoted_attribute(&url)
        ));
        format!("{open_tag}{}</a>", &caps[1])
    });
    let result = STRONG.replace_all(&result, |caps: &Captures| {
        format!("<strong>{}</strong>", first_group(caps))
    });
    let result = EMPHASIS.replace_all(&result, |caps: &Captures| {
        format!("<em>{}</em>", first_group(caps))
    });

    Inline(stash.restore(&result).replace('\n', "<br>"))
}

/// Returns whichever alternative of a two-branch pattern matched.
fn first_group<'h>(caps: &Captures<'h>) -> &'h str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}
