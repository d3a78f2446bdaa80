// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! HTML rendering for parsed Markdown blocks.
//!
//! This module turns a list of [`Block`]s into the markup handed to a
//! [`Rasterizer`](crate::export::Rasterizer). Inline text is already markup,
//! so the only escaping done here is for code block literals.
//!
//! # Output Format
//!
//! [`render_document`] produces a standalone page:
//! - A `<!DOCTYPE html>` document with a UTF-8 meta tag
//! - An embedded stylesheet (white background, black text, bordered tables
//!   and code blocks) so the result does not depend on the host page
//! - A body containing the fragment produced by [`render_blocks`]
//!
//! # Example
//!
//! ```
//! use chatmd2pdf::parser::parse;
//! use chatmd2pdf::renderer::{render_blocks, render_document, RenderOptions};
//!
//! let blocks = parse("# Hello\n\nSome *text*.");
//!
//! assert_eq!(render_blocks(&blocks), "<h1>Hello</h1><p>Some <em>text</em>.</p>");
//!
//! let page = render_document(&blocks, &RenderOptions::default());
//! assert!(page.starts_with("<!DOCTYPE html>"));
//! ```

use crate::parser::{Block, Inline};
use std::fmt::Write;

/// Configuration options for HTML rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Preferred font family for body text.
    ///
    /// Common CJK-capable fonts are always listed after it as fallbacks.
    pub font_family: String,

    /// Width of the rendered page body in CSS pixels.
    ///
    /// The rasterizer is asked for a bitmap of this width times its own
    /// device scale.
    pub content_width: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            font_family: "SimHei".into(),
            content_width: 960,
        }
    }
}

const STYLESHEET: &str = "\
:root{color-scheme:light;}
*{box-sizing:border-box;}
h1{font-size:22px;margin:24px 0 12px;font-weight:600;}
h2{font-size:20px;margin:20px 0 10px;font-weight:600;}
h3{font-size:18px;margin:18px 0 8px;font-weight:600;}
h4,h5,h6{margin:16px 0 8px;font-weight:600;}
p{margin:12px 0;word-wrap:break-word;white-space:pre-wrap;}
a{color:#0969da;text-decoration:none;}
code{font-family:\"JetBrains Mono\",\"Consolas\",\"SFMono-Regular\",monospace;background:#f6f8fa;border:1px solid #d0d7de;border-radius:4px;padding:0 .35em;}
pre{background:#f6f8fa;border:1px solid #d0d7de;border-radius:8px;padding:16px;white-space:pre-wrap;word-wrap:break-word;margin:18px 0;}
pre code{background:none;border:none;padding:0;}
ul,ol{margin:12px 0 12px 24px;padding:0;}
li{margin:6px 0;}
blockquote{margin:16px 0;padding:10px 16px;border-left:4px solid #d0d7de;background:#f8f8f8;border-radius:6px;color:#444;}
table{width:100%;border-collapse:collapse;margin:18px 0;font-size:13px;}
th,td{border:1px solid #d0d7de;padding:8px 10px;text-align:left;}
th{background:#f0f1f3;font-weight:600;}
";

/// Renders blocks as a standalone HTML document.
///
/// This is the main entry point for rendering. The result is what gets
/// handed to the rasterizer.
///
/// # Arguments
///
/// * `blocks` - The parsed document, in reading order
/// * `opts` - Configuration options controlling fonts and width
///
/// # Returns
///
/// A `String` containing the complete HTML page.
#[must_use]
pub fn render_document(blocks: &[Block], opts: &RenderOptions) -> String {
    let font = html_escape::encode_style_double_quoted_text(&opts.font_family);
    let mut out = String::new();

    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>\n");
    out.push_str(STYLESHEET);
    writeln!(
        out,
        "body{{margin:0;padding:32px;width:{}px;background:#fff;color:#000;\
         font:14px/1.6 \"{font}\",\"Microsoft YaHei\",\"PingFang SC\",sans-serif;}}",
        opts.content_width
    )
    .unwrap();
    out.push_str("</style></head><body>");
    out.push_str(&render_blocks(blocks));
    out.push_str("</body></html>");

    out
}

/// Renders blocks as an HTML fragment with no surrounding document.
#[must_use]
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        render_block(&mut out, block);
    }
    out
}

fn render_block(out: &mut String, block: &Block) {
    match block {
        Block::Heading { level, text } => {
            write!(out, "<h{level}>{text}</h{level}>").unwrap();
        }
        Block::Paragraph { text } => write!(out, "<p>{text}</p>").unwrap(),
        Block::BulletList { items } => render_list(out, "ul", items),
        Block::OrderedList { items } => render_list(out, "ol", items),
        Block::Blockquote { text } => write!(out, "<blockquote>{text}</blockquote>").unwrap(),
        Block::CodeBlock { language, code } => {
            out.push_str("<pre><code");
            if let Some(lang) = language {
                write!(
                    out,
                    " class=\"language-{}\"",
                    html_escape::encode_double_quoted_attribute(lang)
                )
                .unwrap();
            }
            write!(out, ">{}</code></pre>", html_escape::encode_text(code)).unwrap();
        }
        Block::Table { header, rows } => render_table(out, header, rows),
    }
}

fn render_list(out: &mut String, tag: &str, items: &[Inline]) {
    write!(out, "<{tag}>").unwrap();
    for item in items {
        write!(out, "<li>{item}</li>").unwrap();
    }
    write!(out, "</{tag}>").unwrap();
}

fn render_table(out: &mut String, header: &[Inline], rows: &[Vec<Inline>]) {
    out.push_str("<table><thead><tr>");
    for cell in header {
        write!(out, "<th>{cell}</th>").unwrap();
    }
    out.push_str("</tr></thead>");

    if !rows.is_empty() {
        out.push_str("<tbody>");
        for row in rows {
            out.push_str("<tr>");
            for cell in row {
                write!(out, "<td>{cell}</td>").unwrap();
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody>");
    }

    out.push_str("</table>");
}
