// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Render chat-export Markdown into paginated documents.
//!
//! This crate provides the document pipeline behind exporting a chat
//! assistant's answer as a PDF or PNG: parsing the copied Markdown,
//! rendering it to HTML, and slicing the rasterized result into pages.
//!
//! # Overview
//!
//! Chat assistants hand out their answers as Markdown. This crate:
//!
//! 1. Parses the Markdown into typed blocks with resolved inline markup
//! 2. Renders the blocks as a self-contained HTML page
//! 3. Slices the rasterized page into page-sized bands for a document writer
//!
//! Rasterizing HTML and encoding the final file are left to implementations
//! of the [`export::Rasterizer`] and [`export::DocumentWriter`] traits.
//!
//! # Example
//!
//! ```
//! use chatmd2pdf::{paginate, parser, renderer};
//!
//! let blocks = parser::parse("# Answer\n\n| A | B |\n|---|---|\n| 1 | 2 |");
//! let html = renderer::render_document(&blocks, &renderer::RenderOptions::default());
//! assert!(html.contains("<th>A</th>"));
//!
//! // Suppose a rasterizer drew `html` as a 1920x6000 bitmap.
//! let bitmap = paginate::Bitmap::blank(1920, 6000).unwrap();
//! let pages = paginate::paginate(&bitmap, paginate::PageSize::A4).unwrap();
//! assert_eq!(pages.len(), 3);
//! ```
//!
//! # Modules
//!
//! - [`parser`]: Line-oriented Markdown parsing into blocks
//! - [`renderer`]: HTML generation with an embedded stylesheet
//! - [`paginate`]: Bitmap slicing and page geometry
//! - [`naming`]: Content-derived output file names
//! - [`export`]: The end-to-end pipeline and its collaborator traits

#![deny(missing_docs)]

pub mod export;
pub mod naming;
pub mod paginate;
pub mod parser;
pub mod renderer;
