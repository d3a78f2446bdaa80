// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! The export pipeline and the collaborators it drives.
//!
//! Turning Markdown into a file takes two capabilities this crate does not
//! provide itself: drawing HTML into pixels and encoding pixels into a
//! document. They are modelled as the [`Rasterizer`] and [`DocumentWriter`]
//! traits, and [`export`] wires them together:
//!
//! 1. [`parse`](crate::parser::parse) the Markdown into blocks
//! 2. [`render_document`](crate::renderer::render_document) the blocks to HTML
//! 3. rasterize the HTML to one tall [`Bitmap`]
//! 4. slice the bitmap into pages (PDF) or keep it whole (PNG)
//! 5. hand the result to the writer under a content-derived file name
//!
//! An empty document or an empty bitmap stops the pipeline with
//! [`ExportError::EmptyDocument`] or [`ExportError::EmptyBitmap`] rather than
//! producing a blank file.

use crate::naming;
use crate::paginate::{Bitmap, DocumentGeometry, GeometryError, PageSize, PageSlice};
use crate::parser;
use crate::renderer::{self, RenderOptions};
use chrono::{NaiveDate, Utc};
use snafu::prelude::*;

/// Error reported by a collaborator implementation.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for a failed export.
#[derive(Debug, Snafu)]
pub enum ExportError {
    /// The Markdown contained no blocks.
    #[snafu(display("nothing to export: document is empty"))]
    EmptyDocument,

    /// The rasterizer produced a bitmap with no rows or no columns.
    #[snafu(display("nothing to export: rendered bitmap is {width}x{height}"))]
    EmptyBitmap {
        /// Bitmap width in pixels.
        width: u32,
        /// Bitmap height in pixels.
        height: u32,
    },

    /// The page size and bitmap width do not form a usable geometry.
    #[snafu(display("invalid page geometry: {source}"))]
    Geometry {
        /// The underlying geometry error.
        source: GeometryError,
    },

    /// The rasterizer failed.
    #[snafu(display("failed to rasterize document: {source}"))]
    Rasterize {
        /// The rasterizer's error.
        source: CollaboratorError,
    },

    /// The document writer failed.
    #[snafu(display("failed to write {file_name}: {source}"))]
    Write {
        /// The file that was being written.
        file_name: String,
        /// The writer's error.
        source: CollaboratorError,
    },
}

impl ExportError {
    /// Returns `true` when the export was skipped because there was nothing
    /// to put in the file.
    #[must_use]
    pub const fn is_nothing_to_export(&self) -> bool {
        matches!(self, Self::EmptyDocument | Self::EmptyBitmap { .. })
    }
}

/// Draws HTML markup into a bitmap.
pub trait Rasterizer {
    /// Renders `markup` at `width` CSS pixels.
    ///
    /// The returned bitmap may be wider than `width` when the rasterizer
    /// draws at a device scale above 1; its height is whatever the content
    /// needs.
    ///
    /// # Errors
    ///
    /// Any failure to render, in the implementation's own error type.
    fn rasterize(&mut self, markup: &str, width: u32) -> Result<Bitmap, CollaboratorError>;
}

/// Assembles bitmaps into an output file.
pub trait DocumentWriter {
    /// Writes a paginated document with one page per entry, in order.
    ///
    /// # Errors
    ///
    /// Any failure to encode or store the document.
    fn write_pages(&mut self, pages: &[PageImage], file_name: &str) -> Result<(), CollaboratorError>;

    /// Writes a single raster image file.
    ///
    /// # Errors
    ///
    /// Any failure to encode or store the image.
    fn write_image(&mut self, image: &Bitmap, file_name: &str) -> Result<(), CollaboratorError>;
}

/// One page of a paginated document: its band of pixels and placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// Where the band came from and how large it is drawn.
    pub slice: PageSlice,
    /// The band's pixels.
    pub image: Bitmap,
    /// The physical page the band is drawn on, at the top-left origin.
    pub page: PageSize,
}

/// The kind of file an export produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// A multi-page paginated document.
    #[default]
    Pdf,
    /// A single tall raster image.
    Png,
}

impl OutputFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
        }
    }
}

/// Configuration options for an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// The kind of file to produce.
    pub format: OutputFormat,

    /// Physical page size for paginated output.
    pub page: PageSize,

    /// Options passed to the HTML renderer.
    pub render: RenderOptions,

    /// Leading component of the output file name.
    pub prefix: String,

    /// Date stamped into the file name.
    ///
    /// When `None`, today's date (UTC) is used.
    pub date: Option<NaiveDate>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pdf,
            page: PageSize::A4,
            render: RenderOptions::default(),
            prefix: "chat".into(),
            date: None,
        }
    }
}

/// What a successful export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Name the file was written under.
    pub file_name: String,
    /// Number of pages written (1 for image output).
    pub pages: usize,
}

/// Runs the full Markdown-to-file pipeline.
///
/// # Errors
///
/// Returns [`ExportError::EmptyDocument`] or [`ExportError::EmptyBitmap`]
/// when there is nothing to export, [`ExportError::Geometry`] for an
/// unusable page size, and [`ExportError::Rasterize`] or
/// [`ExportError::Write`] when a collaborator fails.
pub fn export<R, W>(
    markdown: &str,
    opts: &ExportOptions,
    rasterizer: &mut R,
    writer: &mut W,
) -> Result<ExportSummary, ExportError>
where
    R: Rasterizer + ?Sized,
    W: DocumentWriter + ?Sized,
{
    let blocks = parser::parse(markdown);
    if blocks.is_empty() {
        log::warn!("nothing to export: no blocks in {} bytes of input", markdown.len());
        return EmptyDocumentSnafu.fail();
    }

    let markup = renderer::render_document(&blocks, &opts.render);
    let bitmap = rasterizer
        .rasterize(&markup, opts.render.content_width)
        .context(RasterizeSnafu)?;
    log::debug!("rasterized {}x{} bitmap", bitmap.width(), bitmap.height());

    ensure!(
        bitmap.width() > 0 && bitmap.height() > 0,
        EmptyBitmapSnafu {
            width: bitmap.width(),
            height: bitmap.height(),
        }
    );

    let date = opts.date.unwrap_or_else(|| Utc::now().date_naive());
    let file_name = naming::file_name(markdown, &opts.prefix, date, opts.format.extension());

    let pages = match opts.format {
        OutputFormat::Pdf => {
            let geometry = DocumentGeometry::new(opts.page, bitmap.width()).context(GeometrySnafu)?;
            let pages: Vec<PageImage> = geometry
                .slices(bitmap.height())
                .into_iter()
                .map(|slice| PageImage {
                    image: bitmap.crop_rows(slice.offset, slice.height),
                    slice,
                    page: opts.page,
                })
                .collect();
            writer
                .write_pages(&pages, &file_name)
                .context(WriteSnafu { file_name: &file_name })?;
            pages.len()
        }
        OutputFormat::Png => {
            writer
                .write_image(&bitmap, &file_name)
                .context(WriteSnafu { file_name: &file_name })?;
            1
        }
    };

    log::debug!("wrote {file_name} ({pages} pages)");
    Ok(ExportSummary { file_name, pages })
}
