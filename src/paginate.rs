// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Slicing a tall rendered bitmap into page-sized bands.
//!
//! The rasterizer draws the whole document as one bitmap whose height
//! depends on its content. A paginated document needs that bitmap cut into
//! horizontal bands that each fit one physical page once scaled to the page
//! width.
//!
//! # Geometry
//!
//! For a page of `width x height` points and a bitmap `bitmap_width` pixels
//! wide:
//!
//! - `scale = width / bitmap_width` maps bitmap pixels to page units
//! - `pixels_per_page = floor(height / scale)` is the tallest band that fits
//!
//! Bands are cut top to bottom, each `pixels_per_page` tall except the last,
//! which is exactly as tall as what remains. No padding is added and no
//! attempt is made to avoid cutting through a line of text.
//!
//! # Example
//!
//! ```
//! use chatmd2pdf::paginate::{DocumentGeometry, PageSize};
//!
//! let page = PageSize { width: 450.0, height: 200.0 };
//! let geometry = DocumentGeometry::new(page, 900).unwrap();
//! let heights: Vec<u32> = geometry.slices(900).iter().map(|s| s.height).collect();
//!
//! assert_eq!(geometry.pixels_per_page(), 400);
//! assert_eq!(heights, [400, 400, 100]);
//! ```

use serde::Serialize;
use snafu::prelude::*;

/// Bytes per pixel in a [`Bitmap`] (RGBA, 8 bits per channel).
pub const BYTES_PER_PIXEL: usize = 4;

/// Error type for page geometry that cannot be paginated.
///
/// These indicate a caller configuration bug rather than bad content, and
/// are reported before any slicing happens.
#[derive(Debug, Snafu, PartialEq)]
pub enum GeometryError {
    /// The page width or height is zero, negative, or not finite.
    #[snafu(display("page size must be positive, got {width} x {height}"))]
    InvalidPageSize {
        /// The rejected page width.
        width: f64,
        /// The rejected page height.
        height: f64,
    },

    /// The bitmap has no columns, so no scale can be derived.
    #[snafu(display("bitmap width must be positive"))]
    ZeroBitmapWidth,

    /// One page holds less than a single bitmap row at this scale.
    #[snafu(display("page height {page_height} holds no bitmap rows at scale {scale}"))]
    PageTooShort {
        /// The page height in page units.
        page_height: f64,
        /// Page units per bitmap pixel.
        scale: f64,
    },
}

/// Error type for constructing a [`Bitmap`] from raw pixels.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum BitmapError {
    /// The pixel buffer does not match the stated dimensions.
    #[snafu(display("pixel buffer holds {actual} bytes, expected {expected}"))]
    BufferSize {
        /// Bytes required by `width * height * 4`.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// The stated dimensions need more bytes than can be addressed.
    #[snafu(display("bitmap of {width}x{height} pixels is too large"))]
    TooLarge {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
}

/// A physical page size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    /// Page width.
    pub width: f64,
    /// Page height.
    pub height: f64,
}

impl PageSize {
    /// ISO A4, 210 x 297 mm.
    pub const A4: Self = Self {
        width: 595.28,
        height: 841.89,
    };

    /// US Letter, 8.5 x 11 in.
    pub const LETTER: Self = Self {
        width: 612.0,
        height: 792.0,
    };

    /// US Legal, 8.5 x 14 in.
    pub const LEGAL: Self = Self {
        width: 612.0,
        height: 1008.0,
    };

    /// Looks up a named paper size (`a4`, `letter` or `legal`, any case).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "a4" => Some(Self::A4),
            "letter" => Some(Self::LETTER),
            "legal" => Some(Self::LEGAL),
            _ => None,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// A rasterized RGBA pixel buffer.
///
/// Rows are stored top to bottom with no padding between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Wraps a raw RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BitmapError::BufferSize`] if `pixels` is not exactly
    /// `width * height * 4` bytes long, or [`BitmapError::TooLarge`] if that
    /// size does not fit in memory addressing.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BitmapError> {
        let expected = Self::buffer_len(width, height)?;
        ensure!(
            pixels.len() == expected,
            BufferSizeSnafu {
                expected,
                actual: pixels.len(),
            }
        );
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Creates an opaque white bitmap.
    ///
    /// # Errors
    ///
    /// Returns [`BitmapError::TooLarge`] if the buffer size overflows.
    pub fn blank(width: u32, height: u32) -> Result<Self, BitmapError> {
        let len = Self::buffer_len(width, height)?;
        Ok(Self {
            width,
            height,
            pixels: vec![0xFF; len],
        })
    }

    fn buffer_len(width: u32, height: u32) -> Result<usize, BitmapError> {
        usize::try_from(width)
            .ok()
            .zip(usize::try_from(height).ok())
            .and_then(|(w, h)| w.checked_mul(h)?.checked_mul(BYTES_PER_PIXEL))
            .context(TooLargeSnafu { width, height })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The raw RGBA bytes, row by row.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copies out the band of rows starting at `offset`.
    ///
    /// The band is clipped to the bitmap, so asking for rows past the bottom
    /// returns a shorter (possibly empty) bitmap.
    #[must_use]
    pub fn crop_rows(&self, offset: u32, height: u32) -> Self {
        let start = offset.min(self.height);
        let end = offset.saturating_add(height).min(self.height);
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        Self {
            width: self.width,
            height: end - start,
            pixels: self.pixels[start as usize * row_bytes..end as usize * row_bytes].to_vec(),
        }
    }
}

/// One page-sized band of the source bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSlice {
    /// Zero-based page number.
    pub index: usize,
    /// First bitmap row in this band.
    pub offset: u32,
    /// Number of bitmap rows in this band.
    pub height: u32,
    /// Width of the placed image on the page, in page units.
    pub placed_width: f64,
    /// Height of the placed image on the page, in page units.
    ///
    /// Never more than the page height; the last band is usually shorter.
    pub placed_height: f64,
}

/// Page geometry fixed for a whole document.
///
/// Construction validates the geometry, so slicing itself cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DocumentGeometry {
    page: PageSize,
    bitmap_width: u32,
    scale: f64,
    pixels_per_page: u32,
}

impl DocumentGeometry {
    /// Computes the scale and band height for `page` and a bitmap of
    /// `bitmap_width` pixels.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError`] if the page size is not positive, the
    /// bitmap width is zero, or a page would hold no whole bitmap row.
    pub fn new(page: PageSize, bitmap_width: u32) -> Result<Self, GeometryError> {
        ensure!(
            page.width.is_finite() && page.height.is_finite() && page.width > 0.0 && page.height > 0.0,
            InvalidPageSizeSnafu {
                width: page.width,
                height: page.height,
            }
        );
        ensure!(bitmap_width > 0, ZeroBitmapWidthSnafu);

        let scale = page.width / f64::from(bitmap_width);
        let rows = (page.height / scale).floor();
        ensure!(
            rows >= 1.0,
            PageTooShortSnafu {
                page_height: page.height,
                scale,
            }
        );

        // Float to int casts saturate, so absurdly tall pages become one band.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pixels_per_page = rows as u32;

        log::debug!(
            "page {}x{} for {bitmap_width}px bitmap: scale {scale}, {pixels_per_page} rows per page",
            page.width,
            page.height
        );

        Ok(Self {
            page,
            bitmap_width,
            scale,
            pixels_per_page,
        })
    }

    /// The physical page size.
    #[must_use]
    pub const fn page(&self) -> PageSize {
        self.page
    }

    /// The bitmap width this geometry was computed for.
    #[must_use]
    pub const fn bitmap_width(&self) -> u32 {
        self.bitmap_width
    }

    /// Page units per bitmap pixel.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Bitmap rows that fit on one page.
    #[must_use]
    pub const fn pixels_per_page(&self) -> u32 {
        self.pixels_per_page
    }

    /// Number of pages needed for a bitmap of `bitmap_height` rows.
    #[must_use]
    pub const fn page_count(&self, bitmap_height: u32) -> u32 {
        bitmap_height.div_ceil(self.pixels_per_page)
    }

    /// Cuts `bitmap_height` rows into contiguous page bands.
    ///
    /// A zero-height bitmap yields no slices.
    #[must_use]
    pub fn slices(&self, bitmap_height: u32) -> Vec<PageSlice> {
        let mut slices = Vec::with_capacity(self.page_count(bitmap_height) as usize);
        let mut offset = 0;

        while offset < bitmap_height {
            let height = self.pixels_per_page.min(bitmap_height - offset);
            slices.push(PageSlice {
                index: slices.len(),
                offset,
                height,
                placed_width: self.page.width,
                placed_height: f64::from(height) * self.scale,
            });
            offset += height;
        }

        slices
    }
}

/// Slices `bitmap` into bands that fit `page`.
///
/// # Errors
///
/// Returns a [`GeometryError`] if `page` and the bitmap width do not form a
/// usable geometry. See [`DocumentGeometry::new`].
pub fn paginate(bitmap: &Bitmap, page: PageSize) -> Result<Vec<PageSlice>, GeometryError> {
    let geometry = DocumentGeometry::new(page, bitmap.width())?;
    Ok(geometry.slices(bitmap.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn page(width: f64, height: f64) -> PageSize {
        PageSize { width, height }
    }

    fn heights(slices: &[PageSlice]) -> Vec<u32> {
        slices.iter().map(|s| s.height).collect()
    }

    #[test]
    fn slices_with_short_last_page() {
        let slices = paginate(&Bitmap::blank(900, 900).unwrap(), page(450.0, 200.0)).unwrap();

        assert_eq!(heights(&slices), [400, 400, 100]);
        assert_eq!(slices.iter().map(|s| s.offset).collect::<Vec<_>>(), [0, 400, 800]);
        assert!((slices[2].placed_height - 50.0).abs() < f64::EPSILON);
        assert!((slices[0].placed_height - 200.0).abs() < f64::EPSILON);
        assert!((slices[0].placed_width - 450.0).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_multiple_has_no_remainder_page() {
        let geometry = DocumentGeometry::new(page(450.0, 200.0), 900).unwrap();

        assert_eq!(heights(&geometry.slices(800)), [400, 400]);
        assert_eq!(geometry.page_count(800), 2);
    }

    #[test]
    fn short_bitmap_fits_one_page() {
        let geometry = DocumentGeometry::new(PageSize::A4, 1920).unwrap();

        assert_eq!(heights(&geometry.slices(10)), [10]);
    }

    #[test]
    fn zero_height_bitmap_has_no_slices() {
        let slices = paginate(&Bitmap::blank(900, 0).unwrap(), page(450.0, 200.0)).unwrap();

        assert!(slices.is_empty());
    }

    #[test]
    fn rejects_zero_page_height() {
        let err = DocumentGeometry::new(page(450.0, 0.0), 900).unwrap_err();

        assert_eq!(
            err,
            GeometryError::InvalidPageSize {
                width: 450.0,
                height: 0.0
            }
        );
    }

    #[test]
    fn rejects_negative_and_non_finite_page() {
        assert!(DocumentGeometry::new(page(-1.0, 100.0), 900).is_err());
        assert!(DocumentGeometry::new(page(f64::NAN, 100.0), 900).is_err());
        assert!(DocumentGeometry::new(page(100.0, f64::INFINITY), 900).is_err());
    }

    #[test]
    fn rejects_zero_bitmap_width() {
        assert_eq!(
            DocumentGeometry::new(PageSize::A4, 0).unwrap_err(),
            GeometryError::ZeroBitmapWidth
        );
    }

    #[test]
    fn rejects_page_shorter_than_one_row() {
        // scale 100, so a 50pt page holds half a row
        let err = DocumentGeometry::new(page(100.0, 50.0), 1).unwrap_err();

        assert!(matches!(err, GeometryError::PageTooShort { .. }));
    }

    #[test]
    fn a4_geometry_matches_two_x_render() {
        let geometry = DocumentGeometry::new(PageSize::A4, 1920).unwrap();

        // 841.89 / (595.28 / 1920) = 2715.4...
        assert_eq!(geometry.pixels_per_page(), 2715);
    }

    #[test]
    fn looks_up_named_sizes() {
        assert_eq!(PageSize::from_name("A4"), Some(PageSize::A4));
        assert_eq!(PageSize::from_name("letter"), Some(PageSize::LETTER));
        assert_eq!(PageSize::from_name("Legal"), Some(PageSize::LEGAL));
        assert_eq!(PageSize::from_name("tabloid"), None);
    }

    #[test]
    fn bitmap_rejects_wrong_buffer_size() {
        assert_eq!(
            Bitmap::new(2, 2, vec![0; 15]).unwrap_err(),
            BitmapError::BufferSize {
                expected: 16,
                actual: 15
            }
        );
        assert!(Bitmap::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn oversized_dimensions_are_errors() {
        let too_large = BitmapError::TooLarge {
            width: u32::MAX,
            height: u32::MAX,
        };

        assert_eq!(Bitmap::new(u32::MAX, u32::MAX, Vec::new()).unwrap_err(), too_large);
        assert_eq!(Bitmap::blank(u32::MAX, u32::MAX).unwrap_err(), too_large);
    }

    #[test]
    fn crops_rows() {
        let pixels: Vec<u8> = (0..3u8).flat_map(|row| [row; 2 * BYTES_PER_PIXEL]).collect();
        let bitmap = Bitmap::new(2, 3, pixels).unwrap();

        let band = bitmap.crop_rows(1, 2);
        assert_eq!(band.height(), 2);
        assert_eq!(band.width(), 2);
        assert!(band.pixels()[..8].iter().all(|&b| b == 1));
        assert!(band.pixels()[8..].iter().all(|&b| b == 2));
    }

    #[test]
    fn crop_past_bottom_is_clipped() {
        let bitmap = Bitmap::blank(4, 10).unwrap();

        assert_eq!(bitmap.crop_rows(8, 5).height(), 2);
        assert_eq!(bitmap.crop_rows(20, 5).height(), 0);
    }

    proptest! {
        #[test]
        fn prop_slices_cover_bitmap_exactly(
            bitmap_width in 100u32..4000,
            bitmap_height in 0u32..200_000,
            page_width in 50.0f64..2000.0,
            page_height in 50.0f64..2000.0,
        ) {
            let geometry = DocumentGeometry::new(page(page_width, page_height), bitmap_width).unwrap();
            let slices = geometry.slices(bitmap_height);

            prop_assert_eq!(slices.len() as u32, geometry.page_count(bitmap_height));
            prop_assert_eq!(slices.iter().map(|s| u64::from(s.height)).sum::<u64>(), u64::from(bitmap_height));

            let mut expected_offset = 0;
            for slice in &slices {
                prop_assert_eq!(slice.offset, expected_offset);
                prop_assert!(slice.height > 0 && slice.height <= geometry.pixels_per_page());
                expected_offset += slice.height;
            }
        }
    }
}
