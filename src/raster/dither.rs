//! # Grayscale to 1-bit Conversion
//!
//! Label printers print black or nothing. Before a page can be sent its
//! grayscale pixels are reduced to one bit per dot and packed into bytes.
//!
//! Two methods are available:
//!
//! | Method | Best For | Artifacts |
//! |--------|----------|-----------|
//! | [`Dither::Threshold`] | text, barcodes, line art | Banding on photos |
//! | [`Dither::Bayer`] | photos, gradients | Regular pattern |
//!
//! ## The Bayer Matrix
//!
//! Ordered dithering looks up a threshold from an 8x8 matrix using
//! `(x mod 8, y mod 8)` and prints a dot when the pixel's darkness exceeds it.
//!
//! ```text
//!     0   1   2   3   4   5   6   7   (x mod 8)
//!   ┌───┬───┬───┬───┬───┬───┬───┬───┐
//! 0 │ 0 │32 │ 8 │40 │ 2 │34 │10 │42 │
//! 1 │48 │16 │56 │24 │50 │18 │58 │26 │
//! 2 │12 │44 │ 4 │36 │14 │46 │ 6 │38 │
//! 3 │60 │28 │52 │20 │62 │30 │54 │22 │
//! 4 │ 3 │35 │11 │43 │ 1 │33 │ 9 │41 │
//! 5 │51 │19 │59 │27 │49 │17 │57 │25 │
//! 6 │15 │47 │ 7 │39 │13 │45 │ 5 │37 │
//! 7 │63 │31 │55 │23 │61 │29 │53 │21 │
//!   └───┴───┴───┴───┴───┴───┴───┴───┘
//! (y mod 8)
//! ```
//!
//! ## Bit Packing
//!
//! - Bit 7 (MSB) = leftmost dot
//! - 1 = black (print), 0 = white (no print)
//!
//! ```
//! use etiqueta::raster::dither::pack_row;
//!
//! let row: Vec<bool> = vec![true, true, false, false, true, false, true, false];
//! assert_eq!(pack_row(&row), vec![0b11001010]);
//! ```

use serde::{Deserialize, Serialize};

use super::RasterPage;

/// Bayer 8x8 dithering matrix (values 0-63, each exactly once).
pub const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Luma below this prints as black in threshold mode.
pub const THRESHOLD_LUMA: u8 = 128;

/// How grayscale pixels become dots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dither {
    /// Fixed cut at [`THRESHOLD_LUMA`].
    #[default]
    Threshold,
    /// Bayer 8x8 ordered dithering.
    Bayer,
}

/// A packed 1-bit image, ready for a bitmap directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoBitmap {
    /// Width in dots.
    pub width: u32,
    /// Height in rows.
    pub height: u32,
    /// Bytes per row (`ceil(width / 8)`).
    pub row_bytes: u32,
    /// `row_bytes * height` bytes, top row first.
    pub data: Vec<u8>,
}

/// Get the Bayer threshold for a pixel position, in (0, 1).
///
/// ```text
/// threshold = (BAYER8[y mod 8][x mod 8] + 0.5) / 64.0
/// ```
#[inline]
pub fn threshold(x: usize, y: usize) -> f32 {
    let matrix_value = BAYER8[y & 7][x & 7];
    (matrix_value as f32 + 0.5) / 64.0
}

/// Whether a dot prints at (x, y) for `intensity` (0.0 = white, 1.0 = black).
#[inline]
pub fn should_print(x: usize, y: usize, intensity: f32) -> bool {
    intensity > threshold(x, y)
}

/// Pack a row of boolean pixel values into bytes, MSB first.
///
/// Rows that are not a multiple of 8 are padded with white on the right.
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let num_bytes = pixels.len().div_ceil(8);
    let mut bytes = vec![0u8; num_bytes];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            let byte_idx = i / 8;
            let bit_idx = 7 - (i % 8);
            bytes[byte_idx] |= 1 << bit_idx;
        }
    }

    bytes
}

impl Dither {
    /// Whether the pixel at (x, y) with the given luma prints.
    #[inline]
    pub fn is_black(self, x: usize, y: usize, luma: u8) -> bool {
        match self {
            Dither::Threshold => luma < THRESHOLD_LUMA,
            Dither::Bayer => should_print(x, y, 1.0 - luma as f32 / 255.0),
        }
    }
}

/// Convert a page to a packed bitmap, keeping at most `max_width` columns.
///
/// Columns past `max_width` are clipped, never scaled.
pub fn pack_page(page: &RasterPage, max_width: u32, dither: Dither) -> MonoBitmap {
    let width = page.width().min(max_width);
    let height = page.height();
    let row_bytes = width.div_ceil(8);

    let mut data = Vec::with_capacity((row_bytes * height) as usize);
    let mut row = Vec::with_capacity(width as usize);
    for y in 0..height {
        row.clear();
        for x in 0..width {
            row.push(dither.is_black(x as usize, y as usize, page.luma(x, y)));
        }
        data.extend(pack_row(&row));
    }

    MonoBitmap {
        width,
        height,
        row_bytes,
        data,
    }
}

// ============================================================================
// TESTS
// ============================================================================
