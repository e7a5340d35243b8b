//! # Bottom Whitespace Trimming
//!
//! Rendered documents usually end each page with a band of empty paper. On
//! continuous media that band would print as blank label, so every page but
//! the last is cut down to its content plus a small margin.
//!
//! ## Algorithm
//!
//! ```text
//! row = height - 1
//! while row > 0 and no sampled pixel in row differs from background:
//!     row -= 1
//! keep rows [0, min(row + margin, height - 1)]
//! ```
//!
//! Only every `stride`-th pixel of a row is sampled. Row 0 is never tested,
//! so an all-background page keeps `min(margin + 1, height)` rows and never
//! collapses to zero height.

use image::imageops;

use super::{BACKGROUND, RasterPage};

/// Tuning for [`trim_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimOptions {
    /// Sample every `stride`-th pixel of a row.
    pub stride: u32,
    /// Rows kept below the last content row.
    pub margin: u32,
    /// Luma considered empty paper.
    pub background: u8,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            stride: 10,
            margin: 5,
            background: BACKGROUND,
        }
    }
}

/// Trim trailing blank rows with the default options.
pub fn trim(page: RasterPage) -> RasterPage {
    trim_with(page, &TrimOptions::default())
}

/// Trim trailing blank rows.
///
/// The result is never taller than the input, and never zero rows tall when
/// the input has at least one row.
pub fn trim_with(page: RasterPage, options: &TrimOptions) -> RasterPage {
    let (width, height) = (page.width(), page.height());
    if width == 0 || height == 0 {
        return page;
    }

    let mut last_content = height - 1;
    while last_content > 0 && !row_has_content(&page, last_content, options) {
        last_content -= 1;
    }

    let keep = (last_content + options.margin).min(height - 1) + 1;
    if keep == height {
        return page;
    }

    tracing::debug!(page = page.index, from = height, to = keep, "trimmed page");
    let image = imageops::crop_imm(&page.image, 0, 0, width, keep).to_image();
    RasterPage::new(image, page.index)
}

fn row_has_content(page: &RasterPage, y: u32, options: &TrimOptions) -> bool {
    (0..page.width())
        .step_by(options.stride.max(1) as usize)
        .any(|x| page.luma(x, y) != options.background)
}

// ============================================================================
// TESTS
// ============================================================================
