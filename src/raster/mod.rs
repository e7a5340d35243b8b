//! # Raster Pages
//!
//! A [`RasterPage`] is one rendered page of a document at device resolution:
//! an 8-bit grayscale buffer where 255 is paper (white) and 0 is full black.
//!
//! ## Module Structure
//!
//! - [`document`]: turning documents (PDF, images) into pages
//! - [`trim`]: removing trailing blank rows
//! - [`dither`]: grayscale to 1-bit conversion for the printer

pub mod dither;
pub mod document;
pub mod trim;

use image::GrayImage;

pub use document::{DocumentRasterizer, ImageRasterizer, Pages, PdfRasterizer, Rasterizer};
pub use trim::{TrimOptions, trim};

/// Luma value of unprinted paper.
pub const BACKGROUND: u8 = 255;

/// One rendered page of a print job.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPage {
    /// Grayscale pixels, row-major, top row first.
    pub image: GrayImage,
    /// 0-based page number in the source document.
    pub index: usize,
}

impl RasterPage {
    pub fn new(image: GrayImage, index: usize) -> Self {
        Self { image, index }
    }

    /// A page filled with the background color.
    pub fn blank(width: u32, height: u32, index: usize) -> Self {
        Self::new(GrayImage::from_pixel(width, height, image::Luma([BACKGROUND])), index)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Luma at (x, y). Panics when out of bounds.
    #[inline]
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y).0[0]
    }
}
