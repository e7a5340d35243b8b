//! # Document Rasterization
//!
//! Rasterizers turn a document on disk into [`RasterPage`]s scaled to the
//! printer's width. Scaling is uniform: a page `W x H` rendered at target width
//! `T` comes out `T x round(H * T / W)`.
//!
//! Rendering is all-or-nothing. A document that fails part way yields an error
//! and no pages, never a partial page list.
//!
//! ## Supported Documents
//!
//! | Input | Rasterizer | Pages |
//! |-------|------------|-------|
//! | `*.pdf` | [`PdfRasterizer`] (`pdftoppm`) | one per PDF page |
//! | image file (PNG, JPEG, ...) | [`ImageRasterizer`] | one |
//! | directory of images | [`ImageRasterizer`] | one per file, by file name |
//!
//! [`DocumentRasterizer`] picks between the two by file extension.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::{GrayImage, Luma, imageops};

use super::RasterPage;
use crate::error::RasterError;

/// File extensions loaded as page images.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

/// Renders documents into raster pages.
pub trait Rasterizer: Send + Sync {
    /// Render `path` at `target_width` dots.
    ///
    /// Pages come out ordered by source page number. Calling again renders
    /// the document again.
    fn render(&self, path: &Path, target_width: u32) -> Result<Pages, RasterError>;
}

/// Pages of one rendered document, in source order.
pub struct Pages {
    inner: Box<dyn Iterator<Item = RasterPage> + Send>,
}

impl Pages {
    pub fn new<I>(pages: I) -> Self
    where
        I: IntoIterator<Item = RasterPage>,
        I::IntoIter: Send + 'static,
    {
        Self {
            inner: Box::new(pages.into_iter()),
        }
    }
}

impl Iterator for Pages {
    type Item = RasterPage;

    fn next(&mut self) -> Option<RasterPage> {
        self.inner.next()
    }
}

impl std::fmt::Debug for Pages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pages").finish_non_exhaustive()
    }
}

// ============================================================================
// IMAGES
// ============================================================================

/// Loads raster images as pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRasterizer;

impl ImageRasterizer {
    /// Decode one image file and scale it to `target_width`.
    pub fn load_page(path: &Path, target_width: u32, index: usize) -> Result<RasterPage, RasterError> {
        let decoded = image::open(path)
            .map_err(|e| RasterError::Render(format!("Failed to decode {}: {}", path.display(), e)))?;
        let gray = flatten_onto_white(&decoded.to_rgba8());
        Ok(RasterPage::new(scale_to_width(gray, target_width)?, index))
    }

    fn page_files(dir: &Path) -> Result<Vec<PathBuf>, RasterError> {
        let entries = fs::read_dir(dir)
            .map_err(|e| RasterError::Render(format!("Failed to read {}: {}", dir.display(), e)))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| RasterError::Render(format!("Failed to read {}: {}", dir.display(), e)))?
                .path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Rasterizer for ImageRasterizer {
    fn render(&self, path: &Path, target_width: u32) -> Result<Pages, RasterError> {
        if !path.exists() {
            return Err(RasterError::DocumentNotFound(path.to_path_buf()));
        }

        let files = if path.is_dir() {
            Self::page_files(path)?
        } else {
            vec![path.to_path_buf()]
        };
        if files.is_empty() {
            return Err(RasterError::Render(format!(
                "No page images in {}",
                path.display()
            )));
        }

        // Decode everything up front so a bad page fails the whole document.
        let pages = files
            .iter()
            .enumerate()
            .map(|(index, file)| Self::load_page(file, target_width, index))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(path = %path.display(), pages = pages.len(), "rasterized images");
        Ok(Pages::new(pages))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Convert RGBA to luma, compositing transparent pixels over white paper.
fn flatten_onto_white(rgba: &image::RgbaImage) -> GrayImage {
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        let alpha = a as f32 / 255.0;
        let composited = luma * alpha + 255.0 * (1.0 - alpha);
        Luma([composited.round().clamp(0.0, 255.0) as u8])
    })
}

/// Scale uniformly so the width becomes `target_width`.
fn scale_to_width(image: GrayImage, target_width: u32) -> Result<GrayImage, RasterError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(RasterError::Render(format!(
            "Page has no pixels ({}x{})",
            width, height
        )));
    }
    if target_width == 0 {
        return Err(RasterError::Render("Target width must be positive".to_string()));
    }
    if width == target_width {
        return Ok(image);
    }

    let scale = target_width as f64 / width as f64;
    let target_height = ((height as f64 * scale).round() as u32).max(1);
    Ok(imageops::resize(
        &image,
        target_width,
        target_height,
        imageops::FilterType::Triangle,
    ))
}

// ============================================================================
// PDF
// ============================================================================

/// Renders PDFs with poppler's `pdftoppm`.
///
/// Pages are written as PNGs into a temporary directory, which is removed once
/// they are decoded.
#[derive(Debug, Clone)]
pub struct PdfRasterizer {
    program: PathBuf,
}

impl Default for PdfRasterizer {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pdftoppm"),
        }
    }
}

impl PdfRasterizer {
    /// Use a specific `pdftoppm` binary.
    pub fn with_program<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Rasterizer for PdfRasterizer {
    fn render(&self, path: &Path, target_width: u32) -> Result<Pages, RasterError> {
        if !path.is_file() {
            return Err(RasterError::DocumentNotFound(path.to_path_buf()));
        }

        let out_dir = tempfile::tempdir()
            .map_err(|e| RasterError::Render(format!("Failed to create temp dir: {}", e)))?;

        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-scale-to-x")
            .arg(target_width.to_string())
            .arg("-scale-to-y")
            .arg("-1")
            .arg(path)
            .arg(out_dir.path().join("page"))
            .output()
            .map_err(|e| {
                RasterError::Render(format!(
                    "Failed to run '{}': {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RasterError::Render(format!(
                "pdftoppm failed on {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        // pdftoppm zero-pads page numbers to a common width, so name order is page order.
        ImageRasterizer.render(out_dir.path(), target_width)
    }
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Picks a rasterizer by file extension: `.pdf` goes to `pdftoppm`, anything
/// else is treated as an image or a directory of images.
#[derive(Debug, Clone, Default)]
pub struct DocumentRasterizer {
    pub pdf: PdfRasterizer,
    pub images: ImageRasterizer,
}

impl Rasterizer for DocumentRasterizer {
    fn render(&self, path: &Path, target_width: u32) -> Result<Pages, RasterError> {
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            self.pdf.render(path, target_width)
        } else {
            self.images.render(path, target_width)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
