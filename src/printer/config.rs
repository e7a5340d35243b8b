//! # Printer Configuration
//!
//! This module defines the hardware profile of the label printer and the
//! tunables of a printing session.
//!
//! ## Supported Printers
//!
//! | Profile | Print width (dots) | Resolution | Label width |
//! |---------|--------------------|------------|-------------|
//! | LABEL_80MM | 576 | 203 DPI (8 dots/mm) | 80 mm |
//!
//! ## Usage
//!
//! ```
//! use etiqueta::printer::PrinterConfig;
//!
//! let config = PrinterConfig::LABEL_80MM;
//! println!("Print width: {} dots ({} bytes)",
//!          config.width_dots,
//!          config.width_bytes());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EtiquetaError;
use crate::raster::dither::Dither;
use crate::transport::WriteChunking;

/// # Printer Configuration
///
/// Defines the hardware characteristics of a label printer.
///
/// ## Physical Properties
///
/// - **width_dots**: Maximum printable width in dots. Wider bitmaps are clipped.
/// - **dots_per_mm**: Integer resolution used for label geometry
/// - **label_width_mm**: Media width announced to the printer
/// - **min_label_height_mm**: Floor for the computed label height
/// - **gap_mm**: Gap between labels when a job asks for gapped output
///
/// ## Calculations
///
/// ```text
/// label_height_mm = max(page_height_dots / dots_per_mm, min_label_height_mm)
///
/// For LABEL_80MM:
///   576 dots / 8 dots_per_mm = 72mm printable on 80mm media
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterConfig {
    /// Printer profile name
    pub name: &'static str,

    /// Maximum print width in dots (pixels)
    pub width_dots: u32,

    /// Resolution in dots per inch
    pub dpi: u16,

    /// Dots per millimeter (203 DPI rounds to 8)
    pub dots_per_mm: u32,

    /// Label width in millimeters
    pub label_width_mm: u32,

    /// Minimum label height in millimeters
    pub min_label_height_mm: u32,

    /// Gap between labels in millimeters for gapped jobs
    pub gap_mm: u32,
}

impl PrinterConfig {
    /// # 80mm Label Printer
    ///
    /// ## Print Area
    ///
    /// ```text
    /// ├── 4mm ──┼────── 72mm printable ──────┼── 4mm ──┤
    /// │ margin  │         576 dots           │ margin  │
    /// ```
    pub const LABEL_80MM: Self = Self {
        name: "80mm label printer",
        width_dots: 576,
        dpi: 203,
        dots_per_mm: 8,
        label_width_mm: 80,
        min_label_height_mm: 10,
        gap_mm: 3,
    };

    /// Print width in bytes (one bit per dot)
    #[inline]
    pub fn width_bytes(&self) -> u32 {
        self.width_dots.div_ceil(8)
    }

    /// Convert millimeters to dots
    #[inline]
    pub fn mm_to_dots(&self, mm: u32) -> u32 {
        mm * self.dots_per_mm
    }

    /// Convert dots to whole millimeters (rounded down)
    #[inline]
    pub fn dots_to_mm(&self, dots: u32) -> u32 {
        dots / self.dots_per_mm
    }

    /// Label height for a page of `height_dots`, floored at the minimum height.
    ///
    /// ```
    /// use etiqueta::printer::PrinterConfig;
    ///
    /// let config = PrinterConfig::LABEL_80MM;
    /// assert_eq!(config.label_height_mm(800), 100);
    /// assert_eq!(config.label_height_mm(20), 10);
    /// ```
    pub fn label_height_mm(&self, height_dots: u32) -> u32 {
        self.dots_to_mm(height_dots).max(self.min_label_height_mm)
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::LABEL_80MM
    }
}

// ============================================================================
// SESSION CONFIG
// ============================================================================

/// Tunables for a printing session, loadable from a JSON file.
///
/// Every field has a default, so `{}` is a valid config:
///
/// ```json
/// {
///   "connect_timeout_secs": 10,
///   "page_delay_ms": 500,
///   "rfcomm_channel": 0,
///   "dither": "threshold",
///   "queue_depth": 8,
///   "chunk_size": 4096,
///   "chunk_delay_ms": 2,
///   "pdftoppm": "pdftoppm"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long `connect()` waits for the device-ready event.
    pub connect_timeout_secs: u64,
    /// Pause between pages so the printer buffer does not overflow.
    pub page_delay_ms: u64,
    /// RFCOMM device index to bind (`/dev/rfcommN`).
    pub rfcomm_channel: u8,
    /// Grayscale to black/white conversion.
    pub dither: Dither,
    /// Jobs that may wait behind the running one.
    pub queue_depth: usize,
    /// Largest single write to the RFCOMM TTY, in bytes.
    pub chunk_size: usize,
    /// Pause after each chunk of a split write.
    pub chunk_delay_ms: u64,
    /// `pdftoppm` binary used to render PDFs.
    pub pdftoppm: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            page_delay_ms: 500,
            rfcomm_channel: 0,
            dither: Dither::Threshold,
            queue_depth: 8,
            chunk_size: 4096,
            chunk_delay_ms: 2,
            pdftoppm: PathBuf::from("pdftoppm"),
        }
    }
}

impl SessionConfig {
    /// Load a config from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EtiquetaError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            EtiquetaError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
            .map_err(|e| EtiquetaError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[inline]
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn write_chunking(&self) -> WriteChunking {
        WriteChunking {
            size: self.chunk_size,
            delay: Duration::from_millis(self.chunk_delay_ms),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
