//! # Label Command Protocol
//!
//! A printed page is a linear byte stream of directives, always in this
//! order:
//!
//! | # | Directive | Notes |
//! |---|-----------|-------|
//! | 1 | header | start of label format |
//! | 2 | label geometry | width and height in mm |
//! | 3 | gap | first page of a job only |
//! | 4 | origin | absolute (0,0) |
//! | 5 | print direction | always reverse |
//! | 6 | bitmap | 1-bit page payload |
//! | 7 | copies | always 1 |
//! | 8 | footer | end of label format |
//!
//! The structure is fixed; the syntax is not. Each printer family spells
//! these directives its own way, so the syntax lives behind the
//! [`CommandGrammar`] trait and [`encoder::Encoder`] only decides what goes
//! in the buffer and in which order.
//!
//! The origin is part of every page buffer rather than a separate write ahead
//! of the job, so each buffer is self-contained and a page can never print
//! against an origin left over from another job.
//!
//! ## Module Structure
//!
//! - [`zpl`]: ZPL II directive builders and the [`zpl::Zpl`] grammar
//! - [`encoder`]: page + layout flags -> command buffer
//!
//! ## Usage Example
//!
//! ```
//! use etiqueta::printer::PrinterConfig;
//! use etiqueta::protocol::{encoder::Encoder, zpl::Zpl};
//! use etiqueta::raster::RasterPage;
//!
//! let encoder = Encoder::new(Zpl, PrinterConfig::LABEL_80MM);
//! let page = RasterPage::blank(576, 160, 0);
//!
//! let data = encoder.encode(&page, true, false).unwrap();
//! assert!(data.starts_with(b"^XA"));
//! assert!(data.ends_with(b"^XZ"));
//! ```

pub mod encoder;
pub mod zpl;

use crate::raster::dither::MonoBitmap;

/// Feed direction of the printed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintDirection {
    Normal,
    /// Rotated 180 degrees; matches top-to-bottom raster row order on
    /// printers that feed the label head-first.
    Reverse,
}

/// Label layout for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutParameters {
    /// Media width in millimeters.
    pub label_width_mm: u32,
    /// Label height in millimeters, floored at the printer minimum.
    pub label_height_mm: u32,
    /// Gap in millimeters. `None` leaves the printer's current setting.
    pub gap_mm: Option<u32>,
}

/// Syntax of one printer family's directives.
///
/// Each method returns one self-delimited directive. Implementations should
/// be pure: same arguments, same bytes.
pub trait CommandGrammar: Send + Sync {
    /// Short name for logs (e.g. `"zpl"`).
    fn name(&self) -> &'static str;

    fn header(&self) -> Vec<u8>;

    fn label_geometry(&self, width_mm: u32, height_mm: u32, dots_per_mm: u32) -> Vec<u8>;

    fn gap(&self, gap_mm: u32, dots_per_mm: u32) -> Vec<u8>;

    fn origin(&self, x: u32, y: u32) -> Vec<u8>;

    fn direction(&self, direction: PrintDirection) -> Vec<u8>;

    fn bitmap(&self, bitmap: &MonoBitmap) -> Vec<u8>;

    fn copies(&self, count: u32) -> Vec<u8>;

    fn footer(&self) -> Vec<u8>;
}
