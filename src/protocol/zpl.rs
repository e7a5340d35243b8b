//! # ZPL II Directives
//!
//! ZPL (Zebra Programming Language) is an ASCII label language understood by
//! most label printers. A label format starts with `^XA`, ends with `^XZ`, and
//! every command in between is a caret, two letters and comma separated
//! parameters.
//!
//! ## Units
//!
//! ZPL works in dots. Millimeter values are converted with the printer's
//! dots-per-mm before they are written:
//!
//! ```text
//! 80mm label at 8 dots/mm -> ^PW640
//! ```
//!
//! ## Graphics
//!
//! Bitmaps use `^GFA` (graphic field, ASCII hex). Every byte of packed 1-bit
//! data becomes two uppercase hex digits, so the hex payload never contains
//! a caret and cannot be mistaken for a command.
//!
//! ## Reference
//!
//! ZPL II Programming Guide, Zebra Technologies.

use super::{CommandGrammar, PrintDirection};
use crate::raster::dither::MonoBitmap;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// # Start Format (^XA)
///
/// Opens a label format. Everything up to the matching `^XZ` describes one
/// label.
///
/// ```
/// use etiqueta::protocol::zpl;
/// assert_eq!(zpl::start_format(), b"^XA".to_vec());
/// ```
#[inline]
pub fn start_format() -> Vec<u8> {
    b"^XA".to_vec()
}

/// # End Format (^XZ)
#[inline]
pub fn end_format() -> Vec<u8> {
    b"^XZ".to_vec()
}

/// # Print Width (^PW) and Label Length (^LL)
///
/// Both values in dots.
///
/// ```
/// use etiqueta::protocol::zpl;
/// assert_eq!(zpl::label_size(640, 800), b"^PW640^LL800".to_vec());
/// ```
pub fn label_size(width_dots: u32, length_dots: u32) -> Vec<u8> {
    format!("^PW{}^LL{}", width_dots, length_dots).into_bytes()
}

/// # Media Tracking (^MN)
///
/// - `^MNN`: continuous media, no gap between labels
/// - `^MNY`: non-continuous media, the printer senses the gap between labels
///
/// ZPL has no explicit gap length; any gap greater than zero selects gap
/// sensing.
pub fn media_tracking(gapped: bool) -> Vec<u8> {
    if gapped {
        b"^MNY".to_vec()
    } else {
        b"^MNN".to_vec()
    }
}

/// # Label Home (^LH)
///
/// Sets the absolute origin every field position is measured from.
pub fn label_home(x: u32, y: u32) -> Vec<u8> {
    format!("^LH{},{}", x, y).into_bytes()
}

/// # Print Orientation (^PO)
///
/// `^PON` prints normally, `^POI` rotates the label 180 degrees.
pub fn print_orientation(direction: PrintDirection) -> Vec<u8> {
    match direction {
        PrintDirection::Normal => b"^PON".to_vec(),
        PrintDirection::Reverse => b"^POI".to_vec(),
    }
}

/// # Graphic Field at Origin (^FO0,0 ^GFA ^FS)
///
/// ## Format
///
/// ```text
/// ^FO0,0^GFA,<total bytes>,<total bytes>,<bytes per row>,<hex data>^FS
/// ```
///
/// ```
/// use etiqueta::protocol::zpl;
/// use etiqueta::raster::dither::MonoBitmap;
///
/// let bitmap = MonoBitmap { width: 16, height: 1, row_bytes: 2, data: vec![0xF0, 0x0A] };
/// assert_eq!(zpl::graphic_field(&bitmap), b"^FO0,0^GFA,2,2,2,F00A^FS".to_vec());
/// ```
pub fn graphic_field(bitmap: &MonoBitmap) -> Vec<u8> {
    let total = bitmap.data.len();
    let header = format!("^FO0,0^GFA,{},{},{},", total, total, bitmap.row_bytes);

    let mut cmd = Vec::with_capacity(header.len() + total * 2 + 3);
    cmd.extend_from_slice(header.as_bytes());
    for &byte in &bitmap.data {
        cmd.push(HEX_DIGITS[(byte >> 4) as usize]);
        cmd.push(HEX_DIGITS[(byte & 0x0F) as usize]);
    }
    cmd.extend_from_slice(b"^FS");
    cmd
}

/// # Print Quantity (^PQ)
pub fn print_quantity(count: u32) -> Vec<u8> {
    format!("^PQ{}", count).into_bytes()
}

/// The ZPL II grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zpl;

impl CommandGrammar for Zpl {
    fn name(&self) -> &'static str {
        "zpl"
    }

    fn header(&self) -> Vec<u8> {
        start_format()
    }

    fn label_geometry(&self, width_mm: u32, height_mm: u32, dots_per_mm: u32) -> Vec<u8> {
        label_size(width_mm * dots_per_mm, height_mm * dots_per_mm)
    }

    fn gap(&self, gap_mm: u32, _dots_per_mm: u32) -> Vec<u8> {
        media_tracking(gap_mm > 0)
    }

    fn origin(&self, x: u32, y: u32) -> Vec<u8> {
        label_home(x, y)
    }

    fn direction(&self, direction: PrintDirection) -> Vec<u8> {
        print_orientation(direction)
    }

    fn bitmap(&self, bitmap: &MonoBitmap) -> Vec<u8> {
        graphic_field(bitmap)
    }

    fn copies(&self, count: u32) -> Vec<u8> {
        print_quantity(count)
    }

    fn footer(&self) -> Vec<u8> {
        end_format()
    }
}

// ============================================================================
// TESTS
// ============================================================================
