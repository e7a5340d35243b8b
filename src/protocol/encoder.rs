//! # Page Encoder
//!
//! Turns one [`RasterPage`] into a complete command buffer for the printer.
//! Encoding is pure: no I/O, and the output depends only on the page, the
//! two job flags, and the printer profile.
//!
//! ## Gap Handling
//!
//! The gap directive is written on the first page of a job only. The printer
//! keeps the setting for the rest of the job, so later pages leave it out.
//!
//! ```text
//! page 0:  header geometry GAP origin direction bitmap copies footer
//! page 1+: header geometry     origin direction bitmap copies footer
//! ```

use super::{CommandGrammar, LayoutParameters, PrintDirection};
use crate::error::EncodeError;
use crate::printer::PrinterConfig;
use crate::raster::RasterPage;
use crate::raster::dither::{self, Dither};

/// Builds command buffers for one printer with one grammar.
pub struct Encoder {
    grammar: Box<dyn CommandGrammar>,
    printer: PrinterConfig,
    dither: Dither,
}

impl Encoder {
    pub fn new<G: CommandGrammar + 'static>(grammar: G, printer: PrinterConfig) -> Self {
        Self {
            grammar: Box::new(grammar),
            printer,
            dither: Dither::default(),
        }
    }

    /// Use a different grayscale conversion.
    pub fn with_dither(mut self, dither: Dither) -> Self {
        self.dither = dither;
        self
    }

    pub fn printer(&self) -> &PrinterConfig {
        &self.printer
    }

    pub fn grammar_name(&self) -> &'static str {
        self.grammar.name()
    }

    /// Label layout for `page`.
    pub fn layout(
        &self,
        page: &RasterPage,
        is_first_page: bool,
        with_gap: bool,
    ) -> Result<LayoutParameters, EncodeError> {
        check_dimensions(page)?;

        let gap_mm = is_first_page.then(|| if with_gap { self.printer.gap_mm } else { 0 });
        Ok(LayoutParameters {
            label_width_mm: self.printer.label_width_mm,
            label_height_mm: self.printer.label_height_mm(page.height()),
            gap_mm,
        })
    }

    /// Encode `page` as a command buffer.
    ///
    /// ## Errors
    ///
    /// [`EncodeError::InvalidDimensions`] when the page has no width or height.
    pub fn encode(
        &self,
        page: &RasterPage,
        is_first_page: bool,
        with_gap: bool,
    ) -> Result<Vec<u8>, EncodeError> {
        let layout = self.layout(page, is_first_page, with_gap)?;
        let bitmap = dither::pack_page(page, self.printer.width_dots, self.dither);
        let grammar = self.grammar.as_ref();
        let dots_per_mm = self.printer.dots_per_mm;

        let mut data = Vec::with_capacity(bitmap.data.len() * 2 + 128);
        data.extend(grammar.header());
        data.extend(grammar.label_geometry(
            layout.label_width_mm,
            layout.label_height_mm,
            dots_per_mm,
        ));
        if let Some(gap_mm) = layout.gap_mm {
            data.extend(grammar.gap(gap_mm, dots_per_mm));
        }
        data.extend(grammar.origin(0, 0));
        data.extend(grammar.direction(PrintDirection::Reverse));
        data.extend(grammar.bitmap(&bitmap));
        data.extend(grammar.copies(1));
        data.extend(grammar.footer());

        tracing::debug!(
            page = page.index,
            width = bitmap.width,
            height = bitmap.height,
            label_height_mm = layout.label_height_mm,
            gap_mm = ?layout.gap_mm,
            bytes = data.len(),
            "encoded page"
        );
        Ok(data)
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("grammar", &self.grammar.name())
            .field("printer", &self.printer.name)
            .field("dither", &self.dither)
            .finish()
    }
}

fn check_dimensions(page: &RasterPage) -> Result<(), EncodeError> {
    if page.width() == 0 || page.height() == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: page.width(),
            height: page.height(),
        });
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
