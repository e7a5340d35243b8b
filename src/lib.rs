//! # Etiqueta - Label Printer Driver
//!
//! Etiqueta prints documents on 80mm ZPL label printers over Bluetooth
//! RFCOMM. It provides:
//!
//! - **Rasterization**: PDFs and images rendered to grayscale pages at printer width
//! - **Trimming**: trailing blank rows removed on continuous media
//! - **Protocol implementation**: ZPL command buffers with a 1-bit graphic field
//! - **Connection lifecycle**: connect with timeout, interruption detection, disconnect
//! - **Print queue**: one job at a time, page by page, with a pause between pages
//!
//! ## Quick Start
//!
//! ```no_run
//! use etiqueta::{PrinterSession, SessionConfig};
//!
//! # async fn example() -> Result<(), etiqueta::EtiquetaError> {
//! let session = PrinterSession::rfcomm(SessionConfig::default());
//!
//! // Connect (fails after 10 seconds without a ready event)
//! session.connect_device("00:11:62:AA:BB:CC").await?;
//!
//! // Print a PDF on continuous media
//! session.print_document("shipping-label.pdf", false).await?;
//!
//! session.disconnect();
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | Facade tying connection and print queue together |
//! | [`connection`] | Connection state machine and send path |
//! | [`job`] | Print jobs, transmission pump, print queue |
//! | [`raster`] | Rasterizers, trimming, dithering |
//! | [`protocol`] | Command grammar (ZPL) and page encoder |
//! | [`transport`] | Bluetooth RFCOMM links |
//! | [`printer`] | Printer profile and session config |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Currently tested with 80mm, 203 DPI label printers speaking ZPL. Other
//! ZPL printers should work with an adjusted [`PrinterConfig`].

pub mod connection;
pub mod error;
pub mod job;
pub mod printer;
pub mod protocol;
pub mod raster;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use connection::{ConnectionManager, ConnectionState, DeviceDescriptor};
pub use error::{ConnectionError, EtiquetaError, PrintError};
pub use job::{PrintJob, PrintSummary};
pub use printer::{PrinterConfig, SessionConfig};
pub use session::PrinterSession;
