//! # Error Types
//!
//! This module defines error types used throughout the etiqueta library.
//!
//! | Error | Raised by |
//! |-------|-----------|
//! | [`ConnectionError`] | connection manager (`connect`) |
//! | [`LinkError`] | device links (writes) |
//! | [`RasterError`] | document rasterizers |
//! | [`EncodeError`] | command encoder |
//! | [`PrintError`] | transmission pump / print queue |
//! | [`EtiquetaError`] | CLI and other top-level callers |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for etiqueta operations
#[derive(Debug, Error)]
pub enum EtiquetaError {
    /// Connection lifecycle errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Print job errors
    #[error(transparent)]
    Print(#[from] PrintError),

    /// Rasterization errors outside of a print job
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Encoding errors outside of a print job
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Invalid configuration file or value
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a `connect()` attempt did not end in `Connected`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Invalid device address: {0:?}")]
    InvalidAddress(String),

    #[error("Device not found or not paired: {0}")]
    DeviceNotFound(String),

    #[error("Connection timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Connection interrupted: {0}")]
    Interrupted(String),

    /// The transport refused or failed to open the link.
    #[error("Link error: {0}")]
    Link(String),

    /// Superseded by a newer `connect()` or by `disconnect()`.
    #[error("Connection attempt cancelled")]
    Cancelled,
}

/// Errors from writing to an open device link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Link is not open")]
    NotOpen,

    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from turning a document into raster pages.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("Render error: {0}")]
    Render(String),
}

/// Errors from building a command buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Invalid page dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Why a print job did not complete.
///
/// Variants carrying an index report the first page (0-based) that failed;
/// pages before it were already sent and are not rolled back.
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("Printer not connected")]
    NotConnected,

    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("Failed to render document: {0}")]
    Render(String),

    #[error("Failed to encode page {index}: {source}")]
    Encode { index: usize, source: EncodeError },

    #[error("Failed to send page {failed_at}: {reason}")]
    Transmit { failed_at: usize, reason: String },

    #[error("Connection lost before page {failed_at}")]
    ConnectionLost { failed_at: usize },

    #[error("Print queue is closed")]
    QueueClosed,
}

impl From<RasterError> for PrintError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::DocumentNotFound(path) => PrintError::DocumentNotFound(path),
            RasterError::Render(msg) => PrintError::Render(msg),
        }
    }
}

impl PrintError {
    /// Index of the first page that was not printed, for mid-job failures.
    pub fn failed_at(&self) -> Option<usize> {
        match self {
            PrintError::Encode { index, .. } => Some(*index),
            PrintError::Transmit { failed_at, .. } | PrintError::ConnectionLost { failed_at } => {
                Some(*failed_at)
            }
            _ => None,
        }
    }
}
