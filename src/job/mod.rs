//! # Print Jobs
//!
//! A print job is one document printed start to finish on one connection.
//!
//! ## Pipeline
//!
//! ```text
//! Rasterizer ──► trim (all but last page, continuous only) ──► Encoder ──► DeviceSender
//!                                                                  │
//!                                                    pause between pages
//! ```
//!
//! - [`pump`]: runs one job, page by page
//! - [`queue`]: one worker task feeding jobs to the pump in order

pub mod pump;
pub mod queue;

use std::path::PathBuf;

use uuid::Uuid;

pub use pump::{TransmissionPump, encode_document};
pub use queue::PrintQueue;

/// A document to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    /// Identifies the job in logs.
    pub id: Uuid,
    pub path: PathBuf,
    /// `true` for gapped labels, `false` for continuous media.
    pub with_gap: bool,
}

impl PrintJob {
    pub fn new(path: impl Into<PathBuf>, with_gap: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            with_gap,
        }
    }
}

/// What a completed job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintSummary {
    pub job_id: Uuid,
    /// Pages sent, equal to the document's page count.
    pub pages: usize,
    /// Pages that went through bottom trimming.
    pub trimmed_pages: usize,
    pub bytes_sent: usize,
}
