//! # Transmission Pump
//!
//! Runs one [`PrintJob`] against the connected printer.
//!
//! For page `i` of `N`:
//!
//! 1. trim, if `i < N - 1` and the job is continuous
//! 2. encode (gap directive only for `i == 0`)
//! 3. check the connection is still up
//! 4. send
//! 5. pause, if `i < N - 1`
//!
//! The first failure stops the job. Pages already sent stay printed; the
//! error carries the index of the page that failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{PrintJob, PrintSummary};
use crate::connection::DeviceSender;
use crate::error::{LinkError, PrintError, RasterError};
use crate::protocol::encoder::Encoder;
use crate::raster::{Pages, RasterPage, Rasterizer, trim};

/// Default pause between pages.
pub const PAGE_DELAY: Duration = Duration::from_millis(500);

/// Pushes the pages of a job through trim, encode and send.
pub struct TransmissionPump {
    rasterizer: Arc<dyn Rasterizer>,
    encoder: Encoder,
    sender: DeviceSender,
    page_delay: Duration,
}

impl TransmissionPump {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, encoder: Encoder, sender: DeviceSender) -> Self {
        Self {
            rasterizer,
            encoder,
            sender,
            page_delay: PAGE_DELAY,
        }
    }

    /// Set the pause between pages. Default is 500ms.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Print `job`.
    ///
    /// ## Errors
    ///
    /// - [`PrintError::NotConnected`] before anything is rendered
    /// - [`PrintError::DocumentNotFound`] / [`PrintError::Render`] before
    ///   anything is sent
    /// - [`PrintError::Encode`], [`PrintError::ConnectionLost`],
    ///   [`PrintError::Transmit`] with the index of the failed page
    pub async fn run(&self, job: &PrintJob) -> Result<PrintSummary, PrintError> {
        if !self.sender.is_connected() {
            warn!(job = %job.id, "printer not connected");
            return Err(PrintError::NotConnected);
        }

        info!(job = %job.id, path = %job.path.display(), with_gap = job.with_gap, "starting print job");
        let pages = self.render(job.path.clone()).await?;

        let mut pages = pages.peekable();
        let mut summary = PrintSummary {
            job_id: job.id,
            pages: 0,
            trimmed_pages: 0,
            bytes_sent: 0,
        };

        while let Some(page) = pages.next() {
            let index = summary.pages;
            let is_last = pages.peek().is_none();

            let (data, trimmed) = prepare_page(&self.encoder, page, index, is_last, job.with_gap)?;
            if trimmed {
                summary.trimmed_pages += 1;
            }

            if !self.sender.is_connected() {
                warn!(job = %job.id, page = index, "connection lost");
                return Err(PrintError::ConnectionLost { failed_at: index });
            }

            let len = data.len();
            self.sender.send(data).await.map_err(|e| match e {
                // Released between the check above and the write.
                LinkError::NotOpen => {
                    warn!(job = %job.id, page = index, "connection lost during send");
                    PrintError::ConnectionLost { failed_at: index }
                }
                e => {
                    warn!(job = %job.id, page = index, error = %e, "send failed");
                    PrintError::Transmit {
                        failed_at: index,
                        reason: e.to_string(),
                    }
                }
            })?;
            debug!(job = %job.id, page = index, bytes = len, "page sent");

            summary.pages += 1;
            summary.bytes_sent += len;

            if !is_last {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        if summary.pages == 0 {
            return Err(PrintError::Render("Document has no pages".to_string()));
        }

        info!(
            job = %job.id,
            pages = summary.pages,
            bytes = summary.bytes_sent,
            "print job completed"
        );
        Ok(summary)
    }

    async fn render(&self, path: PathBuf) -> Result<Pages, PrintError> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let width = self.encoder.printer().width_dots;

        let pages = tokio::task::spawn_blocking(move || rasterizer.render(&path, width))
            .await
            .map_err(|e| PrintError::Render(format!("Rasterizer panicked: {}", e)))?
            .map_err(|e: RasterError| {
                warn!(error = %e, "rasterization failed");
                PrintError::from(e)
            })?;
        Ok(pages)
    }
}

/// Trim (when continuous and not last) and encode one page.
///
/// Returns the command buffer and whether the page was trimmed. The page is
/// dropped before returning.
fn prepare_page(
    encoder: &Encoder,
    page: RasterPage,
    index: usize,
    is_last: bool,
    with_gap: bool,
) -> Result<(Vec<u8>, bool), PrintError> {
    let trimmed = !is_last && !with_gap;
    let page = if trimmed { trim(page) } else { page };

    let data = encoder
        .encode(&page, index == 0, with_gap)
        .map_err(|source| PrintError::Encode { index, source })?;
    Ok((data, trimmed))
}

/// Run the trim and encode steps of a job without a printer.
///
/// Returns one command buffer per page, exactly what [`TransmissionPump::run`]
/// would send. Used by the CLI to inspect the command stream.
pub fn encode_document(
    rasterizer: &dyn Rasterizer,
    encoder: &Encoder,
    path: &Path,
    with_gap: bool,
) -> Result<Vec<Vec<u8>>, PrintError> {
    let mut pages = rasterizer
        .render(path, encoder.printer().width_dots)?
        .peekable();

    let mut buffers = Vec::new();
    while let Some(page) = pages.next() {
        let is_last = pages.peek().is_none();
        let (data, _) = prepare_page(encoder, page, buffers.len(), is_last, with_gap)?;
        buffers.push(data);
    }

    if buffers.is_empty() {
        return Err(PrintError::Render("Document has no pages".to_string()));
    }
    debug!(
        path = %path.display(),
        grammar = encoder.grammar_name(),
        pages = buffers.len(),
        "encoded document"
    );
    Ok(buffers)
}

impl std::fmt::Debug for TransmissionPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmissionPump")
            .field("encoder", &self.encoder)
            .field("page_delay", &self.page_delay)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================
