//! # Print Queue
//!
//! One worker task per session runs jobs through the [`TransmissionPump`]
//! strictly one after another, so two jobs never interleave on the link.
//! Callers submit a job and wait on a oneshot for its result.

use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, info_span};

use super::{PrintJob, PrintSummary, TransmissionPump};
use crate::error::PrintError;

/// A job waiting for the worker, with the channel to answer on.
#[derive(Debug)]
struct PrintRequest {
    job: PrintJob,
    respond_to: oneshot::Sender<Result<PrintSummary, PrintError>>,
}

/// Handle to the print worker.
#[derive(Debug, Clone)]
pub struct PrintQueue {
    tx: mpsc::Sender<PrintRequest>,
}

impl PrintQueue {
    /// Start the worker. `depth` jobs may wait behind the running one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(pump: TransmissionPump, depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth.max(1));
        tokio::spawn(run_worker(pump, rx));
        Self { tx }
    }

    /// Queue `job` and wait for it to finish.
    pub async fn submit(&self, job: PrintJob) -> Result<PrintSummary, PrintError> {
        let (respond_to, response) = oneshot::channel();
        self.tx
            .send(PrintRequest { job, respond_to })
            .await
            .map_err(|_| PrintError::QueueClosed)?;

        response.await.map_err(|_| PrintError::QueueClosed)?
    }
}

async fn run_worker(pump: TransmissionPump, mut requests: mpsc::Receiver<PrintRequest>) {
    while let Some(PrintRequest { job, respond_to }) = requests.recv().await {
        let span = info_span!("print_job", job = %job.id);
        let result = pump.run(&job).instrument(span).await;

        if respond_to.send(result).is_err() {
            debug!(job = %job.id, "caller stopped waiting for job result");
        }
    }
    debug!("print queue closed");
}
