//! # Printer Session
//!
//! The surface a host application (UI, plugin bridge, CLI) talks to. A
//! session owns one [`ConnectionManager`] and one [`PrintQueue`]; every
//! operation here is a thin call into one of them.
//!
//! ## Example
//!
//! ```no_run
//! use etiqueta::session::PrinterSession;
//! use etiqueta::printer::SessionConfig;
//!
//! # async fn example() -> Result<(), etiqueta::EtiquetaError> {
//! let session = PrinterSession::rfcomm(SessionConfig::default());
//!
//! session.connect_device("00:11:62:AA:BB:CC").await?;
//! let summary = session.print_document("invoice.pdf", false).await?;
//! println!("printed {} pages", summary.pages);
//! session.disconnect();
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::connection::{ConnectionManager, ConnectionState, DeviceDescriptor};
use crate::error::{ConnectionError, PrintError};
use crate::job::{PrintJob, PrintQueue, PrintSummary, TransmissionPump};
use crate::printer::{PrinterConfig, SessionConfig};
use crate::protocol::encoder::Encoder;
use crate::protocol::zpl::Zpl;
use crate::raster::{DocumentRasterizer, ImageRasterizer, PdfRasterizer, Rasterizer};
use crate::transport::{Connector, RfcommConnector};

/// One printer, one connection, one print queue.
#[derive(Debug)]
pub struct PrinterSession {
    connection: ConnectionManager,
    queue: PrintQueue,
}

impl PrinterSession {
    /// Build a session from its parts.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        connector: Arc<dyn Connector>,
        rasterizer: Arc<dyn Rasterizer>,
        encoder: Encoder,
        config: &SessionConfig,
    ) -> Self {
        let connection = ConnectionManager::new(connector, config.connect_timeout());
        let pump = TransmissionPump::new(rasterizer, encoder, connection.sender())
            .with_page_delay(config.page_delay());
        let queue = PrintQueue::spawn(pump, config.queue_depth);

        Self { connection, queue }
    }

    /// A session for an 80mm ZPL printer over Bluetooth RFCOMM, rendering
    /// PDFs and images.
    pub fn rfcomm(config: SessionConfig) -> Self {
        let encoder = Encoder::new(Zpl, PrinterConfig::LABEL_80MM).with_dither(config.dither);
        Self::new(
            Arc::new(
                RfcommConnector::new(config.rfcomm_channel).with_chunking(config.write_chunking()),
            ),
            Arc::new(DocumentRasterizer {
                pdf: PdfRasterizer::with_program(config.pdftoppm.clone()),
                images: ImageRasterizer,
            }),
            encoder,
            &config,
        )
    }

    pub async fn connect_device(&self, address: &str) -> Result<DeviceDescriptor, ConnectionError> {
        self.connection.connect(address).await
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn last_connection_error(&self) -> Option<String> {
        self.connection.last_error()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn device(&self) -> Option<DeviceDescriptor> {
        self.connection.device()
    }

    /// Print a document and wait for the job to finish.
    ///
    /// Jobs from concurrent callers run one at a time, in submission order.
    pub async fn print_document<P: AsRef<Path>>(
        &self,
        path: P,
        with_gap: bool,
    ) -> Result<PrintSummary, PrintError> {
        // Fail fast without waiting behind queued jobs.
        if !self.connection.is_connected() {
            return Err(PrintError::NotConnected);
        }
        self.queue
            .submit(PrintJob::new(path.as_ref(), with_gap))
            .await
    }

    /// Disconnect. Safe to call at any time, any number of times.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }
}
