//! Fakes shared by the integration tests: a connector whose links report
//! readiness on command, links that record every write, and a rasterizer
//! serving striped pages from memory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{GrayImage, Luma};

use etiqueta::connection::DeviceDescriptor;
use etiqueta::error::{ConnectionError, LinkError, RasterError};
use etiqueta::printer::{PrinterConfig, SessionConfig};
use etiqueta::protocol::encoder::Encoder;
use etiqueta::protocol::zpl::Zpl;
use etiqueta::raster::{Pages, RasterPage, Rasterizer};
use etiqueta::session::PrinterSession;
use etiqueta::transport::{Connector, DeviceLink, LinkEvents};

pub const ADDRESS: &str = "00:11:62:AA:BB:CC";

/// Page height produced by [`FakeRasterizer`].
pub const PAGE_HEIGHT: u32 = 400;
/// Row holding the only ink on a [`FakeRasterizer`] page.
pub const CONTENT_ROW: u32 = 100;

// ============================================================================
// CONNECTOR
// ============================================================================

/// What a dialed link reports after `dial()`.
#[derive(Debug, Clone)]
pub enum Handshake {
    /// `Ready` right away.
    Ready,
    /// `Ready` after a delay.
    ReadyAfter(Duration),
    /// Nothing, ever.
    Silent,
    /// `Failed` right away.
    Fail(String),
}

/// How dialed links behave once open.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkBehavior {
    /// Emit `Dropped` after this many successful writes.
    pub drop_after: Option<usize>,
    /// Fail the write with this 0-based index.
    pub fail_at: Option<usize>,
    /// Report the link as not open on the write with this 0-based index,
    /// without emitting any event.
    pub closed_at: Option<usize>,
}

pub struct FakeConnector {
    handshake: Handshake,
    behavior: LinkBehavior,
    known: bool,
    /// Every write on every link, in order.
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Links in dial order.
    pub links: Mutex<Vec<Arc<FakeLink>>>,
}

impl FakeConnector {
    pub fn new(handshake: Handshake) -> Self {
        Self {
            handshake,
            behavior: LinkBehavior::default(),
            known: true,
            sent: Arc::new(Mutex::new(Vec::new())),
            links: Mutex::new(Vec::new()),
        }
    }

    /// A connector that knows no devices.
    pub fn unknown() -> Self {
        Self {
            known: false,
            ..Self::new(Handshake::Ready)
        }
    }

    pub fn with_behavior(mut self, behavior: LinkBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn link(&self, index: usize) -> Arc<FakeLink> {
        Arc::clone(&self.links.lock().unwrap()[index])
    }

    pub fn dial_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// Make the most recent link report `Dropped`.
    pub fn drop_link(&self) {
        let links = self.links.lock().unwrap();
        if let Some(link) = links.last() {
            link.events.dropped();
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn resolve(&self, address: &str) -> Result<DeviceDescriptor, ConnectionError> {
        if !self.known {
            return Err(ConnectionError::DeviceNotFound(address.to_string()));
        }
        Ok(DeviceDescriptor::new(address, "Fake Label Printer"))
    }

    fn dial(
        &self,
        _device: &DeviceDescriptor,
        events: LinkEvents,
    ) -> Result<Arc<dyn DeviceLink>, ConnectionError> {
        let link = Arc::new(FakeLink {
            events: events.clone(),
            behavior: self.behavior,
            writes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            sent: Arc::clone(&self.sent),
        });
        self.links.lock().unwrap().push(Arc::clone(&link));

        match self.handshake.clone() {
            Handshake::Ready => events.ready(),
            Handshake::ReadyAfter(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    events.ready();
                });
            }
            Handshake::Silent => {}
            Handshake::Fail(reason) => events.failed(reason),
        }

        Ok(link)
    }
}

// ============================================================================
// LINK
// ============================================================================

pub struct FakeLink {
    events: LinkEvents,
    behavior: LinkBehavior,
    writes: AtomicUsize,
    closed: AtomicBool,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FakeLink {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DeviceLink for FakeLink {
    fn write(&self, data: &[u8]) -> Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::NotOpen);
        }

        let index = self.writes.fetch_add(1, Ordering::SeqCst);
        if self.behavior.closed_at == Some(index) {
            return Err(LinkError::NotOpen);
        }
        if self.behavior.fail_at == Some(index) {
            return Err(LinkError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }

        self.sent.lock().unwrap().push(data.to_vec());
        if self.behavior.drop_after == Some(index + 1) {
            self.events.dropped();
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// RASTERIZER
// ============================================================================

/// Serves documents from memory: each known path has a page count, every
/// page is full width, [`PAGE_HEIGHT`] rows, black only on [`CONTENT_ROW`].
#[derive(Default)]
pub struct FakeRasterizer {
    documents: HashMap<PathBuf, usize>,
}

impl FakeRasterizer {
    pub fn with_document(mut self, path: &str, pages: usize) -> Self {
        self.documents.insert(PathBuf::from(path), pages);
        self
    }
}

impl Rasterizer for FakeRasterizer {
    fn render(&self, path: &Path, target_width: u32) -> Result<Pages, RasterError> {
        let count = *self
            .documents
            .get(path)
            .ok_or_else(|| RasterError::DocumentNotFound(path.to_path_buf()))?;

        let pages: Vec<RasterPage> = (0..count)
            .map(|index| striped_page(target_width, index))
            .collect();
        Ok(Pages::new(pages))
    }
}

pub fn striped_page(width: u32, index: usize) -> RasterPage {
    let mut image = GrayImage::from_pixel(width, PAGE_HEIGHT, Luma([255]));
    for x in 0..width {
        image.put_pixel(x, CONTENT_ROW, Luma([0]));
    }
    RasterPage::new(image, index)
}

// ============================================================================
// SESSION
// ============================================================================

pub fn session_config() -> SessionConfig {
    SessionConfig::default()
}

pub fn zpl_encoder() -> Encoder {
    Encoder::new(Zpl, PrinterConfig::LABEL_80MM)
}

/// A session over `connector` and `rasterizer` with default tunables.
pub fn session(connector: &Arc<FakeConnector>, rasterizer: impl Rasterizer + 'static) -> PrinterSession {
    PrinterSession::new(
        Arc::clone(connector) as Arc<dyn Connector>,
        Arc::new(rasterizer),
        zpl_encoder(),
        &session_config(),
    )
}

/// Occurrences of `needle` in a command buffer.
pub fn count(buffer: &[u8], needle: &str) -> usize {
    String::from_utf8_lossy(buffer).matches(needle).count()
}
