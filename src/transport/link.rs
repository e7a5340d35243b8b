//! # Device Links
//!
//! A link is the live resource behind a connection: an open byte pipe to one
//! printer. Links are opened by a [`Connector`] and owned by the
//! [`ConnectionManager`](crate::connection::ConnectionManager).
//!
//! Opening is asynchronous. [`Connector::dial`] returns the link right away;
//! the link reports through its [`LinkEvents`] once it is usable, if it fails
//! to open, and if it drops later.
//!
//! ```text
//! dial() ──► link (not ready) ──► LinkEvent::Ready ──► writes allowed
//!                  │                      │
//!                  └─► LinkEvent::Failed  └─► LinkEvent::Dropped
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::bluetooth::{self, BluetoothTransport, WriteChunking};
use crate::connection::DeviceDescriptor;
use crate::error::{ConnectionError, LinkError};

/// Something a link reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link is open and accepts writes.
    Ready,
    /// The link could not be opened.
    Failed(String),
    /// A previously ready link went away.
    Dropped,
}

/// Where a link sends its [`LinkEvent`]s.
///
/// Every event is tagged with the generation of the connection attempt that
/// created the link, so the receiver can ignore links it has moved past.
#[derive(Debug, Clone)]
pub struct LinkEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, LinkEvent)>,
}

impl LinkEvents {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, LinkEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ready(&self) {
        self.emit(LinkEvent::Ready);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.emit(LinkEvent::Failed(reason.into()));
    }

    pub fn dropped(&self) {
        self.emit(LinkEvent::Dropped);
    }

    fn emit(&self, event: LinkEvent) {
        // A closed channel means the manager is gone; nobody is listening.
        let _ = self.tx.send((self.generation, event));
    }
}

/// An open (or opening) byte pipe to a printer.
pub trait DeviceLink: Send + Sync {
    /// Write `data` and flush. Blocks; call from a blocking context.
    fn write(&self, data: &[u8]) -> Result<(), LinkError>;

    /// Release the link. Later writes fail with [`LinkError::NotOpen`].
    fn close(&self);
}

/// Opens links to devices.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Check that `address` names a device this host can reach.
    async fn resolve(&self, address: &str) -> Result<DeviceDescriptor, ConnectionError>;

    /// Start opening a link. Must not block; readiness is reported through
    /// `events`.
    fn dial(
        &self,
        device: &DeviceDescriptor,
        events: LinkEvents,
    ) -> Result<Arc<dyn DeviceLink>, ConnectionError>;
}

// ============================================================================
// RFCOMM
// ============================================================================

/// Opens RFCOMM links to paired Bluetooth printers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RfcommConnector {
    /// `/dev/rfcommN` index used when the device is not bound yet.
    pub channel: u8,
    /// Write splitting for opened links.
    pub chunking: WriteChunking,
}

impl RfcommConnector {
    pub fn new(channel: u8) -> Self {
        Self {
            channel,
            chunking: WriteChunking::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: WriteChunking) -> Self {
        self.chunking = chunking;
        self
    }
}

#[async_trait]
impl Connector for RfcommConnector {
    async fn resolve(&self, address: &str) -> Result<DeviceDescriptor, ConnectionError> {
        if !bluetooth::is_valid_mac(address) {
            return Err(ConnectionError::DeviceNotFound(format!(
                "{} is not a Bluetooth address",
                address
            )));
        }

        let mac = address.to_uppercase();
        let lookup_mac = mac.clone();
        let name = tokio::task::spawn_blocking(move || lookup_device(&lookup_mac))
            .await
            .map_err(|e| ConnectionError::Link(format!("Device lookup failed: {}", e)))??;

        Ok(DeviceDescriptor::new(mac, name))
    }

    fn dial(
        &self,
        device: &DeviceDescriptor,
        events: LinkEvents,
    ) -> Result<Arc<dyn DeviceLink>, ConnectionError> {
        let link = Arc::new(RfcommLink::new(events.clone()));
        let opener = Arc::clone(&link);
        let mac = device.address.clone();
        let channel = self.channel;
        let chunking = self.chunking;

        thread::Builder::new()
            .name("rfcomm-dial".to_string())
            .spawn(move || match open_transport(&mac, channel, chunking) {
                Ok(transport) => {
                    if opener.attach(transport) {
                        events.ready();
                    }
                }
                Err(reason) => events.failed(reason),
            })
            .map_err(|e| ConnectionError::Link(format!("Failed to spawn dial thread: {}", e)))?;

        Ok(link)
    }
}

/// Display name of a paired device, or the RFCOMM binding as a fallback.
fn lookup_device(mac: &str) -> Result<String, ConnectionError> {
    match bluetooth::find_paired_device(mac) {
        Ok(Some(name)) => return Ok(name),
        Ok(None) => debug!(mac, "not in paired devices"),
        Err(e) => warn!(mac, error = %e, "bluetoothctl unavailable"),
    }

    match bluetooth::find_rfcomm_for_mac(mac) {
        Ok(Some(device_path)) => {
            debug!(mac, device = %device_path, "found existing rfcomm binding");
            Ok(mac.to_string())
        }
        _ => Err(ConnectionError::DeviceNotFound(format!(
            "{} is not paired. Please check Bluetooth settings.",
            mac
        ))),
    }
}

fn open_transport(
    mac: &str,
    channel: u8,
    chunking: WriteChunking,
) -> Result<BluetoothTransport, String> {
    let device_path = match bluetooth::find_rfcomm_for_mac(mac) {
        Ok(Some(path)) => path,
        _ => bluetooth::setup_rfcomm(mac, channel).map_err(|e| e.to_string())?,
    };

    BluetoothTransport::open(&device_path, chunking).map_err(|e| e.to_string())
}

/// A link backed by an RFCOMM TTY.
pub struct RfcommLink {
    transport: Mutex<Option<BluetoothTransport>>,
    closed: AtomicBool,
    events: LinkEvents,
}

impl RfcommLink {
    fn new(events: LinkEvents) -> Self {
        Self {
            transport: Mutex::new(None),
            closed: AtomicBool::new(false),
            events,
        }
    }

    /// Install the opened transport. Returns false if the link was closed
    /// while it was opening.
    fn attach(&self, transport: BluetoothTransport) -> bool {
        let mut slot = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        *slot = Some(transport);
        true
    }
}

impl DeviceLink for RfcommLink {
    fn write(&self, data: &[u8]) -> Result<(), LinkError> {
        let mut slot = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
        let transport = slot.as_mut().ok_or(LinkError::NotOpen)?;

        if let Err(e) = transport.write_all(data) {
            warn!(error = %e, "rfcomm write failed, dropping link");
            *slot = None;
            self.events.dropped();
            return Err(LinkError::Io(e));
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut slot = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}

// ============================================================================
// TESTS
// ============================================================================
