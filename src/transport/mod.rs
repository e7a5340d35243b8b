//! # Printer Transport Layer
//!
//! This module provides communication backends for sending data to printers.
//!
//! ## Available Transports
//!
//! - [`bluetooth`]: Bluetooth RFCOMM TTY access and device lookup (Linux)
//! - [`link`]: the [`Connector`]/[`DeviceLink`] seam used by the connection
//!   manager, with the RFCOMM implementation

pub mod bluetooth;
pub mod link;

pub use bluetooth::{BluetoothTransport, WriteChunking};
pub use link::{Connector, DeviceLink, LinkEvent, LinkEvents, RfcommConnector};
