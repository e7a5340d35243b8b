//! # Connection Lifecycle
//!
//! The [`ConnectionManager`] owns the printer link and the state machine
//! around it:
//!
//! ```text
//!                 connect()                 device ready
//! Disconnected ─────────────► Connecting ─────────────────► Connected
//!       ▲                        │                              │
//!       │                        │ timeout / not found /        │ link dropped
//!       │                        │ link failed                  ▼
//!       │                        └──────────► Failed       Interrupted
//!       │                                                       │
//!       └────────────────── disconnect() (from any state) ──────┘
//! ```
//!
//! `Interrupted` and `Failed` are terminal: nothing reconnects on its own, the
//! caller has to `connect()` again.

mod manager;

pub use manager::{ConnectionManager, DeviceSender};

/// Where the connection state machine currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Interrupted,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Interrupted => "interrupted",
            ConnectionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A printer the host knows how to reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Bluetooth MAC, uppercase (`00:11:62:AA:BB:CC`).
    pub address: String,
    /// Display name reported by the host.
    pub name: String,
}

impl DeviceDescriptor {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
