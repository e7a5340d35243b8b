//! # Printer Module
//!
//! This module provides printer-specific configurations.
//!
//! ## Modules
//!
//! - [`config`]: Printer hardware specifications and session tunables

pub mod config;

pub use config::{PrinterConfig, SessionConfig};
