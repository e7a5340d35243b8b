//! # Bluetooth RFCOMM Transport
//!
//! This module provides communication with label printers over Bluetooth
//! Serial Port Profile (SPP) via RFCOMM.
//!
//! ## Bluetooth Setup (Linux)
//!
//! The printer must be paired with the host. Binding to an RFCOMM device is
//! done on demand by [`setup_rfcomm`], or manually:
//!
//! ```bash
//! $ bluetoothctl
//! [bluetooth]# scan on
//! [bluetooth]# pair 00:11:62:XX:XX:XX
//!
//! $ sudo rfcomm bind 0 00:11:62:XX:XX:XX
//! # This creates /dev/rfcomm0
//! ```
//!
//! ## TTY Configuration
//!
//! The RFCOMM device is opened in raw mode so binary data is transmitted
//! without modification:
//!
//! - **No input processing**: Disable IGNBRK, BRKINT, PARMRK, ISTRIP, etc.
//! - **No output processing**: Disable OPOST (no CR/LF translation)
//! - **8-bit characters**: CS8 (8 data bits, no parity)
//! - **No echo**: Disable ECHO, ECHONL
//! - **Non-canonical mode**: Disable ICANON (no line buffering)
//!
//! ## Chunked Writes
//!
//! Large data blocks are written in chunks to avoid overwhelming the
//! Bluetooth buffer. The default chunk size is 4096 bytes with a small
//! delay between chunks.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ConnectionError;

/// Default chunk size for writes (bytes)
const CHUNK_SIZE: usize = 4096;

/// Delay between chunks (milliseconds)
const CHUNK_DELAY_MS: u64 = 2;

/// RFCOMM channel used by SPP printers
const SPP_CHANNEL: &str = "1";

/// How large writes are split before they reach the TTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteChunking {
    /// Largest single write in bytes.
    pub size: usize,
    /// Pause after each chunk of a split write.
    pub delay: Duration,
}

impl Default for WriteChunking {
    fn default() -> Self {
        Self {
            size: CHUNK_SIZE,
            delay: Duration::from_millis(CHUNK_DELAY_MS),
        }
    }
}

/// # Bluetooth Printer Transport
///
/// An open, raw-mode RFCOMM TTY.
pub struct BluetoothTransport {
    file: File,
    chunking: WriteChunking,
}

impl BluetoothTransport {
    /// Open a Bluetooth connection to the printer.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - The device doesn't exist
    /// - Permission denied (may need root or dialout group)
    /// - TTY configuration fails
    pub fn open<P: AsRef<Path>>(device: P, chunking: WriteChunking) -> io::Result<Self> {
        let path = device.as_ref();

        let file = OpenOptions::new().write(true).open(path).map_err(|e| {
            io::Error::new(e.kind(), format!("Failed to open {}: {}", path.display(), e))
        })?;

        configure_tty_raw(file.as_raw_fd())?;
        debug!(device = %path.display(), chunk_size = chunking.size, "rfcomm tty open");

        Ok(Self { file, chunking })
    }

    /// Write data to the printer and flush.
    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        write_chunked(&mut self.file, data, &self.chunking)
    }
}

/// Write `data` and flush.
///
/// Small writes are sent directly. Large writes are chunked to avoid
/// overflowing the Bluetooth buffer.
fn write_chunked<W: Write>(writer: &mut W, data: &[u8], chunking: &WriteChunking) -> io::Result<()> {
    let size = chunking.size.max(1);
    if data.len() <= size {
        writer.write_all(data)?;
    } else {
        for chunk in data.chunks(size) {
            writer.write_all(chunk)?;

            if !chunking.delay.is_zero() {
                thread::sleep(chunking.delay);
            }
        }
    }

    writer.flush()
}

/// Configure a file descriptor for raw TTY mode.
///
/// Note: IXON/IXOFF/IXANY disable XON/XOFF software flow control. This is critical
/// because 0x11 (XON/DC1) and 0x13 (XOFF/DC3) can appear in binary data.
#[cfg(unix)]
fn configure_tty_raw(fd: i32) -> io::Result<()> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        let err = io::Error::last_os_error();
        return Err(io::Error::new(err.kind(), format!("tcgetattr failed: {}", err)));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);

    termios.c_oflag &= !libc::OPOST;

    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);

    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        let err = io::Error::last_os_error();
        return Err(io::Error::new(err.kind(), format!("tcsetattr failed: {}", err)));
    }

    Ok(())
}

#[cfg(not(unix))]
fn configure_tty_raw(_fd: i32) -> io::Result<()> {
    Ok(())
}

// ============================================================================
// DEVICE LOOKUP
// ============================================================================

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Parse `bluetoothctl devices` output into `(MAC, name)` pairs.
///
/// Lines look like `Device 00:11:62:AA:BB:CC Printer Name`.
pub fn parse_device_list(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("Device ")?;
            let (mac, name) = rest.split_once(' ').unwrap_or((rest, ""));
            if !is_valid_mac(mac) {
                return None;
            }
            let name = if name.trim().is_empty() { mac } else { name.trim() };
            Some((mac.to_uppercase(), name.to_string()))
        })
        .collect()
}

/// Look up a paired device by MAC and return its display name.
///
/// Returns `Ok(None)` when `bluetoothctl` runs but the device is not paired.
pub fn find_paired_device(mac: &str) -> io::Result<Option<String>> {
    let mac_upper = mac.to_uppercase();

    let mut output = Command::new("bluetoothctl").args(["devices", "Paired"]).output()?;
    if !output.status.success() || output.stdout.is_empty() {
        // Older bluez only knows the dedicated subcommand
        output = Command::new("bluetoothctl").arg("paired-devices").output()?;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_device_list(&stdout)
        .into_iter()
        .find(|(addr, _)| *addr == mac_upper)
        .map(|(_, name)| name))
}

/// Find an existing RFCOMM device bound to the given MAC address.
///
/// Checks `/proc/net/rfcomm` and falls back to `rfcomm -a` command.
/// Returns the device path (e.g., "/dev/rfcomm0") if found.
#[cfg(unix)]
pub fn find_rfcomm_for_mac(mac: &str) -> io::Result<Option<String>> {
    let mac_upper = mac.to_uppercase();

    // Format: "rfcomm0: XX:XX:XX:XX:XX:XX channel N ..."
    if let Ok(contents) = fs::read_to_string("/proc/net/rfcomm") {
        if let Some(path) = device_for_mac(&contents, &mac_upper) {
            return Ok(Some(path));
        }
    }

    let output = Command::new("rfcomm").arg("-a").output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(device_for_mac(&stdout, &mac_upper))
}

#[cfg(not(unix))]
pub fn find_rfcomm_for_mac(_mac: &str) -> io::Result<Option<String>> {
    Ok(None)
}

fn device_for_mac(listing: &str, mac_upper: &str) -> Option<String> {
    listing
        .lines()
        .filter(|line| line.to_uppercase().contains(mac_upper))
        .filter_map(|line| line.split(':').next())
        .map(|dev_name| format!("/dev/{}", dev_name.trim()))
        .find(|device_path| Path::new(device_path).exists())
}

/// Set up an RFCOMM device for a Bluetooth MAC address.
///
/// Runs:
/// 1. `bluetoothctl connect <MAC>` - connect to device
/// 2. `l2ping -c 1 <MAC>` - verify connectivity
/// 3. `rfcomm bind <channel> <MAC> 1` - create /dev/rfcommN
///
/// Returns the device path on success (e.g., "/dev/rfcomm0").
///
/// **Requires root privileges** for `rfcomm bind`.
#[cfg(unix)]
pub fn setup_rfcomm(mac: &str, channel: u8) -> Result<String, ConnectionError> {
    let mac_upper = mac.to_uppercase();
    let device_path = format!("/dev/rfcomm{}", channel);

    info!(mac = %mac_upper, "connecting");
    let output = Command::new("bluetoothctl")
        .arg("connect")
        .arg(&mac_upper)
        .output()
        .map_err(|e| ConnectionError::Link(format!("Failed to run bluetoothctl: {}", e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.contains("Connection successful") || stdout.contains("already connected") {
        debug!(mac = %mac_upper, "bluetoothctl connected");
    } else {
        // l2ping below decides
        warn!(mac = %mac_upper, output = %stdout.trim(), "bluetoothctl did not confirm connection");
    }

    thread::sleep(Duration::from_millis(500));

    let output = Command::new("l2ping")
        .arg("-c")
        .arg("1")
        .arg(&mac_upper)
        .output()
        .map_err(|e| ConnectionError::Link(format!("Failed to run l2ping: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConnectionError::Link(format!(
            "Device {} not reachable: {}",
            mac_upper,
            stderr.trim()
        )));
    }
    debug!(mac = %mac_upper, "device reachable");

    let output = Command::new("rfcomm")
        .arg("bind")
        .arg(channel.to_string())
        .arg(&mac_upper)
        .arg(SPP_CHANNEL)
        .output()
        .map_err(|e| ConnectionError::Link(format!("Failed to run rfcomm bind: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConnectionError::Link(format!(
            "rfcomm bind failed: {}",
            stderr.trim()
        )));
    }

    thread::sleep(Duration::from_millis(500));

    if !Path::new(&device_path).exists() {
        return Err(ConnectionError::Link(format!(
            "Device {} was not created",
            device_path
        )));
    }

    info!(device = %device_path, "rfcomm bound");
    Ok(device_path)
}

#[cfg(not(unix))]
pub fn setup_rfcomm(_mac: &str, _channel: u8) -> Result<String, ConnectionError> {
    Err(ConnectionError::Link(
        "RFCOMM setup not supported on this platform".to_string(),
    ))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_mac_addresses() {
        assert!(is_valid_mac("00:11:22:33:44:55"));
        assert!(is_valid_mac("AA:BB:CC:DD:EE:FF"));
        assert!(is_valid_mac("aa:bb:cc:dd:ee:ff"));
        assert!(is_valid_mac("00:00:00:00:00:00"));
    }

    #[test]
    fn test_invalid_mac_addresses() {
        assert!(!is_valid_mac("00:11:22:33:44")); // too short
        assert!(!is_valid_mac("00:11:22:33:44:55:66")); // too long
        assert!(!is_valid_mac("00-11-22-33-44-55")); // wrong separator
        assert!(!is_valid_mac("GG:HH:II:JJ:KK:LL")); // invalid hex
        assert!(!is_valid_mac("")); // empty
        assert!(!is_valid_mac("not-a-mac")); // garbage
    }

    #[test]
    fn test_parse_device_list() {
        let output = "\
Device 00:11:62:AA:BB:CC RPP02N
Device aa:bb:cc:dd:ee:ff Kitchen Label Printer
Controller 11:22:33:44:55:66 host [default]
Device 11:22:33:44:55:66
garbage line
";
        let devices = parse_device_list(output);
        assert_eq!(
            devices,
            vec![
                ("00:11:62:AA:BB:CC".to_string(), "RPP02N".to_string()),
                (
                    "AA:BB:CC:DD:EE:FF".to_string(),
                    "Kitchen Label Printer".to_string()
                ),
                ("11:22:33:44:55:66".to_string(), "11:22:33:44:55:66".to_string()),
            ]
        );
    }

    #[test]
    fn test_device_for_mac_requires_existing_node() {
        let listing = "rfcomm42: 00:11:62:AA:BB:CC channel 1 clean\n";
        assert_eq!(device_for_mac(listing, "00:11:62:AA:BB:CC"), None);
        assert_eq!(device_for_mac(listing, "FF:FF:FF:FF:FF:FF"), None);
    }

    /// Records the length of every write it receives.
    #[derive(Default)]
    struct WriteLog {
        writes: Vec<usize>,
        flushes: usize,
    }

    impl Write for WriteLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(buf.len());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_large_writes_are_chunked() {
        let chunking = WriteChunking {
            size: 4096,
            delay: Duration::ZERO,
        };
        let mut log = WriteLog::default();
        write_chunked(&mut log, &[0u8; 10_000], &chunking).unwrap();

        assert_eq!(log.writes, vec![4096, 4096, 1808]);
        assert_eq!(log.flushes, 1);
    }

    #[test]
    fn test_small_write_is_single() {
        let mut log = WriteLog::default();
        write_chunked(&mut log, b"^XA^XZ", &WriteChunking::default()).unwrap();
        assert_eq!(log.writes, vec![6]);
    }

    #[test]
    fn test_zero_chunk_size_still_writes() {
        let chunking = WriteChunking {
            size: 0,
            delay: Duration::ZERO,
        };
        let mut log = WriteLog::default();
        write_chunked(&mut log, b"abc", &chunking).unwrap();
        assert_eq!(log.writes, vec![1, 1, 1]);
    }

    // Note: Most transport tests require actual hardware.
    // Integration tests should be run manually with a connected printer.
}
