//! Serial command channel to the external keyboard-emulator.
//!
//! The hardware is an ESP32-class BLE keyboard behind a USB-serial bridge.
//! It speaks a newline-terminated ASCII request/response protocol:
//!
//! | Command          | Meaning                    | Response            |
//! |------------------|----------------------------|---------------------|
//! | `KEY:<name>`     | tap a key                  | `OK:` / error       |
//! | `PRESS:<name>`   | hold a key down            | `OK:`               |
//! | `RELEASE:<name>` | release a held key         | `OK:`               |
//! | `RELEASEALL`     | release every held key     | `OK:`               |
//! | `TEXT:<string>`  | type literal text          | `OK:`               |
//! | `DELAY:<ms>`     | device-side wait           | `OK:`               |
//! | `STATUS`         | query BLE link status      | `OK:CONNECTED` / `OK:DISCONNECTED` |
//!
//! Every command is synchronous: one request line out, one response line
//! back within a bounded timeout.  The hardware is a single keystate
//! machine, so a connection serializes all commands it accepts — callers
//! that share a link do so behind a `Mutex`.
//!
//! Safety invariant: `RELEASEALL` is sent at connection establishment and on
//! every disconnection path (including drop), so a crash mid-choreography
//! can never leave a key held down in the game.

pub mod discovery;
pub mod link;
pub mod transport;

pub use discovery::{find_known_port, list_ports, resolve_port, KnownDevice, PortDiagnostic, KNOWN_DEVICES};
pub use link::{DeviceLink, LinkStatus, DEFAULT_BAUD, RESPONSE_TIMEOUT, STABILIZE_DELAY};
pub use transport::{SerialTransport, Transport};

use thiserror::Error;

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors surfaced by discovery, the transport, or the command protocol.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Ports exist, but none carries a known USB-serial bridge identifier.
    /// The message enumerates every discovered port for diagnostics.
    #[error("keyboard-emulator not found; available ports:\n{}", format_port_list(.0))]
    DeviceNotFound(Vec<PortDiagnostic>),

    /// No serial ports exist at all.
    #[error("no serial ports found")]
    NoPorts,

    /// The device did not answer within the per-command read timeout.
    #[error("timed out waiting for a device response")]
    ResponseTimeout,

    /// A command was issued on a torn-down connection.
    #[error("command issued on a closed device link")]
    LinkClosed,

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_port_list(ports: &[PortDiagnostic]) -> String {
    ports
        .iter()
        .map(|p| format!("  {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}
