//! The DeviceLink command protocol.
//!
//! [`DeviceLink`] owns one live connection to the keyboard-emulator and
//! exposes the command vocabulary as methods.  Every call is synchronous:
//! one line out, one response line back within [`RESPONSE_TIMEOUT`].
//!
//! Lifecycle invariants:
//!
//! * `connect` ends with `RELEASEALL` — keys stuck from a prior session are
//!   cleared before any caller issues a command.
//! * `disconnect` starts with `RELEASEALL` and is idempotent; `Drop` calls
//!   it too, so every exit path releases the keyboard.

use std::collections::HashSet;
use std::time::Duration;

use super::transport::{SerialTransport, Transport};
use super::{discovery, DeviceError};

/// Default baud rate of the USB-serial bridge.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Wait after opening the port before talking — the ESP32 resets on serial
/// connect and its BLE stack needs a moment to settle.
pub const STABILIZE_DELAY: Duration = Duration::from_secs(2);

/// Bound on how long one command may wait for its response line.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// LinkStatus
// ---------------------------------------------------------------------------

/// Parsed result of the `STATUS` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Device is paired and connected to a Bluetooth host.
    Connected,
    /// Device is alive but not paired to any host yet.
    Disconnected,
    /// Any other response line, passed through verbatim.
    Other(String),
}

// ---------------------------------------------------------------------------
// DeviceLink
// ---------------------------------------------------------------------------

/// Synchronous command channel with held-key bookkeeping.
///
/// At most one live connection exists per physical endpoint; share a link
/// between command issuers by wrapping it in a `Mutex` (see
/// [`crate::emote::EmoteDriver`]).
pub struct DeviceLink {
    /// `None` after disconnect — commands then fail with
    /// [`DeviceError::LinkClosed`].
    transport: Option<Box<dyn Transport>>,
    held_keys: HashSet<String>,
}

impl DeviceLink {
    /// Discover (or use the explicit) port, open it, wait for the BLE stack
    /// to settle, flush stale input, and clear any stuck keys.
    pub fn connect(port: Option<&str>, baud: u32) -> Result<Self, DeviceError> {
        let port = discovery::resolve_port(port)?;
        log::info!("opening {port} at {baud} baud");

        let transport = SerialTransport::open(&port, baud, RESPONSE_TIMEOUT)?;
        std::thread::sleep(STABILIZE_DELAY);

        Self::attach(Box::new(transport))
    }

    /// Run the post-open handshake on an already-open transport: discard
    /// buffered input, then `RELEASEALL`.
    ///
    /// This is the seam tests use to drive the protocol over a mock.
    pub fn attach(mut transport: Box<dyn Transport>) -> Result<Self, DeviceError> {
        transport.discard_input()?;
        let mut link = Self {
            transport: Some(transport),
            held_keys: HashSet::new(),
        };
        link.release_all()?;
        Ok(link)
    }

    /// Whether the link still has a live transport.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Keys currently recorded as held down.
    pub fn held_keys(&self) -> &HashSet<String> {
        &self.held_keys
    }

    /// Send one command line and read the response.
    ///
    /// Non-`OK:` responses are logged but not treated as errors — the
    /// firmware reports `ERROR:NOT_CONNECTED` while unpaired and callers
    /// should keep functioning (the choreography still ends in a safe
    /// `RELEASEALL`).
    fn command(&mut self, cmd: &str) -> Result<String, DeviceError> {
        let transport = self.transport.as_mut().ok_or(DeviceError::LinkClosed)?;
        transport.write_line(cmd)?;
        let response = transport.read_line()?;
        if !response.starts_with("OK:") {
            log::warn!("device rejected '{cmd}': {response}");
        }
        Ok(response)
    }

    /// Tap (press and release) a key.
    pub fn tap(&mut self, key: &str) -> Result<String, DeviceError> {
        self.command(&format!("KEY:{key}"))
    }

    /// Press and hold a key.
    pub fn press(&mut self, key: &str) -> Result<String, DeviceError> {
        let response = self.command(&format!("PRESS:{key}"))?;
        self.held_keys.insert(key.to_string());
        Ok(response)
    }

    /// Release one held key.
    pub fn release(&mut self, key: &str) -> Result<String, DeviceError> {
        let response = self.command(&format!("RELEASE:{key}"))?;
        self.held_keys.remove(key);
        Ok(response)
    }

    /// Release every held key.
    pub fn release_all(&mut self) -> Result<String, DeviceError> {
        let response = self.command("RELEASEALL")?;
        self.held_keys.clear();
        Ok(response)
    }

    /// Type a literal text string.
    pub fn type_text(&mut self, text: &str) -> Result<String, DeviceError> {
        self.command(&format!("TEXT:{text}"))
    }

    /// Ask the device itself to wait `ms` milliseconds.
    pub fn device_delay(&mut self, ms: u64) -> Result<String, DeviceError> {
        self.command(&format!("DELAY:{ms}"))
    }

    /// Query the BLE pairing status.
    pub fn status(&mut self) -> Result<LinkStatus, DeviceError> {
        let response = self.command("STATUS")?;
        Ok(match response.as_str() {
            "OK:CONNECTED" => LinkStatus::Connected,
            "OK:DISCONNECTED" => LinkStatus::Disconnected,
            _ => LinkStatus::Other(response),
        })
    }

    /// Release all keys and close the transport.  Idempotent: calling twice
    /// or on an already-closed link is a no-op.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            // Best-effort: the keyboard must not keep keys pressed after we
            // are gone, even if the write fails mid-teardown.
            if transport.write_line("RELEASEALL").is_ok() {
                let _ = transport.read_line();
            }
            self.held_keys.clear();
            log::info!("device link closed");
        }
    }
}

impl Drop for DeviceLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Scripted transport: records every written line, answers `OK:` unless
    /// a canned response queue says otherwise.
    struct MockTransport {
        sent: Arc<Mutex<Vec<String>>>,
        responses: Vec<String>, // popped front-first
    }

    impl MockTransport {
        fn new(sent: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                sent,
                responses: Vec::new(),
            }
        }

        fn with_responses(sent: Arc<Mutex<Vec<String>>>, responses: &[&str]) -> Self {
            Self {
                sent,
                responses: responses.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl Transport for MockTransport {
        fn write_line(&mut self, line: &str) -> Result<(), DeviceError> {
            self.sent.lock().unwrap().push(line.to_string());
            Ok(())
        }

        fn read_line(&mut self) -> Result<String, DeviceError> {
            if self.responses.is_empty() {
                Ok("OK:".into())
            } else {
                Ok(self.responses.remove(0))
            }
        }

        fn discard_input(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    fn link_with_log() -> (DeviceLink, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let link = DeviceLink::attach(Box::new(MockTransport::new(Arc::clone(&sent))))
            .expect("attach");
        (link, sent)
    }

    #[test]
    fn connect_then_disconnect_releases_all_twice() {
        let (mut link, sent) = link_with_log();
        link.disconnect();

        let releases = sent
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == "RELEASEALL")
            .count();
        assert!(releases >= 2, "expected ≥2 RELEASEALL, got {releases}");
    }

    #[test]
    fn attach_sends_releaseall_first() {
        let (_link, sent) = link_with_log();
        assert_eq!(sent.lock().unwrap()[0], "RELEASEALL");
    }

    #[test]
    fn wire_format_of_commands() {
        let (mut link, sent) = link_with_log();
        link.tap("ENTER").unwrap();
        link.press("CTRL").unwrap();
        link.release("CTRL").unwrap();
        link.type_text("/e dance3").unwrap();
        link.device_delay(250).unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(
            &sent[1..],
            &[
                "KEY:ENTER",
                "PRESS:CTRL",
                "RELEASE:CTRL",
                "TEXT:/e dance3",
                "DELAY:250"
            ]
        );
    }

    #[test]
    fn press_and_release_track_held_keys() {
        let (mut link, _sent) = link_with_log();

        link.press("CTRL").unwrap();
        link.press("T").unwrap();
        assert_eq!(link.held_keys().len(), 2);

        link.release("CTRL").unwrap();
        assert!(link.held_keys().contains("T"));
        assert!(!link.held_keys().contains("CTRL"));

        link.release_all().unwrap();
        assert!(link.held_keys().is_empty());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut link, sent) = link_with_log();
        link.disconnect();
        link.disconnect();
        link.disconnect();

        let releases = sent
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == "RELEASEALL")
            .count();
        // one from attach, exactly one from the first disconnect
        assert_eq!(releases, 2);
        assert!(!link.is_connected());
    }

    #[test]
    fn commands_on_closed_link_fail() {
        let (mut link, _sent) = link_with_log();
        link.disconnect();
        assert!(matches!(link.tap("A"), Err(DeviceError::LinkClosed)));
    }

    #[test]
    fn drop_releases_keys() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        {
            let mut link =
                DeviceLink::attach(Box::new(MockTransport::new(Arc::clone(&sent)))).unwrap();
            link.press("T").unwrap();
            // dropped here without an explicit disconnect
        }
        assert_eq!(sent.lock().unwrap().last().unwrap(), "RELEASEALL");
    }

    #[test]
    fn status_parses_known_responses() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = MockTransport::with_responses(
            Arc::clone(&sent),
            &["OK:", "OK:CONNECTED", "OK:DISCONNECTED", "OK:READY"],
        );
        let mut link = DeviceLink::attach(Box::new(transport)).unwrap();

        assert_eq!(link.status().unwrap(), LinkStatus::Connected);
        assert_eq!(link.status().unwrap(), LinkStatus::Disconnected);
        assert_eq!(
            link.status().unwrap(),
            LinkStatus::Other("OK:READY".into())
        );
    }
}
