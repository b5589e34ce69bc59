//! Line-oriented transport abstraction over the serial port.
//!
//! [`Transport`] is the seam between the command protocol and the wire:
//! [`DeviceLink`](super::DeviceLink) talks to the trait, production code
//! opens a [`SerialTransport`], and tests substitute a scripted mock.

use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use super::DeviceError;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A synchronous, line-oriented request/response channel.
pub trait Transport: Send {
    /// Write one command line (the newline is appended here).
    fn write_line(&mut self, line: &str) -> Result<(), DeviceError>;

    /// Block for one response line, trimmed, within the transport's timeout.
    fn read_line(&mut self) -> Result<String, DeviceError>;

    /// Drop any buffered input (stale boot banners, unsolicited status lines).
    fn discard_input(&mut self) -> Result<(), DeviceError>;
}

// ---------------------------------------------------------------------------
// SerialTransport
// ---------------------------------------------------------------------------

/// [`Transport`] over a real serial port.
///
/// The port handle is cloned so reads can go through a `BufReader` while
/// writes use the raw handle.
pub struct SerialTransport {
    reader: BufReader<Box<dyn SerialPort>>,
    writer: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `port` at `baud` with a per-read `timeout`.
    pub fn open(port: &str, baud: u32, timeout: Duration) -> Result<Self, DeviceError> {
        let writer = serialport::new(port, baud).timeout(timeout).open()?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { reader, writer })
    }
}

impl Transport for SerialTransport {
    fn write_line(&mut self, line: &str) -> Result<(), DeviceError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, DeviceError> {
        let mut buf = String::new();
        match self.reader.read_line(&mut buf) {
            Ok(0) => Err(DeviceError::LinkClosed),
            Ok(_) => Ok(buf.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Err(DeviceError::ResponseTimeout)
            }
            Err(e) => Err(DeviceError::Io(e)),
        }
    }

    fn discard_input(&mut self) -> Result<(), DeviceError> {
        self.writer.clear(ClearBuffer::Input)?;
        // Also drop anything already pulled into the BufReader.
        let buffered = self.reader.buffer().len();
        self.reader.consume(buffered);
        Ok(())
    }
}
