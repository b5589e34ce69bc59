//! Serial-port discovery for the keyboard-emulator.
//!
//! ESP32 dev boards show up behind one of a handful of USB-serial bridge
//! chips; [`KNOWN_DEVICES`] lists their VID/PID pairs.  Discovery scans the
//! available ports for a match and, on failure, reports every port it saw so
//! the user can pass `--port` explicitly.

use std::fmt;

use serialport::SerialPortType;

use super::DeviceError;

// ---------------------------------------------------------------------------
// Known devices
// ---------------------------------------------------------------------------

/// A USB-serial bridge chip known to front the keyboard-emulator.
#[derive(Debug, Clone, Copy)]
pub struct KnownDevice {
    pub vid: u16,
    pub pid: u16,
    pub chip: &'static str,
}

/// USB identifiers of bridge chips used on common ESP32 dev boards.
pub const KNOWN_DEVICES: &[KnownDevice] = &[
    KnownDevice { vid: 0x10C4, pid: 0xEA60, chip: "CP210x" },
    KnownDevice { vid: 0x1A86, pid: 0x7523, chip: "CH340" },
    KnownDevice { vid: 0x0403, pid: 0x6001, chip: "FTDI" },
    KnownDevice { vid: 0x1A86, pid: 0x55D4, chip: "CH9102" },
];

// ---------------------------------------------------------------------------
// PortDiagnostic
// ---------------------------------------------------------------------------

/// One discovered serial port, in a shape suitable for error listings.
#[derive(Debug, Clone)]
pub struct PortDiagnostic {
    pub name: String,
    pub description: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl fmt::Display for PortDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => write!(
                f,
                "{}: {} (VID:{vid:04X} PID:{pid:04X})",
                self.name, self.description
            ),
            _ => write!(f, "{}: {}", self.name, self.description),
        }
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Enumerate available serial ports with their USB identifiers.
pub fn list_ports() -> Result<Vec<PortDiagnostic>, DeviceError> {
    let ports = serialport::available_ports()?
        .into_iter()
        .map(|p| {
            let (description, vid, pid) = match p.port_type {
                SerialPortType::UsbPort(usb) => (
                    usb.product.unwrap_or_else(|| "USB serial device".into()),
                    Some(usb.vid),
                    Some(usb.pid),
                ),
                SerialPortType::BluetoothPort => ("Bluetooth serial port".into(), None, None),
                SerialPortType::PciPort => ("PCI serial port".into(), None, None),
                SerialPortType::Unknown => ("unknown".into(), None, None),
            };
            PortDiagnostic {
                name: p.port_name,
                description,
                vid,
                pid,
            }
        })
        .collect();
    Ok(ports)
}

/// Find the first port whose VID/PID matches a known bridge chip.
pub fn find_known_port(ports: &[PortDiagnostic]) -> Option<&PortDiagnostic> {
    ports.iter().find(|p| {
        KNOWN_DEVICES
            .iter()
            .any(|d| p.vid == Some(d.vid) && p.pid == Some(d.pid))
    })
}

/// Resolve the port to open: an explicit name wins, otherwise scan for a
/// known device.
///
/// # Errors
///
/// [`DeviceError::NoPorts`] when no serial port exists at all;
/// [`DeviceError::DeviceNotFound`] (listing every discovered port) when
/// ports exist but none matches [`KNOWN_DEVICES`].
pub fn resolve_port(explicit: Option<&str>) -> Result<String, DeviceError> {
    if let Some(port) = explicit {
        return Ok(port.to_string());
    }
    resolve_from(list_ports()?)
}

/// Discovery core, split out so tests can feed synthetic port lists.
fn resolve_from(ports: Vec<PortDiagnostic>) -> Result<String, DeviceError> {
    if ports.is_empty() {
        return Err(DeviceError::NoPorts);
    }
    match find_known_port(&ports) {
        Some(p) => {
            log::info!("found keyboard-emulator on {}", p.name);
            Ok(p.name.clone())
        }
        None => Err(DeviceError::DeviceNotFound(ports)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
