//! Serial port enumeration filtered to known boards

use std::sync::Arc;

use serialport::SerialPortType;
use tracing::debug;

use crate::errors::FlasherError;
use crate::models::board::{Board, UsbId};

/// Raw USB serial interface as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortEntry {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub description: String,
    pub device_path: String,
}

impl SerialPortEntry {
    pub fn usb_id(&self) -> UsbId {
        UsbId::new(self.vendor_id, self.product_id)
    }

    fn to_board(&self) -> Board {
        Board {
            display_name: self.description.clone(),
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            serial_number: self.serial_number.clone().unwrap_or_default(),
            port_path: self.device_path.clone(),
        }
    }
}

/// Source of serial port listings
pub trait SerialPortLister: Send + Sync {
    /// List every attached USB serial interface
    fn list_serial_ports(&self) -> Result<Vec<SerialPortEntry>, FlasherError>;
}

/// Serial port listing backed by the OS
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerialPorts;

impl SerialPortLister for SystemSerialPorts {
    fn list_serial_ports(&self) -> Result<Vec<SerialPortEntry>, FlasherError> {
        let ports = serialport::available_ports()?;

        let entries = ports
            .into_iter()
            .filter_map(|port| match port.port_type {
                SerialPortType::UsbPort(info) => Some(SerialPortEntry {
                    vendor_id: info.vid,
                    product_id: info.pid,
                    serial_number: info.serial_number,
                    description: info
                        .product
                        .unwrap_or_else(|| "USB Serial Device".to_string()),
                    device_path: port.port_name,
                }),
                _ => None,
            })
            .collect();

        if cfg!(target_os = "macos") {
            return Ok(callout_devices_only(entries));
        }
        Ok(entries)
    }
}

/// Drop `/dev/tty.*` dial-in nodes that have a `/dev/cu.*` twin.
///
/// macOS registers both for every USB serial interface; the callout device
/// is the one that opens without waiting for carrier detect.
fn callout_devices_only(entries: Vec<SerialPortEntry>) -> Vec<SerialPortEntry> {
    let callouts: Vec<String> = entries
        .iter()
        .filter_map(|entry| entry.device_path.strip_prefix("/dev/cu."))
        .map(str::to_string)
        .collect();

    entries
        .into_iter()
        .filter(|entry| match entry.device_path.strip_prefix("/dev/tty.") {
            Some(name) => !callouts.iter().any(|callout| callout == name),
            None => true,
        })
        .collect()
}

/// Known boards currently attached.
///
/// Every call queries the lister again; nothing is cached.
#[derive(Clone)]
pub struct PortCatalog {
    lister: Arc<dyn SerialPortLister>,
    known_devices: Vec<UsbId>,
}

impl PortCatalog {
    pub fn new(lister: Arc<dyn SerialPortLister>, known_devices: Vec<UsbId>) -> Self {
        Self {
            lister,
            known_devices,
        }
    }

    pub fn known_devices(&self) -> &[UsbId] {
        &self.known_devices
    }

    fn known_ports(&self) -> Result<Vec<SerialPortEntry>, FlasherError> {
        let ports = self.lister.list_serial_ports()?;
        let total = ports.len();
        let known: Vec<SerialPortEntry> = ports
            .into_iter()
            .filter(|port| self.known_devices.contains(&port.usb_id()))
            .collect();
        debug!("Enumerated {} serial ports, {} known boards", total, known.len());
        Ok(known)
    }

    /// All attached boards with an allow-listed vendor/product pair
    pub fn list_boards(&self) -> Result<Vec<Board>, FlasherError> {
        Ok(self.known_ports()?.iter().map(SerialPortEntry::to_board).collect())
    }

    /// First attached board reporting exactly `serial_number`
    pub fn find_board(&self, serial_number: &str) -> Result<Option<Board>, FlasherError> {
        if serial_number.is_empty() {
            return Ok(None);
        }

        Ok(self
            .known_ports()?
            .iter()
            .find(|port| port.serial_number.as_deref() == Some(serial_number))
            .map(SerialPortEntry::to_board))
    }

    /// Device paths of attached boards
    pub fn list_port_paths(&self) -> Result<Vec<String>, FlasherError> {
        Ok(self
            .known_ports()?
            .into_iter()
            .map(|port| port.device_path)
            .collect())
    }
}
