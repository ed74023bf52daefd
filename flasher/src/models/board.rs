//! Board and flash request models

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// USB vendor/product identifier pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsbId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl UsbId {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.vendor_id, self.product_id)
    }
}

/// A flashable board as seen on one enumeration pass.
///
/// `serial_number` identifies the physical board; `port_path` may change
/// whenever the USB interface re-registers, so a relocated board is a new
/// value rather than a mutated one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub display_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: String,
    pub port_path: String,
}

impl Board {
    pub fn usb_id(&self) -> UsbId {
        UsbId::new(self.vendor_id, self.product_id)
    }

    /// Same physical board, regardless of where it is currently attached
    pub fn is_same_device(&self, other: &Board) -> bool {
        !self.serial_number.is_empty() && self.serial_number == other.serial_number
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] @ {}",
            self.display_name, self.serial_number, self.port_path
        )
    }
}

/// A request to flash one board with one firmware image
#[derive(Debug, Clone)]
pub struct FlashRequest {
    pub board: Board,
    pub firmware_path: PathBuf,
}

impl FlashRequest {
    pub fn new(board: Board, firmware_path: impl Into<PathBuf>) -> Self {
        Self {
            board,
            firmware_path: firmware_path.into(),
        }
    }
}
