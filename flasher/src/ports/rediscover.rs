//! Relocating a board after its port path changed

use tracing::{debug, info, warn};

use crate::errors::FlasherError;
use crate::models::board::Board;
use crate::ports::catalog::PortCatalog;

/// Finds a board again after a reset, by serial number only.
#[derive(Clone)]
pub struct PortRediscoverer {
    catalog: PortCatalog,
}

impl PortRediscoverer {
    pub fn new(catalog: PortCatalog) -> Self {
        Self { catalog }
    }

    /// Whether `board` is still attached at its original path.
    ///
    /// Boards with a serial number need that same serial at the path; a path
    /// now owned by another board counts as gone. Boards without one are
    /// checked by path only. Either way the OS is queried once.
    pub fn is_present(&self, board: &Board) -> Result<bool, FlasherError> {
        if board.serial_number.is_empty() {
            let paths = self.catalog.list_port_paths()?;
            debug!("Connected boards at: {:?}", paths);
            return Ok(paths.iter().any(|path| path == &board.port_path));
        }

        let boards = self.catalog.list_boards()?;
        debug!(
            "Connected boards at: {:?}",
            boards.iter().map(|b| b.port_path.as_str()).collect::<Vec<_>>()
        );
        Ok(boards
            .iter()
            .any(|current| current.port_path == board.port_path && current.is_same_device(board)))
    }

    /// Look the board up by serial number after `original_path` vanished.
    ///
    /// `None` means the board is lost. No path is ever guessed.
    pub fn relocate(
        &self,
        original_path: &str,
        serial_number: &str,
    ) -> Result<Option<Board>, FlasherError> {
        info!(
            "Port path changed (expected {}), searching for serial {}",
            original_path, serial_number
        );

        match self.catalog.find_board(serial_number)? {
            Some(board) => {
                info!("New path detected for board is {}", board.port_path);
                Ok(Some(board))
            }
            None => {
                warn!("No board with serial {} is connected", serial_number);
                Ok(None)
            }
        }
    }
}
