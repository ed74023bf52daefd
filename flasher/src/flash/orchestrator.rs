//! Flash orchestrator
//!
//! Drives one [`FlashRequest`] through bootloader entry, verification,
//! optional relocation and flashing. Every failure becomes a
//! [`FlashOutcome`] and exactly one terminal [`ProgressMessage`]; nothing is
//! retried here.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::errors::FlasherError;
use crate::flash::cancel::CancelToken;
use crate::flash::fsm::{FlashEvent, FlashFsm, FlashState, OrchestratorSettings};
use crate::flash::invoker::FlashTool;
use crate::models::board::{Board, FlashRequest};
use crate::models::progress::{FlashOutcome, ProgressMessage};
use crate::ports::bootloader::BootloaderRequester;
use crate::ports::catalog::PortCatalog;
use crate::ports::rediscover::PortRediscoverer;
use crate::volumes::watcher::MountWatcher;

pub const MSG_ENTERING_BOOTLOADER: &str = "Putting board in bootloader mode...";
pub const MSG_FLASHING: &str = "Flashing Board...";

/// Runs a single flash request. Build a new one for every request.
pub struct FlashOrchestrator {
    rediscoverer: PortRediscoverer,
    requester: Arc<dyn BootloaderRequester>,
    watcher: MountWatcher,
    tool: Arc<dyn FlashTool>,
    settings: OrchestratorSettings,
    fsm: FlashFsm,
    progress: UnboundedSender<ProgressMessage>,
}

impl FlashOrchestrator {
    pub fn new(
        catalog: PortCatalog,
        requester: Arc<dyn BootloaderRequester>,
        watcher: MountWatcher,
        tool: Arc<dyn FlashTool>,
        settings: OrchestratorSettings,
        progress: UnboundedSender<ProgressMessage>,
    ) -> Self {
        Self {
            rediscoverer: PortRediscoverer::new(catalog),
            requester,
            watcher,
            tool,
            settings,
            fsm: FlashFsm::new(),
            progress,
        }
    }

    /// Get current state
    pub fn state(&self) -> &FlashState {
        self.fsm.state()
    }

    /// Run the request to completion and report its terminal message
    pub async fn run(mut self, request: FlashRequest, cancel: CancelToken) -> FlashOutcome {
        info!(
            "Flashing {} with {}",
            request.board,
            request.firmware_path.display()
        );

        if let Err(outcome) = self.execute(&request, &cancel).await {
            self.advance(FlashEvent::Fail(outcome));
        }
        debug!(
            "Finished in state {:?}, bootloader requested: {}",
            self.fsm.state(),
            self.fsm.reset_requested()
        );
        let outcome = self.fsm.outcome().unwrap_or_else(|| {
            error!("Flash sequence stopped in {:?}", self.fsm.state());
            FlashOutcome::FlashToolError("flash sequence ended unexpectedly".to_string())
        });

        match &outcome {
            FlashOutcome::Success => info!("Board flash successful: {}", request.board),
            other => error!("Flashing {} ended with {:?}", request.board, other),
        }

        self.emit(outcome.to_message());
        outcome
    }

    async fn execute(
        &mut self,
        request: &FlashRequest,
        cancel: &CancelToken,
    ) -> Result<(), FlashOutcome> {
        let port_path = request.board.port_path.as_str();

        self.advance(FlashEvent::Begin);
        self.emit(ProgressMessage::step(MSG_ENTERING_BOOTLOADER));

        if cancel.is_cancelled() {
            return Err(FlashOutcome::Cancelled { after_reset: false });
        }

        self.enter_bootloader(port_path).await?;
        self.advance(FlashEvent::BootloaderRequested);

        self.await_bootloader_volume(cancel).await?;

        let target = self.locate(&request.board)?;

        if cancel.is_cancelled() {
            return Err(FlashOutcome::Cancelled {
                after_reset: self.fsm.reset_requested(),
            });
        }

        self.emit(ProgressMessage::step(MSG_FLASHING));
        match self.tool.flash(&target.port_path, &request.firmware_path).await {
            Ok(()) => {
                self.advance(FlashEvent::FlashCompleted);
                Ok(())
            }
            Err(FlasherError::FlashToolFailed(code)) => Err(FlashOutcome::FlashToolFailed(code)),
            Err(FlasherError::FlashToolError(reason)) => Err(FlashOutcome::FlashToolError(reason)),
            Err(e) => Err(FlashOutcome::FlashToolError(e.to_string())),
        }
    }

    /// Reset the board unless its bootloader volume is already mounted
    async fn enter_bootloader(&self, port_path: &str) -> Result<(), FlashOutcome> {
        let already_mounted = self
            .watcher
            .verify_bootloader_mounted(self.settings.precheck_timeout)
            .await
            .map_err(|e| {
                error!("Verifying bootloader mode failed: {}", e);
                FlashOutcome::BootloaderRequestFailed
            })?;

        if already_mounted {
            info!("Board already in bootloader mode, skipping reset");
            return Ok(());
        }

        info!("Attempting to put device in bootloader mode.");
        self.requester
            .request_bootloader(port_path)
            .await
            .map_err(|e| {
                error!("Bootloader request on {} failed: {}", port_path, e);
                FlashOutcome::BootloaderRequestFailed
            })
    }

    async fn await_bootloader_volume(&self, cancel: &CancelToken) -> Result<(), FlashOutcome> {
        info!("Waiting for device mount.");

        let mounted = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(FlashOutcome::Cancelled { after_reset: true });
            }
            result = self.watcher.verify_bootloader_mounted(self.settings.verify_timeout) => result,
        };

        match mounted {
            Ok(true) => Ok(()),
            Ok(false) => {
                error!(
                    "Device drive {} not mounted - looks like bootloader mode has not been set.",
                    self.watcher.volume_label()
                );
                Err(FlashOutcome::BootloaderNotVerified)
            }
            Err(e) => {
                error!("Verifying bootloader mode failed: {}", e);
                Err(FlashOutcome::BootloaderRequestFailed)
            }
        }
    }

    /// The board to flash: the original one if its path survived the reset,
    /// otherwise whatever now reports the same serial number.
    fn locate(&mut self, board: &Board) -> Result<Board, FlashOutcome> {
        let port_present = self
            .rediscoverer
            .is_present(board)
            .unwrap_or_else(|e| {
                warn!("Listing serial ports failed: {}", e);
                false
            });
        self.advance(FlashEvent::BootloaderVerified { port_present });

        if port_present {
            return Ok(board.clone());
        }

        match self
            .rediscoverer
            .relocate(&board.port_path, &board.serial_number)
        {
            Ok(Some(found)) => {
                self.advance(FlashEvent::Relocated);
                Ok(found)
            }
            Ok(None) => {
                error!(
                    "Failed to locate new board connection for serial {}",
                    board.serial_number
                );
                Err(FlashOutcome::DeviceLost)
            }
            Err(e) => {
                error!("Relocating board {} failed: {}", board.serial_number, e);
                Err(FlashOutcome::DeviceLost)
            }
        }
    }

    fn advance(&mut self, event: FlashEvent) {
        let from = self.fsm.state().clone();
        match self.fsm.process(event) {
            Ok(()) => debug!("Flash state {:?} -> {:?}", from, self.fsm.state()),
            Err(e) => error!("{}", e),
        }
    }

    fn emit(&self, message: ProgressMessage) {
        if self.progress.send(message).is_err() {
            debug!("Progress receiver dropped");
        }
    }
}
