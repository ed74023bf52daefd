//! Background flash jobs
//!
//! Each request gets a fresh orchestrator on its own tokio task and its own
//! progress channel, so boards can be flashed side by side without sharing
//! any mutable state.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::info;

use crate::errors::FlasherError;
use crate::flash::cancel::CancelToken;
use crate::flash::fsm::OrchestratorSettings;
use crate::flash::invoker::{BossacInvoker, FlashTool};
use crate::flash::orchestrator::FlashOrchestrator;
use crate::models::board::{Board, FlashRequest};
use crate::models::progress::{FlashOutcome, ProgressMessage};
use crate::ports::bootloader::{BootloaderRequester, SerialBootloaderRequester};
use crate::ports::catalog::{PortCatalog, SystemSerialPorts};
use crate::storage::settings::Settings;
use crate::volumes::system_volume_lister;
use crate::volumes::watcher::MountWatcher;

/// Shared, read-only collaborators used to build orchestrators
#[derive(Clone)]
pub struct Flasher {
    catalog: PortCatalog,
    requester: Arc<dyn BootloaderRequester>,
    watcher: MountWatcher,
    tool: Arc<dyn FlashTool>,
    settings: OrchestratorSettings,
}

impl Flasher {
    pub fn new(
        catalog: PortCatalog,
        requester: Arc<dyn BootloaderRequester>,
        watcher: MountWatcher,
        tool: Arc<dyn FlashTool>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            catalog,
            requester,
            watcher,
            tool,
            settings,
        }
    }

    /// Wire up the OS serial ports, volumes and the bossac tool
    pub fn system(settings: &Settings) -> Self {
        let bootloader = &settings.bootloader;
        let catalog = PortCatalog::new(
            Arc::new(SystemSerialPorts),
            settings.known_devices.clone(),
        );
        let requester = SerialBootloaderRequester::new(
            bootloader.reset_baud_rate,
            bootloader.reset_hold(),
        );
        let watcher = MountWatcher::new(
            system_volume_lister(bootloader.volume_roots.clone()),
            bootloader.volume_label.clone(),
        )
        .with_poll_interval(bootloader.poll_interval());
        let tool = BossacInvoker::new(
            settings.flash_tool.path.clone(),
            settings.flash_tool.offset,
            settings.flash_tool.timeout(),
        );

        Self::new(
            catalog,
            Arc::new(requester),
            watcher,
            Arc::new(tool),
            OrchestratorSettings::from(settings),
        )
    }

    pub fn catalog(&self) -> &PortCatalog {
        &self.catalog
    }

    /// Boards currently attached
    pub fn list_boards(&self) -> Result<Vec<Board>, FlasherError> {
        self.catalog.list_boards()
    }

    /// A fresh orchestrator reporting to `progress`
    pub fn orchestrator(
        &self,
        progress: mpsc::UnboundedSender<ProgressMessage>,
    ) -> FlashOrchestrator {
        FlashOrchestrator::new(
            self.catalog.clone(),
            Arc::clone(&self.requester),
            self.watcher.clone(),
            Arc::clone(&self.tool),
            self.settings.clone(),
            progress,
        )
    }

    /// Start flashing on a background task.
    ///
    /// Must be called from within a tokio runtime. The caller must not start
    /// a second job for the same board before this one reported its
    /// terminal message.
    pub fn spawn(&self, request: FlashRequest, cancel: CancelToken) -> FlashJob {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = self.orchestrator(tx);

        info!("Starting flash job for {}", request.board);
        let handle = tokio::spawn(orchestrator.run(request, cancel));

        FlashJob {
            progress: rx,
            handle,
        }
    }
}

/// Handle on a running flash request
pub struct FlashJob {
    /// Ordered progress updates; the last one is terminal
    pub progress: UnboundedReceiver<ProgressMessage>,

    /// Resolves to the request's outcome
    pub handle: JoinHandle<FlashOutcome>,
}

impl FlashJob {
    /// Next progress update, `None` once the job is finished
    pub async fn next(&mut self) -> Option<ProgressMessage> {
        self.progress.recv().await
    }

    /// Drain progress into `on_message` and return the outcome
    pub async fn follow<F>(mut self, mut on_message: F) -> Result<FlashOutcome, FlasherError>
    where
        F: FnMut(&ProgressMessage),
    {
        while let Some(message) = self.next().await {
            on_message(&message);
        }
        self.wait().await
    }

    /// Wait for the job to finish
    pub async fn wait(self) -> Result<FlashOutcome, FlasherError> {
        self.handle
            .await
            .map_err(|e| FlasherError::StateError(format!("flash job aborted: {}", e)))
    }
}
