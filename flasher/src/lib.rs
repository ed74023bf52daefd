//! SAMD Flasher Library
//!
//! Puts SAMD21 boards into their bootloader, finds them again after the USB
//! re-enumeration and flashes them with bossac, reporting ordered progress.

pub mod errors;
pub mod filesys;
pub mod flash;
pub mod logs;
pub mod models;
pub mod ports;
pub mod storage;
pub mod utils;
pub mod volumes;
pub mod workers;

pub use errors::FlasherError;
pub use flash::cancel::CancelToken;
pub use models::board::{Board, FlashRequest};
pub use models::progress::{FlashOutcome, ProgressMessage};
pub use workers::flash_job::{FlashJob, Flasher};
