//! Serial port discovery and bootloader entry

pub mod bootloader;
pub mod catalog;
pub mod rediscover;
