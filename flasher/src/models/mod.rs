//! Data models

pub mod board;
pub mod progress;
