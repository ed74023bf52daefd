//! Background workers

pub mod flash_job;
