//! Flashing module

pub mod cancel;
pub mod fsm;
pub mod invoker;
pub mod orchestrator;
