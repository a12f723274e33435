//! Core of the chat relay bot.
//!
//! Inbound chat events are queued per sender and answered by an external
//! completion API; replies stream back chunk by chunk. This crate is
//! framework-agnostic: the messenger and the completion API live behind ports
//! implemented in adapter crates.

pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod processor;
pub mod queue;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
