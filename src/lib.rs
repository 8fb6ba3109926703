//! Legacy Vault Client Library
//!
//! Operator client for an on-chain inactivity vault: watch the countdown,
//! send keepAlive heartbeats and manage the beneficiary.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod network;
pub mod vault;
pub mod wallet;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use vault::VaultController;
