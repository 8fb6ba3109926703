//! Wallet session module
//!
//! Provides the wallet side of the vault client:
//! - Provider boundary (accounts, network, change events, contract signing)
//! - Session tracking with a generation token per account/network change
//! - A local-key provider backed by an HTTP JSON-RPC endpoint
//!
//! # Security
//!
//! The signing key is read from `PRIVATE_KEY` only and never written to
//! config files or logs.

pub mod local;
pub mod provider;
pub mod session;

pub use local::LocalWallet;
pub use provider::{WalletEvent, WalletProvider};
pub use session::{parse_address, Generation, WalletSession};
