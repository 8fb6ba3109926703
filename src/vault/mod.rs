//! Inactivity vault client
//!
//! # Architecture
//!
//! ```text
//! WalletProvider ──events──> VaultController ──builds──> VaultClient
//!                                  │                        │
//!                                  ├── VaultPoller ─────────┤ refresh()
//!                                  └── ActionCoordinator ───┘ keepAlive / setBeneficiary
//!                                              │
//!                                         VaultState (session view, snapshot, status)
//! ```
//!
//! Every result is tagged with the session generation it was produced under,
//! and `VaultState` refuses anything tagged with a superseded generation.

pub mod contract;
pub mod controller;
pub mod coordinator;
pub mod poller;
pub mod rpc;
pub mod state;

pub use contract::{Receipt, TransactionHandle, VaultClient, VaultContract};
pub use controller::VaultController;
pub use coordinator::{ActionCoordinator, CoordinatorConfig, VaultAction};
pub use poller::{refresh, RefreshOutcome, VaultPoller};
pub use state::{OperationStatus, SessionView, VaultSnapshot, VaultState};
