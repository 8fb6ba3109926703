//! Action coordinator
//!
//! Sequences the two vault writes (keepAlive, setBeneficiary):
//! validate, mark pending, submit, await confirmation, report, then refresh
//! out of band so the snapshot reflects the write without waiting for the
//! next poll tick.
//!
//! Concurrency policy: by default a second action started while one is
//! pending is accepted and its status overwrites the first (last writer
//! wins). With `reject_concurrent` set, it fails with `ActionInProgress`
//! instead and leaves the status slot alone, before any input validation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::wallet::session::parse_address;

use super::contract::{Receipt, TransactionHandle, VaultClient};
use super::poller::refresh;
use super::state::{OperationStatus, VaultState};

/// Coordinator settings
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Give up waiting for a receipt after this long
    pub confirmation_timeout: Option<Duration>,
    /// Refuse a second action while one is pending
    pub reject_concurrent: bool,
}

/// A user-triggered vault write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultAction {
    Heartbeat,
    SetBeneficiary(Address),
}

impl VaultAction {
    fn pending_message(&self) -> String {
        match self {
            VaultAction::Heartbeat => "Sending keepAlive...".to_string(),
            VaultAction::SetBeneficiary(_) => "Setting beneficiary...".to_string(),
        }
    }

    fn success_message(&self) -> String {
        match self {
            VaultAction::Heartbeat => "keepAlive successful.".to_string(),
            VaultAction::SetBeneficiary(_) => "Beneficiary set successfully.".to_string(),
        }
    }

    fn failure_message(&self, error: &Error) -> String {
        match self {
            VaultAction::Heartbeat => format!("keepAlive failed: {}", error),
            VaultAction::SetBeneficiary(_) => format!("Failed to set beneficiary: {}", error),
        }
    }
}

/// Runs vault writes against the shared status slot
#[derive(Clone)]
pub struct ActionCoordinator {
    state: VaultState,
    config: CoordinatorConfig,
    in_flight: Arc<AtomicUsize>,
}

impl ActionCoordinator {
    pub fn new(state: VaultState, config: CoordinatorConfig) -> Self {
        Self {
            state,
            config,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Is any action between submission and its final status
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Send the activity proof
    pub async fn heartbeat(&self, client: VaultClient) -> Result<Receipt> {
        let _guard = self.acquire("keepAlive")?;
        self.execute(client, VaultAction::Heartbeat).await
    }

    /// Assign a new beneficiary. Malformed input fails before anything is sent.
    pub async fn set_beneficiary(&self, client: VaultClient, input: &str) -> Result<Receipt> {
        let _guard = self.acquire("setBeneficiary")?;
        let beneficiary = match parse_address(input) {
            Ok(address) => address,
            Err(e) => {
                warn!("Rejected beneficiary input {:?}", input);
                self.state
                    .set_status(OperationStatus::Failed("Invalid address.".to_string()));
                return Err(e);
            }
        };
        self.execute(client, VaultAction::SetBeneficiary(beneficiary))
            .await
    }

    async fn execute(&self, client: VaultClient, action: VaultAction) -> Result<Receipt> {
        let generation = client.generation();
        self.state
            .commit_status(generation, OperationStatus::Pending(action.pending_message()));

        let result = self.submit_and_confirm(&client, action).await;

        match &result {
            Ok(receipt) => {
                info!("{:?} confirmed: {}", action, receipt.tx_hash);
                self.state
                    .commit_status(generation, OperationStatus::Success(action.success_message()));
                // Best effort; a failed read reports itself through the status slot
                let _ = refresh(&client, &self.state).await;
            }
            Err(e) => {
                warn!("{:?} failed: {}", action, e);
                self.state
                    .commit_status(generation, OperationStatus::Failed(action.failure_message(e)));
            }
        }

        result
    }

    async fn submit_and_confirm(&self, client: &VaultClient, action: VaultAction) -> Result<Receipt> {
        let handle: TransactionHandle = match action {
            VaultAction::Heartbeat => client.send_heartbeat().await?,
            VaultAction::SetBeneficiary(beneficiary) => {
                client
                    .send_set_beneficiary(&beneficiary.to_checksum(None))
                    .await?
            }
        };

        match self.config.confirmation_timeout {
            Some(limit) => handle.await_confirmation_within(limit).await,
            None => handle.await_confirmation().await,
        }
    }

    /// Take an in-flight slot, or refuse when configured to and one is taken
    fn acquire(&self, action: &str) -> Result<InFlightGuard> {
        if self.config.reject_concurrent {
            if self
                .in_flight
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                warn!("Refusing {}: another action is pending", action);
                return Err(Error::ActionInProgress);
            }
        } else {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        }
        Ok(InFlightGuard {
            count: self.in_flight.clone(),
        })
    }
}

/// Releases an in-flight slot when the action finishes
struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}
