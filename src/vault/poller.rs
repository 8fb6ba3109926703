//! Vault poller
//!
//! Refreshes the vault snapshot on a fixed cadence while a network-gated
//! contract client exists. One refresh runs immediately on start.
//!
//! Stopping aborts the timer task. A refresh already in flight is not
//! interrupted by the generation bump that precedes a stop, but its result is
//! refused by the shared state, so nothing from a stopped run can land.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::contract::VaultClient;
use super::state::{OperationStatus, VaultSnapshot, VaultState};

/// Default refresh period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Status message for a failed refresh
pub const LOAD_FAILED: &str = "vault data load failed";

/// Result of one refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Snapshot replaced
    Applied(VaultSnapshot),
    /// Session moved on while reading; result dropped
    Stale,
}

/// Read all four vault fields and publish them as one snapshot.
///
/// Either every field is replaced or none is. A failed read leaves the last
/// good snapshot in place and reports `ReadFailed`.
pub async fn refresh(client: &VaultClient, state: &VaultState) -> Result<RefreshOutcome> {
    let generation = client.generation();

    let reads = futures::try_join!(
        client.read_status(),
        client.read_balance(),
        client.read_owner(),
        client.read_beneficiary(),
    );

    match reads {
        Ok((time_left_seconds, balance_wei, owner, beneficiary)) => {
            let snapshot = VaultSnapshot {
                time_left_seconds,
                balance_wei,
                owner,
                beneficiary,
                fetched_at: Utc::now(),
            };

            if state.commit_snapshot(generation, snapshot.clone()) {
                debug!("Vault snapshot refreshed: {}s left", snapshot.time_left_seconds);
                Ok(RefreshOutcome::Applied(snapshot))
            } else {
                Ok(RefreshOutcome::Stale)
            }
        }
        Err(e) => {
            warn!("Vault refresh failed: {}", e);
            state.commit_status(generation, OperationStatus::Failed(LOAD_FAILED.to_string()));
            Err(match e {
                Error::ReadFailed(reason) => Error::ReadFailed(reason),
                other => Error::ReadFailed(other.to_string()),
            })
        }
    }
}

/// Poller lifecycle
#[derive(Debug)]
pub enum PollerState {
    Stopped,
    Running {
        task: JoinHandle<()>,
        epoch: u64,
    },
}

/// Periodic refresher owning a single timer task
#[derive(Debug)]
pub struct VaultPoller {
    period: Duration,
    state: PollerState,
}

impl VaultPoller {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            state: PollerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, PollerState::Running { .. })
    }

    /// Start polling `client`, replacing any previous run
    pub fn start(&mut self, client: VaultClient, state: VaultState) {
        self.stop();

        let epoch = client.generation().epoch;
        let period = self.period;
        info!(
            "Starting vault poller for {} with {}s interval",
            client.address(),
            period.as_secs()
        );

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // First tick completes immediately
                ticker.tick().await;
                if let Ok(RefreshOutcome::Stale) = refresh(&client, &state).await {
                    debug!("Poller for epoch {} is stale", epoch);
                }
            }
        });

        self.state = PollerState::Running { task, epoch };
    }

    /// Stop polling. Safe to call when already stopped.
    pub fn stop(&mut self) {
        if let PollerState::Running { task, epoch } =
            std::mem::replace(&mut self.state, PollerState::Stopped)
        {
            task.abort();
            info!("Vault poller stopped (epoch {})", epoch);
        }
    }
}

impl Default for VaultPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Drop for VaultPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{eligible_state, MockVault, VAULT_ADDRESS};
    use std::sync::Arc;

    fn client_for(vault: &Arc<MockVault>, state: &VaultState) -> VaultClient {
        VaultClient::new(vault.clone(), VAULT_ADDRESS, state.generation())
    }

    #[tokio::test]
    async fn test_refresh_applies_all_fields() {
        let state = eligible_state();
        let vault = Arc::new(MockVault::new());
        vault.set_time_left(90061);
        let client = client_for(&vault, &state);

        let outcome = refresh(&client, &state).await.unwrap();

        let snapshot = state.snapshot().unwrap();
        assert_eq!(outcome, RefreshOutcome::Applied(snapshot.clone()));
        assert_eq!(snapshot.time_left_seconds, 90061);
        assert_eq!(snapshot.balance_wei, vault.balance_wei());
        assert_eq!(snapshot.owner, vault.owner_address());
        assert!(!snapshot.has_beneficiary());
    }

    #[tokio::test]
    async fn test_failed_read_keeps_last_snapshot() {
        let state = eligible_state();
        let vault = Arc::new(MockVault::new());
        let client = client_for(&vault, &state);

        refresh(&client, &state).await.unwrap();
        let before = state.snapshot().unwrap();

        // One of four reads fails; the other three must not leak through
        vault.set_time_left(5);
        vault.fail_balance_reads(true);
        let result = refresh(&client, &state).await;

        assert!(matches!(result, Err(Error::ReadFailed(_))));
        assert_eq!(state.snapshot().unwrap(), before);
        assert_eq!(state.status(), OperationStatus::Failed(LOAD_FAILED.into()));
    }

    #[tokio::test]
    async fn test_refresh_from_superseded_generation_is_discarded() {
        let state = eligible_state();
        let vault = Arc::new(MockVault::new());
        let client = client_for(&vault, &state);

        let gate = vault.hold_reads();
        let in_flight = tokio::spawn({
            let client = client.clone();
            let state = state.clone();
            async move { refresh(&client, &state).await }
        });
        vault.wait_for_read().await;

        state.update_session(|s| s.set_network(Some(1)));
        gate.notify_waiters();

        assert_eq!(in_flight.await.unwrap().unwrap(), RefreshOutcome::Stale);
        assert_eq!(state.snapshot(), None);
        assert_eq!(state.status(), OperationStatus::Idle);
    }

    #[tokio::test]
    async fn test_failed_read_from_superseded_generation_leaves_status() {
        let state = eligible_state();
        let vault = Arc::new(MockVault::new());
        let client = client_for(&vault, &state);
        vault.fail_balance_reads(true);

        state.update_session(|s| s.set_account(None));

        assert!(refresh(&client, &state).await.is_err());
        assert_eq!(state.status(), OperationStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_refreshes_on_interval() {
        let state = eligible_state();
        let vault = Arc::new(MockVault::new());
        let mut poller = VaultPoller::new(Duration::from_secs(10));

        poller.start(client_for(&vault, &state), state.clone());
        assert!(poller.is_running());

        // Immediate refresh plus ticks at 10s and 20s
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(vault.status_reads(), 3);
        assert!(state.snapshot().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let state = eligible_state();
        let vault = Arc::new(MockVault::new());
        let mut poller = VaultPoller::new(Duration::from_secs(10));

        poller.start(client_for(&vault, &state), state.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;
        let reads = vault.status_reads();

        poller.stop();
        poller.stop();
        assert!(!poller.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(vault.status_reads(), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous_run() {
        let state = eligible_state();
        let vault = Arc::new(MockVault::new());
        let mut poller = VaultPoller::new(Duration::from_secs(10));

        poller.start(client_for(&vault, &state), state.clone());
        poller.start(client_for(&vault, &state), state.clone());

        tokio::time::sleep(Duration::from_secs(5)).await;
        // Only the second run's immediate refresh
        assert_eq!(vault.status_reads(), 1);
    }
}
