//! Vault controller
//!
//! Binds wallet session, network gate, contract client, poller and action
//! coordinator together with a small set of named transition rules:
//!
//! - on session change: tear down the client and poller, then rebuild both if
//!   the new session is connected and on the required network
//! - on client change: (re)start or stop the poller
//!
//! The session update, the generation bump and the teardown happen under one
//! lock, so a response from the previous account or network can never be
//! applied after the switch.

use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::Address;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::wallet::provider::{WalletEvent, WalletProvider};
use crate::wallet::session::{parse_address, Generation, WalletSession};

use super::contract::{Receipt, VaultClient};
use super::coordinator::{ActionCoordinator, CoordinatorConfig};
use super::poller::{self, RefreshOutcome, VaultPoller};
use super::state::{OperationStatus, VaultState};

/// Client and poller, always changed together
struct Wiring {
    client: Option<VaultClient>,
    poller: VaultPoller,
}

/// The vault client state machine
pub struct VaultController {
    provider: Option<Arc<dyn WalletProvider>>,
    contract_address: Address,
    state: VaultState,
    coordinator: ActionCoordinator,
    wiring: Mutex<Wiring>,
}

impl VaultController {
    /// Create a controller. `provider` is `None` when no wallet is available.
    pub fn new(config: &Config, provider: Option<Arc<dyn WalletProvider>>) -> Result<Self> {
        let contract_address = config
            .contract_address()
            .map_err(|e| Error::Config(format!("{:#}", e)))?;
        let state = VaultState::new(config.network.required_chain_id);
        let coordinator = ActionCoordinator::new(
            state.clone(),
            CoordinatorConfig {
                confirmation_timeout: config.confirmation_timeout(),
                reject_concurrent: config.actions.reject_concurrent,
            },
        );

        if provider.is_none() {
            warn!("No Ethereum wallet detected.");
            state.set_status(OperationStatus::Failed("No Ethereum wallet detected.".into()));
        }

        Ok(Self {
            provider,
            contract_address,
            state,
            coordinator,
            wiring: Mutex::new(Wiring {
                client: None,
                poller: VaultPoller::new(config.poll_interval()),
            }),
        })
    }

    /// Shared reactive state for the presentation layer
    pub fn state(&self) -> &VaultState {
        &self.state
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Is a network-gated contract client currently available
    pub fn has_client(&self) -> bool {
        self.wiring().client.is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.wiring().poller.is_running()
    }

    /// Request account access from the wallet
    pub async fn connect(&self) -> Result<Address> {
        let provider = match &self.provider {
            Some(provider) => provider.clone(),
            None => {
                self.state
                    .set_status(OperationStatus::Failed("No Ethereum wallet detected.".into()));
                return Err(Error::WalletUnavailable);
            }
        };

        let account = match provider.request_accounts().await {
            Ok(accounts) => match accounts.first() {
                Some(first) => parse_address(first).map_err(|e| {
                    Error::ConnectionRejected(format!("wallet returned a malformed account: {}", e))
                }),
                None => Err(Error::ConnectionRejected("no accounts authorized".into())),
            },
            Err(Error::ConnectionRejected(reason)) => Err(Error::ConnectionRejected(reason)),
            Err(e) => Err(Error::ConnectionRejected(e.to_string())),
        };

        match account {
            Ok(account) => {
                self.update_session(|s| s.set_account(Some(account)));
                info!("Wallet connected: {}", account);
                self.state
                    .set_status(OperationStatus::Success("Wallet connected.".into()));
                Ok(account)
            }
            Err(e) => {
                warn!("Wallet connection failed: {}", e);
                self.state
                    .set_status(OperationStatus::Failed("Wallet connection failed.".into()));
                Err(e)
            }
        }
    }

    /// Read the wallet's current network once
    pub async fn sync_network(&self) -> Result<u64> {
        let provider = self.provider.as_ref().ok_or(Error::WalletUnavailable)?;
        let network_id = provider.chain_id().await?;
        self.update_session(|s| s.set_network(Some(network_id)));
        Ok(network_id)
    }

    /// Apply one wallet notification
    pub fn handle_event(&self, event: &WalletEvent) {
        debug!("Wallet event: {:?}", event);
        self.update_session(|s| s.apply(event));
    }

    /// Refresh the snapshot now, outside the poll cadence
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let client = self.current_client()?;
        poller::refresh(&client, &self.state).await
    }

    /// Send the keepAlive heartbeat
    pub async fn heartbeat(&self) -> Result<Receipt> {
        let client = self.current_client()?;
        self.coordinator.heartbeat(client).await
    }

    /// Assign a new beneficiary
    pub async fn set_beneficiary(&self, beneficiary: &str) -> Result<Receipt> {
        let client = self.current_client()?;
        self.coordinator.set_beneficiary(client, beneficiary).await
    }

    /// Subscribe to wallet events, sync the network, and apply events in
    /// delivery order until cancelled. Stops the poller on exit.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let provider = self.provider.clone().ok_or(Error::WalletUnavailable)?;
        let mut events = provider.subscribe();

        if let Err(e) = self.sync_network().await {
            warn!("Could not read wallet network: {}", e);
        }

        info!("Vault controller running");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed notifications; re-read the one we can query
                        warn!("Missed {} wallet events, resyncing network", skipped);
                        if let Err(e) = self.sync_network().await {
                            warn!("Network resync failed: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => {
                        info!("Wallet event stream closed");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    debug!("Vault controller cancelled");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Drop the client and stop polling. Refreshes and actions still in
    /// flight finish, but can no longer commit.
    pub fn shutdown(&self) {
        let mut wiring = self.wiring();
        self.state.invalidate();
        wiring.poller.stop();
        wiring.client = None;
    }

    fn current_client(&self) -> Result<VaultClient> {
        self.wiring().client.clone().ok_or(Error::VaultUnavailable)
    }

    /// Apply a session change and rebuild derived state if it changed
    fn update_session<F>(&self, update: F)
    where
        F: FnOnce(&mut WalletSession) -> bool,
    {
        let mut wiring = self.wiring();
        if let Some(generation) = self.state.update_session(update) {
            self.reconcile(&mut wiring, generation);
        }
    }

    fn reconcile(&self, wiring: &mut Wiring, generation: Generation) {
        wiring.poller.stop();
        wiring.client = None;

        let account = match generation.account {
            Some(account) if generation.is_eligible(self.state.required_network_id()) => account,
            Some(_) => {
                warn!(
                    "Wallet on network {:?}, vault requires {}",
                    generation.network_id,
                    self.state.required_network_id()
                );
                return;
            }
            None => {
                debug!("No account connected; vault client cleared");
                return;
            }
        };

        let provider = match &self.provider {
            Some(provider) => provider,
            None => return,
        };

        match provider.connect_contract(self.contract_address, account) {
            Ok(contract) => {
                let client = VaultClient::new(contract, self.contract_address, generation);
                info!(
                    "Vault client ready for {} (epoch {})",
                    account, generation.epoch
                );
                wiring.poller.start(client.clone(), self.state.clone());
                wiring.client = Some(client);
            }
            Err(e) => {
                error!("Failed to build vault client: {}", e);
                self.state
                    .commit_status(generation, OperationStatus::Failed(format!("Vault unavailable: {}", e)));
            }
        }
    }

    fn wiring(&self) -> MutexGuard<'_, Wiring> {
        self.wiring
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for VaultController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
