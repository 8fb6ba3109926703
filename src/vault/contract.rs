//! Vault contract client
//!
//! `VaultContract` is the raw read/write surface of the deployed contract.
//! `VaultClient` wraps one connection together with the session generation it
//! was built for; it is rebuilt, never patched, whenever the account or network
//! changes.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::wallet::session::{parse_address, Generation};

/// Mined transaction summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// A submitted transaction that has not been confirmed yet
#[async_trait]
pub trait PendingTransaction: Send {
    fn tx_hash(&self) -> B256;

    /// Suspend until the chain reports the transaction mined or reverted
    async fn confirm(self: Box<Self>) -> Result<Receipt>;
}

/// Read/write calls against the deployed vault
#[async_trait]
pub trait VaultContract: Send + Sync {
    /// Seconds until the vault releases funds to the beneficiary
    async fn time_left(&self) -> Result<u64>;

    async fn owner(&self) -> Result<Address>;

    /// Zero address when no beneficiary is set
    async fn beneficiary(&self) -> Result<Address>;

    /// Native balance held by the contract, in wei
    async fn balance(&self) -> Result<U256>;

    async fn keep_alive(&self) -> Result<Box<dyn PendingTransaction>>;

    async fn set_beneficiary(&self, beneficiary: Address) -> Result<Box<dyn PendingTransaction>>;
}

/// Handle to a submitted vault transaction
pub struct TransactionHandle {
    pending: Box<dyn PendingTransaction>,
}

impl TransactionHandle {
    pub fn new(pending: Box<dyn PendingTransaction>) -> Self {
        Self { pending }
    }

    pub fn tx_hash(&self) -> B256 {
        self.pending.tx_hash()
    }

    /// Wait until the transaction is mined or reverted
    pub async fn await_confirmation(self) -> Result<Receipt> {
        let tx_hash = self.pending.tx_hash();
        debug!("Waiting for confirmation of {}", tx_hash);
        let receipt = self.pending.confirm().await?;
        info!(
            "Transaction {} confirmed in block {:?}",
            receipt.tx_hash, receipt.block_number
        );
        Ok(receipt)
    }

    /// Like `await_confirmation`, but give up waiting after `limit`.
    ///
    /// A timeout says nothing about the transaction's fate; it may still land.
    pub async fn await_confirmation_within(self, limit: Duration) -> Result<Receipt> {
        match tokio::time::timeout(limit, self.await_confirmation()).await {
            Ok(result) => result,
            Err(_) => Err(Error::ConfirmationTimeout(limit.as_secs())),
        }
    }
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("tx_hash", &self.tx_hash())
            .finish()
    }
}

/// Contract connection bound to one session generation
#[derive(Clone)]
pub struct VaultClient {
    contract: Arc<dyn VaultContract>,
    address: Address,
    generation: Generation,
}

impl VaultClient {
    pub fn new(contract: Arc<dyn VaultContract>, address: Address, generation: Generation) -> Self {
        Self {
            contract,
            address,
            generation,
        }
    }

    /// Contract address this client talks to
    pub fn address(&self) -> Address {
        self.address
    }

    /// Session generation the client was built for
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub async fn read_status(&self) -> Result<u64> {
        self.contract.time_left().await
    }

    pub async fn read_owner(&self) -> Result<Address> {
        self.contract.owner().await
    }

    pub async fn read_beneficiary(&self) -> Result<Address> {
        self.contract.beneficiary().await
    }

    pub async fn read_balance(&self) -> Result<U256> {
        self.contract.balance().await
    }

    /// Submit the activity proof
    pub async fn send_heartbeat(&self) -> Result<TransactionHandle> {
        info!("Submitting keepAlive to {}", self.address);
        let pending = self.contract.keep_alive().await?;
        debug!("keepAlive submitted: {}", pending.tx_hash());
        Ok(TransactionHandle::new(pending))
    }

    /// Submit a beneficiary change. Malformed input is rejected before any
    /// network call.
    pub async fn send_set_beneficiary(&self, beneficiary: &str) -> Result<TransactionHandle> {
        let beneficiary = parse_address(beneficiary)?;
        info!("Submitting setBeneficiary({}) to {}", beneficiary, self.address);
        let pending = self.contract.set_beneficiary(beneficiary).await?;
        debug!("setBeneficiary submitted: {}", pending.tx_hash());
        Ok(TransactionHandle::new(pending))
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address)
            .field("generation", &self.generation)
            .finish()
    }
}
