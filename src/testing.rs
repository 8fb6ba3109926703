//! In-memory wallet and vault doubles for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{address, Address, B256, U256};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, Notify};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::vault::contract::{PendingTransaction, Receipt, VaultContract};
use crate::vault::state::{VaultSnapshot, VaultState};
use crate::wallet::provider::{WalletEvent, WalletProvider};
use crate::wallet::session::Generation;

pub const REQUIRED_CHAIN_ID: u64 = 8453;
pub const BASE_CHAIN_HEX: &str = "0x2105";

pub const VAULT_ADDRESS: Address = address!("1111111111111111111111111111111111111111");
pub const ACCOUNT: Address = address!("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
pub const BENEFICIARY: Address = address!("fb6916095ca1df60bb79ce92ce3ea74c37c5d359");

pub fn generation(epoch: u64) -> Generation {
    Generation {
        epoch,
        account: Some(ACCOUNT),
        network_id: Some(REQUIRED_CHAIN_ID),
    }
}

pub fn snapshot(time_left_seconds: u64) -> VaultSnapshot {
    VaultSnapshot {
        time_left_seconds,
        balance_wei: U256::ZERO,
        owner: ACCOUNT,
        beneficiary: Address::ZERO,
        fetched_at: Utc::now(),
    }
}

/// State with `ACCOUNT` connected on the required network
pub fn eligible_state() -> VaultState {
    let state = VaultState::new(REQUIRED_CHAIN_ID);
    state.update_session(|s| s.set_network(Some(REQUIRED_CHAIN_ID)));
    state.update_session(|s| s.set_account(Some(ACCOUNT)));
    state
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.network.rpc_url = "http://localhost:8545".to_string();
    config.vault.contract_address = VAULT_ADDRESS.to_checksum(None);
    config
}

/// How the mock wallet answers a transaction request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBehavior {
    Accept,
    Reject,
    Error,
}

/// How a submitted mock transaction ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmBehavior {
    Mined,
    Revert,
}

#[derive(Debug, Clone, Copy)]
enum Effect {
    KeepAlive,
    SetBeneficiary(Address),
}

struct Chain {
    time_left: u64,
    balance: U256,
    owner: Address,
    beneficiary: Address,
    fail_balance_reads: bool,
    submit: SubmitBehavior,
    confirm: ConfirmBehavior,
    read_gate: Option<Arc<Notify>>,
    confirm_gate: Option<Arc<Notify>>,
}

struct Shared {
    chain: Mutex<Chain>,
    status_reads: AtomicUsize,
    reads_seen: AtomicUsize,
    submissions: AtomicUsize,
    submissions_seen: AtomicUsize,
}

impl Shared {
    fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap()
    }
}

/// Vault contract double. Writes take effect when confirmed.
pub struct MockVault {
    shared: Arc<Shared>,
}

impl MockVault {
    /// Inactivity window the mock resets to on keepAlive
    pub const TIMEOUT_SECONDS: u64 = 30 * 24 * 60 * 60;

    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                chain: Mutex::new(Chain {
                    time_left: 86_400,
                    balance: U256::from(1_500_000_000_000_000_000u128),
                    owner: ACCOUNT,
                    beneficiary: Address::ZERO,
                    fail_balance_reads: false,
                    submit: SubmitBehavior::Accept,
                    confirm: ConfirmBehavior::Mined,
                    read_gate: None,
                    confirm_gate: None,
                }),
                status_reads: AtomicUsize::new(0),
                reads_seen: AtomicUsize::new(0),
                submissions: AtomicUsize::new(0),
                submissions_seen: AtomicUsize::new(0),
            }),
        }
    }

    pub fn set_time_left(&self, seconds: u64) {
        self.shared.chain().time_left = seconds;
    }

    pub fn balance_wei(&self) -> U256 {
        self.shared.chain().balance
    }

    pub fn owner_address(&self) -> Address {
        self.shared.chain().owner
    }

    pub fn fail_balance_reads(&self, fail: bool) {
        self.shared.chain().fail_balance_reads = fail;
    }

    pub fn set_submit_behavior(&self, behavior: SubmitBehavior) {
        self.shared.chain().submit = behavior;
    }

    pub fn set_confirm_behavior(&self, behavior: ConfirmBehavior) {
        self.shared.chain().confirm = behavior;
    }

    /// Block every read until the returned gate is notified
    pub fn hold_reads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.shared.chain().read_gate = Some(gate.clone());
        gate
    }

    /// Block every confirmation until the returned gate is notified
    pub fn hold_confirmations(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.shared.chain().confirm_gate = Some(gate.clone());
        gate
    }

    /// Number of `time_left` reads started, one per refresh
    pub fn status_reads(&self) -> usize {
        self.shared.status_reads.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.shared.submissions.load(Ordering::SeqCst)
    }

    /// Wait until a refresh starts that was not observed by a previous call
    pub async fn wait_for_read(&self) {
        let seen = self.shared.reads_seen.load(Ordering::SeqCst);
        self.wait_for_status_reads(seen + 1).await;
        self.shared
            .reads_seen
            .store(self.status_reads(), Ordering::SeqCst);
    }

    /// Wait until at least `count` refreshes have started
    pub async fn wait_for_status_reads(&self, count: usize) {
        while self.status_reads() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Wait until a submission lands that was not observed by a previous call
    pub async fn wait_for_submission(&self) {
        let seen = self.shared.submissions_seen.load(Ordering::SeqCst);
        while self.submissions() <= seen {
            tokio::task::yield_now().await;
        }
        // Let the action reach its confirmation wait
        tokio::task::yield_now().await;
        self.shared
            .submissions_seen
            .store(self.submissions(), Ordering::SeqCst);
    }

    async fn gate_reads(&self) {
        let gate = self.shared.chain().read_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn submit(&self, effect: Effect) -> Result<Box<dyn PendingTransaction>> {
        let behavior = self.shared.chain().submit;
        match behavior {
            SubmitBehavior::Reject => {
                return Err(Error::SubmissionRejected("user rejected the request".into()))
            }
            SubmitBehavior::Error => return Err(Error::SubmissionError("nonce too low".into())),
            SubmitBehavior::Accept => {}
        }

        let n = self.shared.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let pending: Box<dyn PendingTransaction> = Box::new(MockPending {
            shared: self.shared.clone(),
            tx_hash: B256::repeat_byte(n as u8),
            effect,
        });
        Ok(pending)
    }
}

impl Default for MockVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VaultContract for MockVault {
    async fn time_left(&self) -> Result<u64> {
        self.shared.status_reads.fetch_add(1, Ordering::SeqCst);
        self.gate_reads().await;
        Ok(self.shared.chain().time_left)
    }

    async fn owner(&self) -> Result<Address> {
        self.gate_reads().await;
        Ok(self.shared.chain().owner)
    }

    async fn beneficiary(&self) -> Result<Address> {
        self.gate_reads().await;
        Ok(self.shared.chain().beneficiary)
    }

    async fn balance(&self) -> Result<U256> {
        self.gate_reads().await;
        let chain = self.shared.chain();
        if chain.fail_balance_reads {
            return Err(Error::ReadFailed("eth_getBalance: connection refused".into()));
        }
        Ok(chain.balance)
    }

    async fn keep_alive(&self) -> Result<Box<dyn PendingTransaction>> {
        self.submit(Effect::KeepAlive)
    }

    async fn set_beneficiary(&self, beneficiary: Address) -> Result<Box<dyn PendingTransaction>> {
        self.submit(Effect::SetBeneficiary(beneficiary))
    }
}

struct MockPending {
    shared: Arc<Shared>,
    tx_hash: B256,
    effect: Effect,
}

#[async_trait]
impl PendingTransaction for MockPending {
    fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    async fn confirm(self: Box<Self>) -> Result<Receipt> {
        let gate = self.shared.chain().confirm_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut chain = self.shared.chain();
        if chain.confirm == ConfirmBehavior::Revert {
            return Err(Error::ConfirmationFailed(format!(
                "transaction {} reverted",
                self.tx_hash
            )));
        }

        match self.effect {
            Effect::KeepAlive => chain.time_left = MockVault::TIMEOUT_SECONDS,
            Effect::SetBeneficiary(beneficiary) => chain.beneficiary = beneficiary,
        }

        Ok(Receipt {
            tx_hash: self.tx_hash,
            block_number: Some(1),
        })
    }
}

/// Wallet double handing out a shared `MockVault`
pub struct MockWallet {
    vault: Arc<MockVault>,
    accounts: Mutex<Vec<String>>,
    reject: Mutex<bool>,
    chain_id: Mutex<u64>,
    events: broadcast::Sender<WalletEvent>,
    contracts_built: AtomicUsize,
}

impl MockWallet {
    pub fn new(vault: Arc<MockVault>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            vault,
            accounts: Mutex::new(vec![ACCOUNT.to_checksum(None)]),
            reject: Mutex::new(false),
            chain_id: Mutex::new(REQUIRED_CHAIN_ID),
            events,
            contracts_built: AtomicUsize::new(0),
        }
    }

    pub fn reject_connections(&self) {
        *self.reject.lock().unwrap() = true;
    }

    pub fn set_accounts(&self, accounts: Vec<String>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        *self.chain_id.lock().unwrap() = chain_id;
    }

    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    pub fn contracts_built(&self) -> usize {
        self.contracts_built.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        if *self.reject.lock().unwrap() {
            return Err(Error::ConnectionRejected("user rejected the request".into()));
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(*self.chain_id.lock().unwrap())
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    fn connect_contract(&self, _contract: Address, _account: Address) -> Result<Arc<dyn VaultContract>> {
        self.contracts_built.fetch_add(1, Ordering::SeqCst);
        let contract: Arc<dyn VaultContract> = self.vault.clone();
        Ok(contract)
    }
}
