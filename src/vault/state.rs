//! Shared vault state
//!
//! The reactive fields a presentation layer renders: session view, vault
//! snapshot and operation status. The poller and the action coordinator only
//! ever replace these wholesale, and only while the generation they started
//! under is still current.

use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::network::is_eligible;
use crate::wallet::session::{Generation, WalletSession};

/// One consistent read of the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultSnapshot {
    pub time_left_seconds: u64,
    pub balance_wei: U256,
    pub owner: Address,
    /// Zero address when not set
    pub beneficiary: Address,
    pub fetched_at: DateTime<Utc>,
}

impl VaultSnapshot {
    pub fn has_beneficiary(&self) -> bool {
        !self.beneficiary.is_zero()
    }
}

/// Outcome of the most recent operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Idle,
    Pending(String),
    Success(String),
    Failed(String),
}

impl OperationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationStatus::Pending(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            OperationStatus::Idle => None,
            OperationStatus::Pending(m) | OperationStatus::Success(m) | OperationStatus::Failed(m) => {
                Some(m.as_str())
            }
        }
    }
}

/// Wallet session as seen by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionView {
    pub account: Option<Address>,
    pub network_id: Option<u64>,
    pub eligible: bool,
}

/// Shared session, snapshot and status slots
#[derive(Clone)]
pub struct VaultState {
    inner: Arc<Inner>,
}

struct Inner {
    required_network_id: u64,
    session: Mutex<WalletSession>,
    view: watch::Sender<SessionView>,
    snapshot: watch::Sender<Option<VaultSnapshot>>,
    status: watch::Sender<OperationStatus>,
}

impl VaultState {
    pub fn new(required_network_id: u64) -> Self {
        let session = WalletSession::new();
        let (view, _) = watch::channel(view_of(&session, required_network_id));
        let (snapshot, _) = watch::channel(None);
        let (status, _) = watch::channel(OperationStatus::Idle);

        Self {
            inner: Arc::new(Inner {
                required_network_id,
                session: Mutex::new(session),
                view,
                snapshot,
                status,
            }),
        }
    }

    pub fn required_network_id(&self) -> u64 {
        self.inner.required_network_id
    }

    /// Current session generation
    pub fn generation(&self) -> Generation {
        self.session().generation()
    }

    /// Mutate the session. If it changed, the new generation is published and
    /// returned; every commit tagged with an older generation is refused from
    /// here on.
    pub fn update_session<F>(&self, update: F) -> Option<Generation>
    where
        F: FnOnce(&mut WalletSession) -> bool,
    {
        let mut session = self.session();
        if !update(&mut *session) {
            return None;
        }
        let generation = session.generation();
        self.inner
            .view
            .send_replace(view_of(&session, self.inner.required_network_id));
        debug!("Session moved to epoch {}", generation.epoch);
        Some(generation)
    }

    /// Retire the current generation so nothing started under it can commit
    pub fn invalidate(&self) -> Generation {
        let mut session = self.session();
        session.retire();
        let generation = session.generation();
        debug!("Session invalidated, now epoch {}", generation.epoch);
        generation
    }

    /// Replace the snapshot if `generation` is still current
    pub fn commit_snapshot(&self, generation: Generation, snapshot: VaultSnapshot) -> bool {
        let session = self.session();
        if session.generation().epoch != generation.epoch {
            debug!("Discarding snapshot from stale epoch {}", generation.epoch);
            return false;
        }
        self.inner.snapshot.send_replace(Some(snapshot));
        true
    }

    /// Replace the status if `generation` is still current
    pub fn commit_status(&self, generation: Generation, status: OperationStatus) -> bool {
        let session = self.session();
        if session.generation().epoch != generation.epoch {
            debug!("Discarding status from stale epoch {}: {:?}", generation.epoch, status);
            return false;
        }
        self.inner.status.send_replace(status);
        true
    }

    /// Replace the status unconditionally (session-level outcomes)
    pub fn set_status(&self, status: OperationStatus) {
        self.inner.status.send_replace(status);
    }

    pub fn view(&self) -> SessionView {
        *self.inner.view.borrow()
    }

    pub fn snapshot(&self) -> Option<VaultSnapshot> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn status(&self) -> OperationStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.inner.view.subscribe()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<VaultSnapshot>> {
        self.inner.snapshot.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<OperationStatus> {
        self.inner.status.subscribe()
    }

    fn session(&self) -> MutexGuard<'_, WalletSession> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn view_of(session: &WalletSession, required_network_id: u64) -> SessionView {
    SessionView {
        account: session.account(),
        network_id: session.network_id(),
        eligible: is_eligible(session.network_id(), required_network_id),
    }
}
