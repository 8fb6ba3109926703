//! Local-key wallet
//!
//! Stands in for a browser-injected wallet: a private key from the
//! environment signs, and an HTTP JSON-RPC endpoint supplies the network.
//! Network changes are detected by watching the endpoint's chain id.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::vault::contract::VaultContract;
use crate::vault::rpc::RpcVault;

use super::provider::{WalletEvent, WalletProvider};

const EVENT_CAPACITY: usize = 16;

/// Wallet backed by a local private key and an HTTP RPC endpoint
pub struct LocalWallet {
    rpc_url: Url,
    signer: Option<PrivateKeySigner>,
    events: broadcast::Sender<WalletEvent>,
}

impl LocalWallet {
    /// Create a wallet. Without a signer, account requests are rejected.
    pub fn new(rpc_url: &str, signer: Option<PrivateKeySigner>) -> Result<Self> {
        let rpc_url = Url::parse(rpc_url)
            .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            rpc_url,
            signer,
            events,
        })
    }

    /// Create a wallet using the `PRIVATE_KEY` environment variable, if set
    pub fn from_env(rpc_url: &str) -> Result<Self> {
        let signer = match std::env::var("PRIVATE_KEY") {
            Ok(pk) => {
                let pk_str = pk.trim().trim_start_matches("0x");
                let signer = PrivateKeySigner::from_str(pk_str)
                    .map_err(|e| Error::Config(format!("Invalid PRIVATE_KEY: {}", e)))?;
                info!("Loaded signer: {}", signer.address());
                Some(signer)
            }
            Err(_) => {
                warn!("PRIVATE_KEY not set - wallet is read-only and cannot connect");
                None
            }
        };

        Self::new(rpc_url, signer)
    }

    /// Address of the configured signer
    pub fn address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    /// Emit `ChainChanged` whenever the endpoint reports a different chain id
    pub fn watch_network(self: &Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let wallet = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last_seen: Option<u64> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match wallet.chain_id().await {
                            Ok(id) if last_seen != Some(id) => {
                                if last_seen.is_some() {
                                    info!("Wallet network changed to {}", id);
                                    let _ = wallet.events.send(WalletEvent::ChainChanged(format!("{:#x}", id)));
                                }
                                last_seen = Some(id);
                            }
                            Ok(_) => {}
                            Err(e) => debug!("Network watch failed: {}", e),
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("Network watcher shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        match &self.signer {
            Some(signer) => Ok(vec![signer.address().to_string()]),
            None => Err(Error::ConnectionRejected(
                "no signing key configured (set PRIVATE_KEY)".into(),
            )),
        }
    }

    async fn chain_id(&self) -> Result<u64> {
        ProviderBuilder::new()
            .on_http(self.rpc_url.clone())
            .get_chain_id()
            .await
            .map_err(|e| Error::Rpc(format!("Failed to get chain id: {}", e)))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    fn connect_contract(&self, contract: Address, account: Address) -> Result<Arc<dyn VaultContract>> {
        let signer = self
            .signer
            .clone()
            .ok_or_else(|| Error::ConnectionRejected("no signing key configured".into()))?;

        if signer.address() != account {
            return Err(Error::ConnectionRejected(format!(
                "account {} is not controlled by this wallet",
                account
            )));
        }

        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .on_http(self.rpc_url.clone());

        let vault: Arc<dyn VaultContract> = Arc::new(RpcVault::<Http<Client>, _>::new(contract, provider));
        Ok(vault)
    }
}
