//! Configuration loading and validation

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::wallet::session::parse_address;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub vault: VaultConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub actions: ActionConfig,
}

/// The one network the vault is deployed on
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_required_chain_id")]
    pub required_chain_id: u64,
    /// Display name used in the wrong-network warning
    #[serde(default = "default_network_name")]
    pub name: String,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Deployed contract address (fixed per deployment)
    pub contract_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionConfig {
    /// Bound on confirmation waiting; 0 waits until the chain resolves the transaction
    #[serde(default)]
    pub confirmation_timeout_secs: u64,
    /// Refuse a second write while one is pending instead of letting it overwrite the status
    #[serde(default)]
    pub reject_concurrent: bool,
}

// Default value functions
fn default_required_chain_id() -> u64 {
    8453 // Base Mainnet
}

fn default_network_name() -> String {
    "Base Mainnet".into()
}

fn default_rpc_url() -> String {
    std::env::var("RPC_URL").unwrap_or_else(|_| "https://mainnet.base.org".into())
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("network.required_chain_id", default_required_chain_id() as i64)?
            .set_default("network.name", default_network_name())?
            .set_default("network.rpc_url", default_rpc_url())?
            .set_default("poller.interval_secs", default_poll_interval_secs() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix VAULT_)
            .add_source(
                config::Environment::with_prefix("VAULT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.network.required_chain_id == 0 {
            anyhow::bail!("network.required_chain_id must be non-zero");
        }

        url::Url::parse(&self.network.rpc_url)
            .with_context(|| format!("Invalid network.rpc_url: {}", self.network.rpc_url))?;

        if self.vault.contract_address.is_empty() {
            anyhow::bail!("vault.contract_address must be set");
        }
        self.contract_address()?;

        if self.poller.interval_secs == 0 {
            anyhow::bail!("poller.interval_secs must be positive");
        }

        Ok(())
    }

    /// Parsed vault contract address
    pub fn contract_address(&self) -> Result<Address> {
        parse_address(&self.vault.contract_address)
            .with_context(|| format!("Invalid vault.contract_address: {}", self.vault.contract_address))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poller.interval_secs)
    }

    /// Confirmation bound, `None` when waiting is unbounded
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        match self.actions.confirmation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Network:
    name: {}
    required_chain_id: {}
    rpc_url: {}
  Vault:
    contract_address: {}
  Poller:
    interval: {}s
  Actions:
    confirmation_timeout: {}
    reject_concurrent: {}
  Signer:
    private_key: {}
"#,
            self.network.name,
            self.network.required_chain_id,
            mask_url(&self.network.rpc_url),
            self.vault.contract_address,
            self.poller.interval_secs,
            match self.actions.confirmation_timeout_secs {
                0 => "none".to_string(),
                secs => format!("{}s", secs),
            },
            self.actions.reject_concurrent,
            if std::env::var("PRIVATE_KEY").is_ok() {
                "***"
            } else {
                "(not set)"
            },
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                required_chain_id: default_required_chain_id(),
                name: default_network_name(),
                rpc_url: default_rpc_url(),
            },
            vault: VaultConfig {
                contract_address: String::new(),
            },
            poller: PollerConfig::default(),
            actions: ActionConfig::default(),
        }
    }
}
