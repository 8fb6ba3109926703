//! Wallet session state
//!
//! Tracks the connected account and active network. Every effective change
//! bumps the session epoch, which is what in-flight reads and writes compare
//! against before they are allowed to publish results.

use std::str::FromStr;

use alloy::primitives::Address;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::network::{is_eligible, parse_chain_id};

use super::provider::WalletEvent;

/// Identity of the session at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    pub epoch: u64,
    pub account: Option<Address>,
    pub network_id: Option<u64>,
}

impl Generation {
    /// Does this generation allow a vault contract client
    pub fn is_eligible(&self, required_network_id: u64) -> bool {
        self.account.is_some() && is_eligible(self.network_id, required_network_id)
    }
}

/// Connected account and active network
#[derive(Debug, Clone, Default)]
pub struct WalletSession {
    account: Option<Address>,
    network_id: Option<u64>,
    epoch: u64,
}

impl WalletSession {
    /// New session in the disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn network_id(&self) -> Option<u64> {
        self.network_id
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    pub fn generation(&self) -> Generation {
        Generation {
            epoch: self.epoch,
            account: self.account,
            network_id: self.network_id,
        }
    }

    /// Set or clear the account. Returns true if it changed.
    pub fn set_account(&mut self, account: Option<Address>) -> bool {
        if self.account == account {
            return false;
        }
        self.account = account;
        self.epoch += 1;
        true
    }

    /// Set or clear the network. Returns true if it changed.
    pub fn set_network(&mut self, network_id: Option<u64>) -> bool {
        if self.network_id == network_id {
            return false;
        }
        self.network_id = network_id;
        self.epoch += 1;
        true
    }

    /// Supersede the current generation without changing account or network
    pub fn retire(&mut self) {
        self.epoch += 1;
    }

    /// Apply a wallet notification. Returns true if the session changed.
    pub fn apply(&mut self, event: &WalletEvent) -> bool {
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                let account = match accounts.first() {
                    Some(raw) => match parse_address(raw) {
                        Ok(address) => Some(address),
                        Err(e) => {
                            warn!("Ignoring malformed account from wallet, treating as disconnect: {}", e);
                            None
                        }
                    },
                    None => None,
                };
                debug!("Accounts changed: {:?}", account);
                self.set_account(account)
            }
            WalletEvent::ChainChanged(hex) => {
                let network_id = match parse_chain_id(hex) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!("Unrecognized chain id from wallet: {}", e);
                        None
                    }
                };
                debug!("Network changed: {:?}", network_id);
                self.set_network(network_id)
            }
        }
    }
}

/// Parse a well-formed account address.
///
/// Accepts 40 hex digits with an optional `0x` prefix. All-lowercase and
/// all-uppercase input is accepted as is; mixed case must carry a valid
/// EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address> {
    let digits = input.strip_prefix("0x").unwrap_or(input);

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidAddress(input.to_string()));
    }

    let address =
        Address::from_str(digits).map_err(|_| Error::InvalidAddress(input.to_string()))?;

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum(None)[2..] != *digits {
        return Err(Error::InvalidAddress(input.to_string()));
    }

    Ok(address)
}
