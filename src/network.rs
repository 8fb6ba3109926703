//! Network gate
//!
//! The vault lives on exactly one chain. Everything that touches the contract
//! is gated on the wallet's active network matching it.

use crate::error::{Error, Result};

/// Is the active network the one the vault is deployed on
pub fn is_eligible(network_id: Option<u64>, required_network_id: u64) -> bool {
    network_id == Some(required_network_id)
}

/// Parse a chain id as delivered by wallet `chainChanged` events ("0x2105")
pub fn parse_chain_id(hex: &str) -> Result<u64> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);

    if digits.is_empty() {
        return Err(Error::InvalidNetworkId(hex.to_string()));
    }

    u64::from_str_radix(digits, 16).map_err(|_| Error::InvalidNetworkId(hex.to_string()))
}

/// Warning shown while the wallet sits on another network
pub fn wrong_network_warning(network_name: &str, required_network_id: u64) -> String {
    format!(
        "Please switch to {} (Chain ID {}).",
        network_name, required_network_id
    )
}
