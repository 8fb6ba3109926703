//! Display formatting for vault values

use alloy::primitives::utils::format_units;
use alloy::primitives::U256;

use crate::vault::state::{OperationStatus, SessionView, VaultSnapshot};

/// Render a countdown as "{d}d {h}h {m}m {s}s"
pub fn format_time_left(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    format!("{}d {}h {}m {}s", days, hours, minutes, secs)
}

/// Wei to a decimal ether string with trailing zeros dropped ("1.5", "0.0")
pub fn format_ether(wei: U256) -> String {
    let raw = match format_units(wei, "ether") {
        Ok(s) => s,
        Err(_) => return wei.to_string(),
    };

    match raw.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{}.0", whole)
            } else {
                format!("{}.{}", whole, frac)
            }
        }
        None => format!("{}.0", raw),
    }
}

/// Beneficiary display, "Not set" for the zero address
pub fn format_beneficiary(snapshot: &VaultSnapshot) -> String {
    if snapshot.has_beneficiary() {
        snapshot.beneficiary.to_checksum(None)
    } else {
        "Not set".to_string()
    }
}

/// Multi-line vault summary
pub fn render_snapshot(snapshot: &VaultSnapshot) -> String {
    format!(
        "Time left:   {}\nBalance:     {} ETH\nOwner:       {}\nBeneficiary: {}\nUpdated:     {}",
        format_time_left(snapshot.time_left_seconds),
        format_ether(snapshot.balance_wei),
        snapshot.owner.to_checksum(None),
        format_beneficiary(snapshot),
        snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub fn render_session(view: &SessionView, network_name: &str, required_network_id: u64) -> String {
    let account = match view.account {
        Some(account) => account.to_checksum(None),
        None => "Not connected".to_string(),
    };
    let network = match view.network_id {
        Some(id) if view.eligible => format!("{} ({})", network_name, id),
        Some(id) => format!("{} (wrong network)", id),
        None => "Unknown".to_string(),
    };

    let mut out = format!("Account:     {}\nNetwork:     {}", account, network);
    if !view.eligible {
        out.push('\n');
        out.push_str(&crate::network::wrong_network_warning(
            network_name,
            required_network_id,
        ));
    }
    out
}

/// One-line status, empty when idle
pub fn render_status(status: &OperationStatus) -> String {
    let tag = match status {
        OperationStatus::Idle => return String::new(),
        OperationStatus::Pending(_) => "pending",
        OperationStatus::Success(_) => "ok",
        OperationStatus::Failed(_) => "error",
    };
    format!("[{}] {}", tag, status.message().unwrap_or_default())
}
