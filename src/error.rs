//! Error types for the vault client

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the vault client
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Wallet session errors
    #[error("No Ethereum wallet detected")]
    WalletUnavailable,

    #[error("Wallet connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("Invalid network id: {0}")]
    InvalidNetworkId(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // Contract errors
    #[error("Vault contract not available (wallet disconnected or wrong network)")]
    VaultUnavailable,

    #[error("Vault read failed: {0}")]
    ReadFailed(String),

    #[error("Transaction rejected by wallet: {0}")]
    SubmissionRejected(String),

    #[error("Transaction submission failed: {0}")]
    SubmissionError(String),

    #[error("Transaction confirmation failed: {0}")]
    ConfirmationFailed(String),

    #[error("Transaction not confirmed after {0}s (it may still land)")]
    ConfirmationTimeout(u64),

    #[error("Another vault action is still pending")]
    ActionInProgress,

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if the user (or their wallet) declined the request
    pub fn is_user_rejection(&self) -> bool {
        matches!(
            self,
            Error::ConnectionRejected(_) | Error::SubmissionRejected(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::SubmissionRejected("denied".into()).is_user_rejection());
        assert!(Error::ConnectionRejected("denied".into()).is_user_rejection());
        assert!(!Error::SubmissionError("reverted".into()).is_user_rejection());
        assert!(!Error::ConfirmationTimeout(30).is_user_rejection());
    }
}
