//! JSON-RPC binding of the vault contract
//!
//! Generated from the contract ABI with alloy's `sol!` macro. Reads go through
//! the same signer-backed provider as writes.

use alloy::contract::Error as ContractError;
use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{PendingTransactionBuilder, Provider};
use alloy::sol;
use alloy::transports::Transport;
use async_trait::async_trait;

use crate::error::{Error, Result};

use super::contract::{PendingTransaction, Receipt, VaultContract};

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract InactivityVault {
        function getStatus() external view returns (uint256 timeLeft);
        function owner() external view returns (address);
        function beneficiary() external view returns (address);
        function keepAlive() external;
        function setBeneficiary(address newBeneficiary) external;
    }
}

/// EIP-1193 "User Rejected Request"
const USER_REJECTED_REQUEST: i64 = 4001;

/// Vault contract reached over JSON-RPC
pub struct RpcVault<T, P> {
    instance: InactivityVault::InactivityVaultInstance<T, P>,
}

impl<T, P> RpcVault<T, P>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            instance: InactivityVault::new(address, provider),
        }
    }
}

#[async_trait]
impl<T, P> VaultContract for RpcVault<T, P>
where
    T: Transport + Clone + Send + Sync + 'static,
    P: Provider<T> + Send + Sync + 'static,
{
    async fn time_left(&self) -> Result<u64> {
        let status = self
            .instance
            .getStatus()
            .call()
            .await
            .map_err(|e| Error::ReadFailed(format!("getStatus: {}", e)))?;

        u64::try_from(status.timeLeft)
            .map_err(|_| Error::ReadFailed(format!("timeLeft out of range: {}", status.timeLeft)))
    }

    async fn owner(&self) -> Result<Address> {
        let owner = self
            .instance
            .owner()
            .call()
            .await
            .map_err(|e| Error::ReadFailed(format!("owner: {}", e)))?;
        Ok(owner._0)
    }

    async fn beneficiary(&self) -> Result<Address> {
        let beneficiary = self
            .instance
            .beneficiary()
            .call()
            .await
            .map_err(|e| Error::ReadFailed(format!("beneficiary: {}", e)))?;
        Ok(beneficiary._0)
    }

    async fn balance(&self) -> Result<U256> {
        self.instance
            .provider()
            .get_balance(*self.instance.address())
            .await
            .map_err(|e| Error::ReadFailed(format!("balance: {}", e)))
    }

    async fn keep_alive(&self) -> Result<Box<dyn PendingTransaction>> {
        let pending = self
            .instance
            .keepAlive()
            .send()
            .await
            .map_err(submission_failed)?;
        let pending: Box<dyn PendingTransaction> = Box::new(RpcPendingTransaction { inner: pending });
        Ok(pending)
    }

    async fn set_beneficiary(&self, beneficiary: Address) -> Result<Box<dyn PendingTransaction>> {
        let pending = self
            .instance
            .setBeneficiary(beneficiary)
            .send()
            .await
            .map_err(submission_failed)?;
        let pending: Box<dyn PendingTransaction> = Box::new(RpcPendingTransaction { inner: pending });
        Ok(pending)
    }
}

/// Split wallet refusals from transport and revert failures
fn submission_failed(err: ContractError) -> Error {
    if let ContractError::TransportError(transport) = &err {
        if let Some(payload) = transport.as_error_resp() {
            if payload.code == USER_REJECTED_REQUEST {
                return Error::SubmissionRejected(payload.message.to_string());
            }
        }
    }
    Error::SubmissionError(err.to_string())
}

struct RpcPendingTransaction<T> {
    inner: PendingTransactionBuilder<T, Ethereum>,
}

#[async_trait]
impl<T> PendingTransaction for RpcPendingTransaction<T>
where
    T: Transport + Clone + Send + Sync + 'static,
{
    fn tx_hash(&self) -> B256 {
        *self.inner.tx_hash()
    }

    async fn confirm(self: Box<Self>) -> Result<Receipt> {
        let receipt = self
            .inner
            .get_receipt()
            .await
            .map_err(|e| Error::ConfirmationFailed(e.to_string()))?;

        receipt_outcome(
            receipt.transaction_hash(),
            receipt.status(),
            receipt.block_number(),
        )
    }
}

/// A mined receipt with a failed status is a revert
fn receipt_outcome(tx_hash: B256, succeeded: bool, block_number: Option<u64>) -> Result<Receipt> {
    if !succeeded {
        return Err(Error::ConfirmationFailed(format!(
            "transaction {} reverted",
            tx_hash
        )));
    }

    Ok(Receipt {
        tx_hash,
        block_number,
    })
}
