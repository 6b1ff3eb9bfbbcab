//! Ledger interface of the confidential token
//!
//! Reads return the encrypted balance handle and the revealed secret; writes
//! submit a transfer of an encrypted amount and the secret reveal request.
//! [`AlloyLedger`] binds the interface to a deployed contract over JSON-RPC.

use std::str::FromStr;

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::providers::Provider;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::wallet::WalletSigner;

alloy::sol! {
    /// Calls the client makes on the deployed confidential token.
    #[sol(rpc)]
    interface IConfidentialERC20 {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, bytes32 encryptedAmount, bytes calldata inputProof) external returns (bool);
        function requestSecret() external;
        function revealedSecret() external view returns (uint64);
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("call to {0} failed: {1}")]
    Call(&'static str, String),

    #[error("transaction {0} failed: {1}")]
    Transaction(&'static str, String),

    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    #[error("invalid {0} argument: {1}")]
    InvalidArgument(&'static str, String),

    #[error("signer {signer} cannot send from the ledger account {sender}")]
    SignerMismatch { signer: Address, sender: Address },
}

/// Arguments of the `transfer` call, with the handle and proof already
/// rendered as hex strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferArgs {
    pub recipient: Address,
    /// Fixed-width (32 byte) handle.
    pub handle: String,
    /// Variable-length input proof.
    pub proof: String,
}

impl TransferArgs {
    pub fn handle_bytes(&self) -> Result<B256, LedgerError> {
        B256::from_str(&self.handle)
            .map_err(|e| LedgerError::InvalidArgument("handle", e.to_string()))
    }

    pub fn proof_bytes(&self) -> Result<Bytes, LedgerError> {
        Bytes::from_str(&self.proof).map_err(|e| LedgerError::InvalidArgument("proof", e.to_string()))
    }
}

#[async_trait]
pub trait ConfidentialLedger: Send + Sync {
    /// Encrypted balance handle of `account`.
    async fn balance_of(&self, contract: Address, account: Address) -> Result<U256, LedgerError>;

    /// Submits a transfer and waits for it to be mined.
    async fn transfer(
        &self,
        contract: Address,
        signer: &WalletSigner,
        args: &TransferArgs,
    ) -> Result<TxHash, LedgerError>;

    /// Submits the secret reveal request and waits for it to be mined.
    async fn request_secret(&self, contract: Address, signer: &WalletSigner) -> Result<TxHash, LedgerError>;

    /// Revealed secret, `0` while the reveal is pending.
    async fn revealed_secret(&self, contract: Address) -> Result<u64, LedgerError>;
}

/// JSON-RPC binding of the token contract.
///
/// `provider` must carry a wallet able to sign for `sender`.
#[derive(Debug, Clone)]
pub struct AlloyLedger<P> {
    provider: P,
    sender: Address,
}

impl<P> AlloyLedger<P> {
    pub fn new(provider: P, sender: Address) -> Self {
        Self { provider, sender }
    }

    fn check_signer(&self, signer: &WalletSigner) -> Result<(), LedgerError> {
        let address = signer.address();
        if address != self.sender {
            return Err(LedgerError::SignerMismatch {
                signer: address,
                sender: self.sender,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<P> ConfidentialLedger for AlloyLedger<P>
where
    P: Provider + Clone + 'static,
{
    async fn balance_of(&self, contract: Address, account: Address) -> Result<U256, LedgerError> {
        let token = IConfidentialERC20::new(contract, &self.provider);
        token
            .balanceOf(account)
            .call()
            .await
            .map_err(|e| LedgerError::Call("balanceOf", e.to_string()))
    }

    async fn transfer(
        &self,
        contract: Address,
        signer: &WalletSigner,
        args: &TransferArgs,
    ) -> Result<TxHash, LedgerError> {
        self.check_signer(signer)?;
        let handle = args.handle_bytes()?;
        let proof = args.proof_bytes()?;

        let token = IConfidentialERC20::new(contract, &self.provider);
        let pending = token
            .transfer(args.recipient, handle, proof)
            .from(self.sender)
            .send()
            .await
            .map_err(|e| LedgerError::Transaction("transfer", e.to_string()))?;
        debug!(tx = %pending.tx_hash(), "transfer submitted");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| LedgerError::Transaction("transfer", e.to_string()))?;
        if !receipt.status() {
            return Err(LedgerError::Reverted(receipt.transaction_hash));
        }
        info!(tx = %receipt.transaction_hash, "transfer confirmed");
        Ok(receipt.transaction_hash)
    }

    async fn request_secret(&self, contract: Address, signer: &WalletSigner) -> Result<TxHash, LedgerError> {
        self.check_signer(signer)?;

        let token = IConfidentialERC20::new(contract, &self.provider);
        let pending = token
            .requestSecret()
            .from(self.sender)
            .send()
            .await
            .map_err(|e| LedgerError::Transaction("requestSecret", e.to_string()))?;

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| LedgerError::Transaction("requestSecret", e.to_string()))?;
        if !receipt.status() {
            return Err(LedgerError::Reverted(receipt.transaction_hash));
        }
        info!(tx = %receipt.transaction_hash, "secret reveal requested");
        Ok(receipt.transaction_hash)
    }

    async fn revealed_secret(&self, contract: Address) -> Result<u64, LedgerError> {
        let token = IConfidentialERC20::new(contract, &self.provider);
        token
            .revealedSecret()
            .call()
            .await
            .map_err(|e| LedgerError::Call("revealedSecret", e.to_string()))
    }
}
