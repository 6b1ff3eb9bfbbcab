use thiserror::Error;

use crate::config::DeploymentError;
use crate::engine::EngineError;
use crate::ledger::LedgerError;
use crate::wallet::WalletError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No wallet provider was detected. Terminal for the session.
    #[error("No wallet has been found")]
    NoWallet,

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    #[error("Invalid Ethereum address.")]
    InvalidAddress,

    #[error("{0:?} is not a valid 64-bit amount")]
    InvalidAmount(String),

    #[error("a confirmed recipient and an encrypted amount are required")]
    TransferNotReady,

    #[error("the encrypted amount was produced for another contract or account")]
    StaleEncryption,
}
