pub mod balance;
pub mod config;
pub mod connection;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod mock;
pub mod wallet;

// Re-export the types a presentation layer needs
pub use balance::{BalanceController, DecryptedBalance, RevealedSecret};
pub use config::{BuildMode, DeploymentDir, DeploymentSource, FixedDeployment};
pub use connection::{ConnectionManager, ConnectionState, ConnectionView, Phase, Session};
pub use engine::{EncryptedAmount, EncryptedInput, EncryptionEngine, EngineFactory, EngineHandle};
pub use error::{Error, Result};
pub use ledger::{AlloyLedger, ConfidentialLedger, TransferArgs};
pub use wallet::{ProviderEvent, Subscription, WalletProvider, WalletSigner};
