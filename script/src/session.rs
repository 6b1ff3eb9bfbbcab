//! Wires the connection manager and balance controller to concrete
//! collaborators for the selected build mode.
//!
//! Production talks to real networks through [`RpcWallet`], [`AlloyLedger`]
//! and the [`RelayerEngineFactory`]. The mocked mode runs the whole token
//! in-process on Hardhat's chain id.

use std::sync::Arc;

use alloy::primitives::{address, Address};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, Context, Result};
use cerc20_lib::config::{BuildMode, DeploymentDir, DeploymentSource, FixedDeployment};
use cerc20_lib::connection::{ConnectionManager, ConnectionView};
use cerc20_lib::engine::EngineHandle;
use cerc20_lib::ledger::{AlloyLedger, ConfidentialLedger};
use cerc20_lib::mock::{dev_signer, parse_chain_id, CiphertextDb, MockEngineFactory, MockLedger, MockWallet};
use cerc20_lib::wallet::WalletProvider;
use cerc20_lib::BalanceController;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::relayer::RelayerEngineFactory;
use crate::rpc_wallet::RpcWallet;

/// Address Hardhat assigns to the first contract deployed by account #0.
pub const MOCK_TOKEN_ADDRESS: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

/// Balance credited to the connected account in the mocked mode.
pub const MOCK_INITIAL_SUPPLY: u64 = 1_000_000;

/// Secret the mocked token reveals, and after how many polls.
pub const MOCK_SECRET: u64 = 42;
pub const MOCK_REVEAL_POLLS: usize = 2;

enum Backend {
    Mocked {
        wallet: Arc<MockWallet>,
        ledger: Arc<MockLedger>,
    },
    Rpc {
        wallet: Arc<RpcWallet>,
    },
    /// No key was configured, so there is no wallet to talk to.
    Missing,
}

pub struct App {
    manager: ConnectionManager,
    backend: Backend,
    deployment: Box<dyn DeploymentSource>,
}

fn signer_from(config: &AppConfig) -> Result<Option<PrivateKeySigner>> {
    config
        .private_key()?
        .map(|key| key.parse::<PrivateKeySigner>().context("Invalid private key"))
        .transpose()
}

impl App {
    pub async fn build(config: &AppConfig) -> Result<Self> {
        let mode = config.mode();
        let chain_id = config.initial_chain_id();

        let app = match mode {
            BuildMode::Mocked => {
                let signer = match signer_from(config)? {
                    Some(signer) => signer,
                    None => dev_signer(0)?,
                };
                let account = signer.address();
                let db = CiphertextDb::new();
                let ledger_chain = parse_chain_id(mode.authorized_chain_id()).unwrap_or_default();
                let ledger = Arc::new(
                    MockLedger::new(db.clone(), MOCK_TOKEN_ADDRESS, ledger_chain)
                        .with_secret(MOCK_SECRET, MOCK_REVEAL_POLLS),
                );
                ledger.mint(account, MOCK_INITIAL_SUPPLY);
                debug!(%account, "mocked token funded");

                let engine = EngineHandle::new(Arc::new(MockEngineFactory::new(db)));
                Self {
                    manager: ConnectionManager::new(mode, engine),
                    backend: Backend::Mocked {
                        wallet: Arc::new(MockWallet::new(&chain_id).with_signer(signer)),
                        ledger,
                    },
                    deployment: Box::new(FixedDeployment {
                        mode,
                        address: MOCK_TOKEN_ADDRESS,
                    }),
                }
            }
            BuildMode::Production => {
                let engine = EngineHandle::new(Arc::new(RelayerEngineFactory::new(config.relayer_url.clone())));
                let backend = match signer_from(config)? {
                    Some(signer) => {
                        let wallet = RpcWallet::connect(signer, config.rpc_urls(), &chain_id).await?;
                        Backend::Rpc {
                            wallet: Arc::new(wallet),
                        }
                    }
                    None => {
                        warn!("no private key configured");
                        Backend::Missing
                    }
                };
                Self {
                    manager: ConnectionManager::new(mode, engine),
                    backend,
                    deployment: Box::new(DeploymentDir::new(config.deployments_dir.clone())),
                }
            }
        };
        Ok(app)
    }

    pub fn mode(&self) -> BuildMode {
        self.manager.mode()
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConnectionManager {
        &mut self.manager
    }

    fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        match &self.backend {
            Backend::Mocked { wallet, .. } => Some(wallet.clone()),
            Backend::Rpc { wallet } => Some(wallet.clone()),
            Backend::Missing => None,
        }
    }

    /// Attaches the wallet and adopts an already authorized account.
    pub async fn initialize(&mut self) -> Result<()> {
        let provider = self.provider();
        self.manager.initialize(provider).await?;
        Ok(())
    }

    /// Like [`App::initialize`], but a missing wallet is left in the
    /// connection view for rendering instead of returned.
    pub async fn detect(&mut self) -> Result<()> {
        let provider = self.provider();
        match self.manager.initialize(provider).await {
            Err(cerc20_lib::Error::NoWallet) => Ok(()),
            other => Ok(other?),
        }
    }

    /// Initializes, then requests accounts and switches network if needed.
    pub async fn connect(&mut self) -> Result<()> {
        self.initialize().await?;
        self.manager.connect().await?;
        Ok(())
    }

    /// Ledger bound to the active network.
    pub async fn ledger(&self) -> Result<Arc<dyn ConfidentialLedger>> {
        match &self.backend {
            Backend::Mocked { ledger, .. } => Ok(ledger.clone()),
            Backend::Rpc { wallet } => Ok(Arc::new(AlloyLedger::new(wallet.provider().await, wallet.address()))),
            Backend::Missing => Err(anyhow!("No wallet has been found")),
        }
    }

    /// Controller for the ready session, with the contract address loaded
    /// and the encrypted balance read.
    pub async fn controller(&self) -> Result<BalanceController> {
        let session = match self.manager.view() {
            ConnectionView::Ready(session) => session,
            ConnectionView::NoWallet => return Err(anyhow!("No wallet has been found")),
            ConnectionView::Hidden => return Err(anyhow!("no account is connected")),
            ConnectionView::WrongNetwork { network } => return Err(anyhow!("wallet is not on {network}")),
            ConnectionView::Loading => return Err(anyhow!("encryption engine is still loading")),
        };

        let mut controller = BalanceController::new(self.mode(), session, self.ledger().await?);
        controller.load_contract_address(self.deployment.as_ref());
        controller.refresh_encrypted_balance().await?;
        Ok(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: AppConfig,
    }

    fn mocked_config(args: &[&str]) -> AppConfig {
        let mut argv = vec!["cerc20", "--mocked"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).config
    }

    #[tokio::test]
    async fn test_mocked_app_reaches_ready_and_reads_supply() {
        let mut app = App::build(&mocked_config(&[])).await.unwrap();
        app.connect().await.unwrap();

        let mut controller = app.controller().await.unwrap();
        assert_eq!(controller.contract_address(), MOCK_TOKEN_ADDRESS);
        controller.decrypt().await.unwrap();
        assert_eq!(controller.decrypted_balance().to_string(), MOCK_INITIAL_SUPPLY.to_string());
    }

    #[tokio::test]
    async fn test_mocked_wallet_on_other_chain_is_switched() {
        let mut app = App::build(&mocked_config(&["--chain-id", "0xaa36a7"])).await.unwrap();
        app.connect().await.unwrap();
        assert!(app.manager().session().is_some());
    }

    #[tokio::test]
    async fn test_missing_wallet_is_rendered_not_returned() {
        let mut app = App {
            manager: ConnectionManager::new(
                BuildMode::Production,
                EngineHandle::new(Arc::new(MockEngineFactory::default())),
            ),
            backend: Backend::Missing,
            deployment: Box::new(FixedDeployment {
                mode: BuildMode::Production,
                address: MOCK_TOKEN_ADDRESS,
            }),
        };

        app.detect().await.unwrap();
        assert!(matches!(app.manager().view(), ConnectionView::NoWallet));
        assert!(!app.manager().state().has_provider);
        assert!(app.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_controller_requires_ready_connection() {
        let mut app = App::build(&mocked_config(&[])).await.unwrap();
        app.initialize().await.unwrap();
        assert!(app.controller().await.is_err());
    }
}
