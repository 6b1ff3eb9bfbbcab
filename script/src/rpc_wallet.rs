//! Wallet provider backed by a local private key and JSON-RPC endpoints
//!
//! Stands in for the browser wallet: it knows one key, a set of networks it
//! has an endpoint for, and which of them is active. Switching to a network
//! without an endpoint fails the way an unconfigured chain does in a browser
//! wallet.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use cerc20_lib::wallet::{EventHub, ProviderEvent, Subscription, WalletError, WalletProvider, WalletSigner};
use tokio::sync::Mutex;
use tracing::{debug, info};

struct ActiveNetwork {
    chain_id: String,
    provider: DynProvider,
}

pub struct RpcWallet {
    signer: PrivateKeySigner,
    rpc_urls: HashMap<String, String>,
    active: Mutex<ActiveNetwork>,
    authorized: AtomicBool,
    hub: EventHub,
}

async fn connect(signer: &PrivateKeySigner, url: &str) -> Result<DynProvider, WalletError> {
    let provider = ProviderBuilder::new()
        .wallet(signer.clone())
        .connect(url)
        .await
        .map_err(|e| WalletError::Request(format!("cannot reach {url}: {e}")))?;
    Ok(provider.erased())
}

impl RpcWallet {
    /// Connects to the endpoint of `chain_id`.
    pub async fn connect(
        signer: PrivateKeySigner,
        rpc_urls: HashMap<String, String>,
        chain_id: &str,
    ) -> Result<Self, WalletError> {
        let chain_id = chain_id.to_ascii_lowercase();
        let url = rpc_urls
            .get(&chain_id)
            .ok_or_else(|| WalletError::UnrecognizedChain(chain_id.clone()))?;
        let provider = connect(&signer, url).await?;
        info!(%chain_id, account = %signer.address(), "wallet connected to {url}");

        Ok(Self {
            signer,
            rpc_urls,
            active: Mutex::new(ActiveNetwork { chain_id, provider }),
            authorized: AtomicBool::new(false),
            hub: EventHub::new(),
        })
    }

    /// Marks the key as already authorized for this client.
    pub fn authorize(&self) {
        self.authorized.store(true, Ordering::SeqCst);
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Provider of the active network, signing with the wallet key.
    pub async fn provider(&self) -> DynProvider {
        self.active.lock().await.provider.clone()
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn chain_id(&self) -> Result<String, WalletError> {
        let provider = self.provider().await;
        let id = provider
            .get_chain_id()
            .await
            .map_err(|e| WalletError::Request(e.to_string()))?;
        Ok(format!("{id:#x}"))
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        if self.authorized.load(Ordering::SeqCst) {
            Ok(vec![self.signer.address()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.authorize();
        let accounts = vec![self.signer.address()];
        self.hub.emit(ProviderEvent::AccountsChanged(accounts.clone()));
        Ok(accounts)
    }

    async fn switch_chain(&self, chain_id: &str) -> Result<(), WalletError> {
        let chain_id = chain_id.to_ascii_lowercase();
        let url = self
            .rpc_urls
            .get(&chain_id)
            .ok_or_else(|| WalletError::UnrecognizedChain(chain_id.clone()))?;

        let provider = connect(&self.signer, url).await?;
        {
            let mut active = self.active.lock().await;
            debug!(from = %active.chain_id, to = %chain_id, "switching network");
            *active = ActiveNetwork { chain_id, provider };
        }
        self.hub.emit(ProviderEvent::ChainChanged);
        Ok(())
    }

    async fn signer(&self) -> Result<WalletSigner, WalletError> {
        if !self.authorized.load(Ordering::SeqCst) {
            return Err(WalletError::NoAccount);
        }
        Ok(Arc::new(self.signer.clone()))
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }
}
