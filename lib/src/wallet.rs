//! Wallet provider interface
//!
//! The browser-injected wallet is an external collaborator. This module fixes
//! the calls the client makes on it and the two notifications it listens to.
//! Notifications are delivered through [`Subscription`] handles; dropping a
//! handle deregisters its listener.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use alloy::primitives::Address;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Signer handed out by the wallet for reencryption requests and transactions.
pub type WalletSigner = Arc<dyn alloy::signers::Signer + Send + Sync>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("the user rejected the request")]
    Rejected,

    #[error("chain {0} is not configured in the wallet")]
    UnrecognizedChain(String),

    #[error("no account is authorized")]
    NoAccount,

    #[error("wallet request failed: {0}")]
    Request(String),
}

/// Notifications emitted by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The full, ordered list of accounts now exposed to the client.
    AccountsChanged(Vec<Address>),
    /// The active network changed. The new id must be queried again.
    ChainChanged,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Active chain identifier as reported by the wallet (`0x`-prefixed hex).
    async fn chain_id(&self) -> Result<String, WalletError>;

    /// Accounts already authorized for this client. Never prompts.
    async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Asks the user to authorize accounts. May prompt.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Asks the wallet to change its active network.
    async fn switch_chain(&self, chain_id: &str) -> Result<(), WalletError>;

    /// Signer for the currently selected account.
    async fn signer(&self) -> Result<WalletSigner, WalletError>;

    /// Registers a listener for [`ProviderEvent`]s.
    fn subscribe(&self) -> Subscription;
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<ProviderEvent>>,
}

fn lock(inner: &Mutex<HubInner>) -> MutexGuard<'_, HubInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Listener registry embedded by wallet implementations.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<Mutex<HubInner>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, events) = mpsc::unbounded_channel();
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, sender);

        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
            events,
        }
    }

    /// Delivers an event to every live listener.
    pub fn emit(&self, event: ProviderEvent) {
        let mut inner = lock(&self.inner);
        inner
            .listeners
            .retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

/// A registered listener. Deregisters itself when dropped.
pub struct Subscription {
    id: u64,
    hub: Weak<Mutex<HubInner>>,
    events: mpsc::UnboundedReceiver<ProviderEvent>,
}

impl Subscription {
    /// Waits for the next event. `None` once the wallet is gone.
    pub async fn recv(&mut self) -> Option<ProviderEvent> {
        self.events.recv().await
    }

    /// Next already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<ProviderEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            lock(&inner).listeners.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
