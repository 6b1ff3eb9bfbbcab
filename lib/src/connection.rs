//! Connection manager
//!
//! Owns the wallet, account and network state and decides when the rest of
//! the client may run: an account must be connected, the wallet must be on the
//! authorized network and the encryption engine must be initialized.
//!
//! ```text
//! Disconnected -> WrongNetwork -> EngineLoading -> Ready
//! ```
//!
//! Any account or chain notification can move the machine back to an earlier
//! phase.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::BuildMode;
use crate::encoding::short_address;
use crate::engine::{EncryptionEngine, EngineHandle};
use crate::error::{Error, Result};
use crate::wallet::{ProviderEvent, Subscription, WalletProvider};

/// Errors that put the connection into a terminal display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    NoWallet,
}

/// Snapshot of the connection, published to observers on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub account: Option<Address>,
    pub has_provider: bool,
    pub connected: bool,
    pub valid_network: bool,
    pub engine_ready: bool,
    pub error: Option<ConnectionErrorKind>,
    /// Last non-fatal message, e.g. a refused network switch.
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    WrongNetwork,
    EngineLoading,
    Ready,
}

/// Everything the balance controller needs from a ready connection.
#[derive(Clone)]
pub struct Session {
    pub account: Address,
    pub provider: Arc<dyn WalletProvider>,
    pub engine: Arc<dyn EncryptionEngine>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("account", &self.account).finish()
    }
}

/// What the presentation should render.
#[derive(Debug, Clone)]
pub enum ConnectionView {
    NoWallet,
    /// Nothing to render below the connect control.
    Hidden,
    WrongNetwork { network: &'static str },
    Loading,
    Ready(Session),
}

pub struct ConnectionManager {
    mode: BuildMode,
    provider: Option<Arc<dyn WalletProvider>>,
    engine: EngineHandle,
    instance: Option<Arc<dyn EncryptionEngine>>,
    subscription: Option<Subscription>,
    state: ConnectionState,
    updates: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(mode: BuildMode, engine: EngineHandle) -> Self {
        let (updates, _) = watch::channel(ConnectionState::default());
        Self {
            mode,
            provider: None,
            engine,
            instance: None,
            subscription: None,
            state: ConnectionState::default(),
            updates,
        }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Receiver of every published state snapshot.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.state.clone());
    }

    /// Attaches the detected wallet, if any, and adopts an already
    /// authorized account without prompting.
    pub async fn initialize(&mut self, provider: Option<Arc<dyn WalletProvider>>) -> Result<()> {
        let Some(provider) = provider else {
            error!("No wallet has been found");
            self.state.error = Some(ConnectionErrorKind::NoWallet);
            self.publish();
            return Err(Error::NoWallet);
        };

        if self.subscription.is_none() {
            self.subscription = Some(provider.subscribe());
        }
        self.provider = Some(provider.clone());
        self.state.has_provider = true;
        self.publish();

        let accounts = match provider.accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                debug!("could not list authorized accounts: {e}");
                return Ok(());
            }
        };

        if !accounts.is_empty() {
            self.apply_accounts(&accounts);
            self.revalidate_network().await?;
        }
        Ok(())
    }

    /// User-initiated connection. May prompt the wallet.
    pub async fn connect(&mut self) -> Result<()> {
        let Some(provider) = self.provider.clone() else {
            return Ok(());
        };

        let accounts = provider.request_accounts().await?;
        if accounts.is_empty() {
            return Ok(());
        }

        self.apply_accounts(&accounts);
        if !self.has_valid_network(provider.as_ref()).await? {
            self.switch_network().await;
        }
        self.revalidate_network().await?;
        Ok(())
    }

    /// Asks the wallet to move to the authorized network. Failures are
    /// reported through [`ConnectionState::notice`] only.
    pub async fn switch_network(&mut self) {
        let Some(provider) = self.provider.clone() else {
            return;
        };

        let target = self.mode.authorized_chain_id();
        match provider.switch_chain(target).await {
            Ok(()) => {
                info!(chain_id = target, "wallet switched network");
                self.state.notice = None;
            }
            Err(e) => {
                let message = format!("No {} chain configured", self.mode.network_name());
                error!("{message}: {e}");
                self.state.notice = Some(message);
            }
        }
        self.publish();
    }

    async fn has_valid_network(&self, provider: &dyn WalletProvider) -> Result<bool> {
        let chain_id = provider.chain_id().await?;
        Ok(self.mode.accepts_chain(&chain_id))
    }

    /// Re-reads the active chain and, when it is the authorized one,
    /// initializes the encryption engine.
    ///
    /// Returns whether the network is valid.
    pub async fn revalidate_network(&mut self) -> Result<bool> {
        let Some(provider) = self.provider.clone() else {
            return Ok(false);
        };

        let chain_id = match provider.chain_id().await {
            Ok(id) => id,
            Err(e) => {
                self.mark_invalid_network();
                return Err(e.into());
            }
        };

        if !self.mode.accepts_chain(&chain_id) {
            warn!(%chain_id, expected = self.mode.authorized_chain_id(), "wallet is on the wrong network");
            self.mark_invalid_network();
            return Ok(false);
        }

        self.state.valid_network = true;
        self.state.engine_ready = false;
        self.publish();

        // Observers get to render the loading state before initialization.
        tokio::task::yield_now().await;

        match self.engine.get_or_init(&chain_id).await {
            Ok(instance) => {
                self.instance = Some(instance);
                self.state.engine_ready = true;
                self.publish();
                Ok(true)
            }
            Err(e) => {
                error!("encryption engine initialization failed: {e}");
                self.instance = None;
                self.state.notice = Some(e.to_string());
                self.publish();
                Err(e.into())
            }
        }
    }

    fn mark_invalid_network(&mut self) {
        self.state.valid_network = false;
        self.state.engine_ready = false;
        self.instance = None;
        self.publish();
    }

    /// Replaces the account list wholesale.
    fn apply_accounts(&mut self, accounts: &[Address]) {
        self.state.account = accounts.first().copied();
        self.state.connected = !accounts.is_empty();
        match self.state.account {
            Some(account) => info!(account = %account, "account selected"),
            None => info!("wallet disconnected"),
        }
        self.publish();
    }

    pub async fn handle_event(&mut self, event: ProviderEvent) -> Result<()> {
        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                self.apply_accounts(&accounts);
                Ok(())
            }
            ProviderEvent::ChainChanged => self.revalidate_network().await.map(|_| ()),
        }
    }

    /// Waits for and applies the next wallet notification.
    ///
    /// `None` when there is no subscription or the wallet went away.
    pub async fn next_event(&mut self) -> Option<Result<()>> {
        let event = self.subscription.as_mut()?.recv().await?;
        Some(self.handle_event(event).await)
    }

    /// Applies every notification already delivered. Returns how many were
    /// applied.
    pub async fn drain_events(&mut self) -> Result<usize> {
        let mut applied = 0;
        loop {
            let Some(event) = self.subscription.as_mut().and_then(Subscription::try_recv) else {
                return Ok(applied);
            };
            self.handle_event(event).await?;
            applied += 1;
        }
    }

    /// Deregisters the wallet listener.
    pub fn shutdown(&mut self) {
        if self.subscription.take().is_some() {
            debug!("wallet listener removed");
        }
    }

    pub fn phase(&self) -> Phase {
        if !self.state.connected {
            Phase::Disconnected
        } else if !self.state.valid_network {
            Phase::WrongNetwork
        } else if !self.state.engine_ready {
            Phase::EngineLoading
        } else {
            Phase::Ready
        }
    }

    pub fn view(&self) -> ConnectionView {
        if self.state.error == Some(ConnectionErrorKind::NoWallet) {
            return ConnectionView::NoWallet;
        }
        let (Some(account), Some(provider)) = (self.state.account, self.provider.clone()) else {
            return ConnectionView::Hidden;
        };
        if !self.state.valid_network {
            return ConnectionView::WrongNetwork {
                network: self.mode.network_name(),
            };
        }
        match (&self.instance, self.state.engine_ready) {
            (Some(engine), true) => ConnectionView::Ready(Session {
                account,
                provider,
                engine: engine.clone(),
            }),
            _ => ConnectionView::Loading,
        }
    }

    /// The ready session, if the machine is in [`Phase::Ready`].
    pub fn session(&self) -> Option<Session> {
        match self.view() {
            ConnectionView::Ready(session) => Some(session),
            _ => None,
        }
    }

    /// "Connected with 0x1234...abcd" style label.
    pub fn account_label(&self) -> Option<String> {
        self.state.account.as_ref().map(short_address)
    }

    pub fn switch_prompt(&self) -> String {
        format!("Switch to {}", self.mode.network_name())
    }
}
