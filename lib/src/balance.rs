//! Encrypted balance controller
//!
//! Reads the caller's encrypted balance handle, decrypts it on request,
//! encrypts an amount and transfers it to a confirmed recipient, and drives
//! the secret reveal of the token contract.
//!
//! Every operation is a no-op while the contract address is still the zero
//! sentinel, i.e. when no deployment could be resolved.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, TxHash, U256};
use tracing::{debug, error, info};

use crate::config::{BuildMode, DeploymentSource};
use crate::connection::Session;
use crate::encoding::to_hex_string;
use crate::engine::{EncryptedAmount, EncryptedInput, EngineError};
use crate::error::{Error, Result};
use crate::ledger::{ConfidentialLedger, TransferArgs};

/// Rendered in place of a value that is not known yet.
pub const PLACEHOLDER: &str = "???";

/// Rendered in place of a recipient that is not confirmed.
pub const NO_RECIPIENT: &str = "0x";

/// Message set when a recipient fails validation.
pub const INVALID_ADDRESS_MESSAGE: &str = "Invalid Ethereum address.";

/// Clear balance, known only after an explicit decryption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecryptedBalance {
    #[default]
    Unknown,
    Known(u64),
}

impl fmt::Display for DecryptedBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecryptedBalance::Unknown => f.write_str(PLACEHOLDER),
            DecryptedBalance::Known(value) => write!(f, "{value}"),
        }
    }
}

/// Secret published by the contract. The contract reports `0` until the
/// reveal completes, so a secret of zero reads as pending forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RevealedSecret {
    #[default]
    Pending,
    Revealed(u64),
}

impl RevealedSecret {
    pub fn from_onchain(value: u64) -> Self {
        match value {
            0 => RevealedSecret::Pending,
            n => RevealedSecret::Revealed(n),
        }
    }
}

impl fmt::Display for RevealedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevealedSecret::Pending => f.write_str(PLACEHOLDER),
            RevealedSecret::Revealed(value) => write!(f, "{value}"),
        }
    }
}

pub struct BalanceController {
    mode: BuildMode,
    session: Session,
    ledger: Arc<dyn ConfidentialLedger>,
    contract: Address,
    encrypted_handle: U256,
    decrypted: DecryptedBalance,
    chosen_amount: String,
    encrypted: Option<EncryptedAmount>,
    chosen_address: Option<Address>,
    error_message: Option<String>,
    secret_requested: bool,
    secret: RevealedSecret,
}

impl BalanceController {
    pub fn new(mode: BuildMode, session: Session, ledger: Arc<dyn ConfidentialLedger>) -> Self {
        Self {
            mode,
            session,
            ledger,
            contract: Address::ZERO,
            encrypted_handle: U256::ZERO,
            decrypted: DecryptedBalance::Unknown,
            chosen_amount: "0".to_string(),
            encrypted: None,
            chosen_address: None,
            error_message: None,
            secret_requested: false,
            secret: RevealedSecret::Pending,
        }
    }

    pub fn account(&self) -> Address {
        self.session.account
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    fn is_deployed(&self) -> bool {
        self.contract != Address::ZERO
    }

    /// Resolves the token address for the build mode. On failure the address
    /// stays at the zero sentinel.
    ///
    /// Returns whether an address was loaded.
    pub fn load_contract_address(&mut self, source: &dyn DeploymentSource) -> bool {
        match source.contract_address(self.mode) {
            Ok(address) => {
                info!(
                    "Using {address} for the token address on {}",
                    self.mode.network_name()
                );
                self.contract = address;
                true
            }
            Err(e) => {
                error!(
                    "Error loading data - you probably forgot to deploy the token contract \
                     before running the client: {e}"
                );
                false
            }
        }
    }

    /// Adopts a new ready session. The balance is re-read when the account
    /// changed; an amount encrypted for the previous account can no longer be
    /// transferred.
    pub async fn set_session(&mut self, session: Session) -> Result<()> {
        let changed = session.account != self.session.account;
        self.session = session;
        if changed {
            self.refresh_encrypted_balance().await?;
        }
        Ok(())
    }

    /// Re-reads the encrypted balance handle and forgets the decrypted value.
    pub async fn refresh_encrypted_balance(&mut self) -> Result<()> {
        if !self.is_deployed() {
            return Ok(());
        }
        let handle = self
            .ledger
            .balance_of(self.contract, self.session.account)
            .await?;
        debug!(%handle, "encrypted balance handle");
        self.encrypted_handle = handle;
        self.decrypted = DecryptedBalance::Unknown;
        Ok(())
    }

    /// Stores the amount as entered. Parsing happens at encryption time.
    pub fn confirm_transfer_amount(&mut self, raw: &str) {
        self.chosen_amount = raw.to_string();
    }

    /// Encrypts the confirmed amount.
    pub async fn encrypt_chosen_amount(&mut self) -> Result<()> {
        let amount = u64::from_str(self.chosen_amount.trim())
            .map_err(|_| Error::InvalidAmount(self.chosen_amount.clone()))?;
        self.encrypt(amount).await
    }

    /// Encrypts `amount` for the token contract and the connected account.
    ///
    /// A failure is logged with the elapsed time and returned to the caller;
    /// the previous encryption is kept.
    pub async fn encrypt(&mut self, amount: u64) -> Result<()> {
        if !self.is_deployed() {
            return Ok(());
        }
        let input = EncryptedInput::new(self.contract, self.session.account).add64(amount);

        let started = Instant::now();
        match self.session.engine.encrypt(input).await {
            Ok(encrypted) => {
                info!("Took {:.3}s", started.elapsed().as_secs_f64());
                self.encrypted = Some(encrypted);
                Ok(())
            }
            Err(e) => {
                error!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Encryption error: {e}"
                );
                Err(e.into())
            }
        }
    }

    /// Decrypts the current balance handle with a signature from the wallet.
    ///
    /// A handle never set on-chain decrypts to zero. Any other failure leaves
    /// the decrypted value as it was.
    pub async fn decrypt(&mut self) -> Result<()> {
        if !self.is_deployed() {
            return Ok(());
        }
        let signer = self.session.provider.signer().await?;

        let started = Instant::now();
        let result = self
            .session
            .engine
            .reencrypt(&signer, self.encrypted_handle, self.contract)
            .await;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "reencryption finished");

        match result {
            Ok(value) => {
                self.decrypted = DecryptedBalance::Known(value);
                Ok(())
            }
            Err(EngineError::HandleNotInitialized) => {
                self.decrypted = DecryptedBalance::Known(0);
                Ok(())
            }
            Err(e) => {
                error!("reencryption failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Validates and stores the recipient. Input is trimmed and lowercased
    /// before parsing, and stored checksummed.
    pub fn confirm_transfer_address(&mut self, raw: &str) -> Result<Address> {
        let normalized = raw.trim().to_lowercase();
        match Address::from_str(&normalized) {
            Ok(address) => {
                self.chosen_address = Some(address);
                self.error_message = None;
                Ok(address)
            }
            Err(e) => {
                debug!("rejected recipient {raw:?}: {e}");
                self.chosen_address = None;
                self.error_message = Some(INVALID_ADDRESS_MESSAGE.to_string());
                Err(Error::InvalidAddress)
            }
        }
    }

    /// Sends the encrypted amount to the confirmed recipient, then re-reads
    /// the balance handle.
    ///
    /// `None` when the contract is not deployed.
    pub async fn transfer(&mut self) -> Result<Option<TxHash>> {
        if !self.is_deployed() {
            return Ok(None);
        }
        let (Some(recipient), Some(encrypted)) = (self.chosen_address, self.encrypted.as_ref()) else {
            return Err(Error::TransferNotReady);
        };
        let Some(handle) = encrypted.first_handle().filter(|_| encrypted.is_submittable()) else {
            return Err(Error::TransferNotReady);
        };
        if !encrypted.is_bound_to(self.contract, self.session.account) {
            return Err(Error::StaleEncryption);
        }

        let args = TransferArgs {
            recipient,
            handle: to_hex_string(handle.as_slice()),
            proof: to_hex_string(&encrypted.proof),
        };
        let signer = self.session.provider.signer().await?;
        let tx = self.ledger.transfer(self.contract, &signer, &args).await?;
        info!(%tx, %recipient, "encrypted transfer confirmed");

        self.encrypted = None;
        self.refresh_encrypted_balance().await?;
        Ok(Some(tx))
    }

    /// Asks the contract to reveal its secret. Can be done once per session.
    pub async fn request_secret_reveal(&mut self) -> Result<Option<TxHash>> {
        if !self.is_deployed() || !self.can_request_reveal() {
            return Ok(None);
        }
        let signer = self.session.provider.signer().await?;
        let tx = self.ledger.request_secret(self.contract, &signer).await?;
        self.secret_requested = true;
        Ok(Some(tx))
    }

    /// Reads the revealed secret. Once revealed, further polls return the
    /// stored value without calling the contract.
    pub async fn poll_revealed_secret(&mut self) -> Result<RevealedSecret> {
        if !self.is_deployed() || !self.can_refresh_secret() {
            return Ok(self.secret);
        }
        let value = self.ledger.revealed_secret(self.contract).await?;
        self.secret = RevealedSecret::from_onchain(value);
        if let RevealedSecret::Revealed(secret) = self.secret {
            info!(secret, "secret revealed");
        }
        Ok(self.secret)
    }

    /// Transfer is offered once a recipient and a proof are present.
    pub fn can_transfer(&self) -> bool {
        self.chosen_address.is_some()
            && self
                .encrypted
                .as_ref()
                .is_some_and(EncryptedAmount::is_submittable)
    }

    pub fn can_request_reveal(&self) -> bool {
        !self.secret_requested && self.secret == RevealedSecret::Pending
    }

    pub fn can_refresh_secret(&self) -> bool {
        self.secret == RevealedSecret::Pending
    }

    /// Balance handle as a decimal integer.
    pub fn encrypted_balance_display(&self) -> String {
        self.encrypted_handle.to_string()
    }

    pub fn encrypted_handle(&self) -> U256 {
        self.encrypted_handle
    }

    pub fn decrypted_balance(&self) -> DecryptedBalance {
        self.decrypted
    }

    pub fn chosen_amount(&self) -> &str {
        &self.chosen_amount
    }

    pub fn chosen_address(&self) -> Option<Address> {
        self.chosen_address
    }

    /// Checksummed recipient, or `"0x"` when none is confirmed.
    pub fn chosen_address_display(&self) -> String {
        self.chosen_address
            .map(|a| a.to_checksum(None))
            .unwrap_or_else(|| NO_RECIPIENT.to_string())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn encrypted_amount(&self) -> Option<&EncryptedAmount> {
        self.encrypted.as_ref()
    }

    pub fn handle_hex(&self) -> Option<String> {
        self.encrypted
            .as_ref()
            .and_then(EncryptedAmount::first_handle)
            .map(|h| to_hex_string(h.as_slice()))
    }

    pub fn proof_hex(&self) -> Option<String> {
        self.encrypted.as_ref().map(|e| to_hex_string(&e.proof))
    }

    pub fn secret(&self) -> RevealedSecret {
        self.secret
    }

    pub fn secret_requested(&self) -> bool {
        self.secret_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixedDeployment;
    use crate::engine::EngineFactory;
    use crate::mock::{dev_signer, CiphertextDb, MockEngineFactory, MockLedger, MockWallet};

    const CONTRACT: Address = alloy::primitives::address!("7777777777777777777777777777777777777777");

    struct Fixture {
        controller: BalanceController,
        ledger: Arc<MockLedger>,
        factory: MockEngineFactory,
    }

    async fn fixture() -> Fixture {
        let signer = dev_signer(0).unwrap();
        let account = signer.address();
        let wallet = Arc::new(MockWallet::new("0x7a69").with_signer(signer));
        wallet.authorize();

        let db = CiphertextDb::new();
        let factory = MockEngineFactory::new(db.clone());
        let engine = factory.create_instance("0x7a69").await.unwrap();
        let ledger = Arc::new(MockLedger::new(db, CONTRACT, 31337).with_secret(9, 1));

        let session = Session {
            account,
            provider: wallet,
            engine,
        };
        let mut controller = BalanceController::new(BuildMode::Mocked, session, ledger.clone());
        let deployment = FixedDeployment {
            mode: BuildMode::Mocked,
            address: CONTRACT,
        };
        assert!(controller.load_contract_address(&deployment));
        Fixture {
            controller,
            ledger,
            factory,
        }
    }

    #[tokio::test]
    async fn test_missing_deployment_keeps_sentinel_and_noops() {
        let Fixture {
            mut controller,
            ledger,
            ..
        } = fixture().await;
        controller.contract = Address::ZERO;
        let production_only = FixedDeployment {
            mode: BuildMode::Production,
            address: CONTRACT,
        };
        assert!(!controller.load_contract_address(&production_only));
        assert_eq!(controller.contract_address(), Address::ZERO);

        controller.refresh_encrypted_balance().await.unwrap();
        controller.encrypt(5).await.unwrap();
        controller.confirm_transfer_address(&Address::repeat_byte(1).to_string()).unwrap();
        assert_eq!(controller.transfer().await.unwrap(), None);
        assert_eq!(controller.request_secret_reveal().await.unwrap(), None);

        assert!(controller.encrypted_amount().is_none());
        assert_eq!(ledger.calls(), Default::default());
    }

    #[tokio::test]
    async fn test_refresh_resets_decrypted_value() {
        let Fixture {
            mut controller,
            ledger,
            ..
        } = fixture().await;
        ledger.mint(controller.account(), 50);

        controller.refresh_encrypted_balance().await.unwrap();
        assert_ne!(controller.encrypted_handle(), U256::ZERO);
        controller.decrypt().await.unwrap();
        assert_eq!(controller.decrypted_balance(), DecryptedBalance::Known(50));

        controller.refresh_encrypted_balance().await.unwrap();
        assert_eq!(controller.decrypted_balance(), DecryptedBalance::Unknown);
        assert_eq!(controller.decrypted_balance().to_string(), "???");
    }

    #[tokio::test]
    async fn test_uninitialized_handle_decrypts_to_zero() {
        let Fixture { mut controller, .. } = fixture().await;
        controller.refresh_encrypted_balance().await.unwrap();
        assert_eq!(controller.encrypted_balance_display(), "0");

        controller.decrypt().await.unwrap();
        assert_eq!(controller.decrypted_balance().to_string(), "0");
    }

    #[tokio::test]
    async fn test_other_decrypt_failures_propagate() {
        let Fixture {
            mut controller,
            ledger,
            ..
        } = fixture().await;
        ledger.set_balance_handle(controller.account(), alloy::primitives::B256::repeat_byte(0x42));
        controller.refresh_encrypted_balance().await.unwrap();

        let err = controller.decrypt().await.unwrap_err();
        assert!(matches!(err, Error::Engine(EngineError::Reencryption(_))));
        assert_eq!(controller.decrypted_balance(), DecryptedBalance::Unknown);
    }

    #[tokio::test]
    async fn test_failed_encryption_keeps_previous_result() {
        let Fixture {
            mut controller,
            factory,
            ..
        } = fixture().await;
        controller.encrypt(42).await.unwrap();
        let previous = controller.encrypted_amount().cloned().unwrap();

        factory.set_encryption_failure(true);
        assert!(controller.encrypt(7).await.is_err());
        assert_eq!(controller.encrypted_amount(), Some(&previous));
    }

    #[tokio::test]
    async fn test_chosen_amount_is_parsed_at_encryption() {
        let Fixture { mut controller, .. } = fixture().await;
        assert_eq!(controller.chosen_amount(), "0");

        controller.confirm_transfer_amount("12");
        controller.encrypt_chosen_amount().await.unwrap();
        assert!(controller.handle_hex().unwrap().starts_with("0x"));

        controller.confirm_transfer_amount("-3");
        assert!(matches!(
            controller.encrypt_chosen_amount().await,
            Err(Error::InvalidAmount(raw)) if raw == "-3"
        ));
    }

    #[tokio::test]
    async fn test_address_validation() {
        let Fixture { mut controller, .. } = fixture().await;
        assert_eq!(controller.chosen_address_display(), "0x");

        let accepted = controller
            .confirm_transfer_address("  0x5FBDB2315678AFECB367F032D93F642F64180AA3 ")
            .unwrap();
        assert_eq!(
            controller.chosen_address_display(),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        );
        assert_eq!(controller.chosen_address(), Some(accepted));
        assert!(controller.error_message().is_none());

        assert!(controller.confirm_transfer_address("0x1234").is_err());
        assert_eq!(controller.chosen_address_display(), "0x");
        assert_eq!(controller.error_message(), Some("Invalid Ethereum address."));
    }

    #[tokio::test]
    async fn test_transfer_requires_recipient_and_proof() {
        let Fixture { mut controller, .. } = fixture().await;
        assert!(!controller.can_transfer());
        assert!(matches!(controller.transfer().await, Err(Error::TransferNotReady)));

        controller.encrypt(1).await.unwrap();
        assert!(!controller.can_transfer());
        controller.confirm_transfer_address(&Address::repeat_byte(0xbb).to_string()).unwrap();
        assert!(controller.can_transfer());
    }

    #[tokio::test]
    async fn test_transfer_rejects_amount_for_other_account() {
        let Fixture {
            mut controller,
            ledger,
            ..
        } = fixture().await;
        controller.encrypt(1).await.unwrap();
        controller.confirm_transfer_address(&Address::repeat_byte(0xbb).to_string()).unwrap();

        let mut session = controller.session.clone();
        session.account = dev_signer(1).unwrap().address();
        controller.set_session(session).await.unwrap();

        assert!(matches!(controller.transfer().await, Err(Error::StaleEncryption)));
        assert!(ledger.calls().transfers.is_empty());
    }

    #[tokio::test]
    async fn test_failed_transfer_keeps_balance_view() {
        let Fixture {
            mut controller,
            ledger,
            ..
        } = fixture().await;
        ledger.mint(controller.account(), 10);
        controller.refresh_encrypted_balance().await.unwrap();
        let handle = controller.encrypted_handle();

        controller.encrypt(3).await.unwrap();
        controller.confirm_transfer_address(&Address::repeat_byte(0xbb).to_string()).unwrap();
        ledger.fail_next_transfer();

        assert!(matches!(controller.transfer().await, Err(Error::Ledger(_))));
        assert_eq!(controller.encrypted_handle(), handle);
        assert!(controller.can_transfer());
    }

    #[tokio::test]
    async fn test_secret_reveal_flow() {
        let Fixture {
            mut controller,
            ledger,
            ..
        } = fixture().await;
        assert!(controller.can_request_reveal());
        assert_eq!(controller.poll_revealed_secret().await.unwrap(), RevealedSecret::Pending);

        assert!(controller.request_secret_reveal().await.unwrap().is_some());
        assert!(!controller.can_request_reveal());
        assert!(controller.request_secret_reveal().await.unwrap().is_none());
        assert_eq!(ledger.calls().secret_requests, 1);

        assert_eq!(controller.poll_revealed_secret().await.unwrap().to_string(), "???");
        assert!(controller.can_refresh_secret());
        assert_eq!(controller.poll_revealed_secret().await.unwrap(), RevealedSecret::Revealed(9));
        assert!(!controller.can_refresh_secret());

        let polls = ledger.calls().secret_polls;
        controller.poll_revealed_secret().await.unwrap();
        assert_eq!(ledger.calls().secret_polls, polls);
    }
}
