//! In-process collaborators for the mocked build
//!
//! A wallet with local dev keys, an encryption engine that keeps clear values
//! in a shared [`CiphertextDb`] instead of encrypting them, and a token ledger
//! that evaluates transfers over that db. Handles follow the on-chain layout:
//! 21 bytes of digest, the input index, the chain id, the type tag and a
//! version byte.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{keccak256, Address, Bytes, TxHash, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::debug;

use crate::engine::{EncryptedAmount, EncryptedInput, EncryptionEngine, EngineError, EngineFactory};
use crate::ledger::{ConfidentialLedger, LedgerError, TransferArgs};
use crate::wallet::{EventHub, ProviderEvent, Subscription, WalletError, WalletProvider, WalletSigner};

/// Well-known Hardhat development keys (accounts #0 and #1).
pub const HARDHAT_DEV_KEYS: [&str; 2] = [
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
];

/// Type tag of a 64-bit ciphertext.
const EUINT64_TAG: u8 = 5;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Parses a `0x`-prefixed hex chain id.
pub fn parse_chain_id(chain_id: &str) -> Option<u64> {
    let digits = chain_id.trim().trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16).ok()
}

/// Signer for one of the [`HARDHAT_DEV_KEYS`].
pub fn dev_signer(index: usize) -> Result<PrivateKeySigner, WalletError> {
    let key = HARDHAT_DEV_KEYS
        .get(index)
        .ok_or_else(|| WalletError::Request(format!("no dev key #{index}")))?;
    key.parse()
        .map_err(|e| WalletError::Request(format!("dev key #{index}: {e}")))
}

fn layout_handle(digest: B256, index: u8, chain_id: u64, type_tag: u8) -> B256 {
    let mut handle = [0u8; 32];
    handle[..21].copy_from_slice(&digest[..21]);
    handle[21] = index;
    handle[22..30].copy_from_slice(&chain_id.to_be_bytes());
    handle[30] = type_tag;
    B256::from(handle)
}

#[derive(Debug)]
struct StoredCiphertext {
    value: u64,
    allowed: HashSet<Address>,
}

#[derive(Debug, Default)]
struct DbInner {
    values: HashMap<B256, StoredCiphertext>,
    counter: u64,
}

/// Clear values behind mock handles, with per-handle access lists.
#[derive(Debug, Clone, Default)]
pub struct CiphertextDb {
    inner: Arc<Mutex<DbInner>>,
}

impl CiphertextDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under a fresh handle readable by `allowed`.
    pub fn insert(&self, value: u64, index: u8, chain_id: u64, type_tag: u8, allowed: &[Address]) -> B256 {
        let mut inner = lock(&self.inner);
        inner.counter += 1;

        let mut seed = Vec::with_capacity(16);
        seed.extend_from_slice(&inner.counter.to_be_bytes());
        seed.extend_from_slice(&value.to_be_bytes());
        let handle = layout_handle(keccak256(&seed), index, chain_id, type_tag);

        inner.values.insert(
            handle,
            StoredCiphertext {
                value,
                allowed: allowed.iter().copied().collect(),
            },
        );
        handle
    }

    pub fn value(&self, handle: &B256) -> Option<u64> {
        lock(&self.inner).values.get(handle).map(|c| c.value)
    }

    pub fn is_allowed(&self, handle: &B256, account: &Address) -> bool {
        lock(&self.inner)
            .values
            .get(handle)
            .is_some_and(|c| c.allowed.contains(account))
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Digest binding input handles to the contract and sender.
fn input_attestation(contract: Address, user: Address, handles: &[B256]) -> B256 {
    let mut preimage = Vec::with_capacity(40 + handles.len() * 32);
    preimage.extend_from_slice(contract.as_slice());
    preimage.extend_from_slice(user.as_slice());
    for handle in handles {
        preimage.extend_from_slice(handle.as_slice());
    }
    keccak256(&preimage)
}

/// Proof layout: handle count, signer count (always zero here), the handles,
/// then the attestation digest.
fn encode_input_proof(contract: Address, user: Address, handles: &[B256]) -> Result<Bytes, EngineError> {
    let count = u8::try_from(handles.len()).map_err(|_| EngineError::TooManyValues(handles.len()))?;
    let mut proof = Vec::with_capacity(2 + handles.len() * 32 + 32);
    proof.push(count);
    proof.push(0);
    for handle in handles {
        proof.extend_from_slice(handle.as_slice());
    }
    proof.extend_from_slice(input_attestation(contract, user, handles).as_slice());
    Ok(Bytes::from(proof))
}

fn verify_input_proof(proof: &[u8], handle: &B256, contract: Address, user: Address) -> bool {
    let Some((&count, rest)) = proof.split_first() else {
        return false;
    };
    let count = count as usize;
    if rest.len() != 1 + count * 32 + 32 {
        return false;
    }
    let handles: Vec<B256> = rest[1..1 + count * 32]
        .chunks_exact(32)
        .map(B256::from_slice)
        .collect();
    let attestation = B256::from_slice(&rest[1 + count * 32..]);

    handles.contains(handle) && attestation == input_attestation(contract, user, &handles)
}

/// Engine over a [`CiphertextDb`].
pub struct MockEngine {
    db: CiphertextDb,
    chain_id: u64,
    fail_encryption: Arc<AtomicBool>,
}

#[async_trait]
impl EncryptionEngine for MockEngine {
    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedAmount, EngineError> {
        input.validate()?;
        if self.fail_encryption.load(Ordering::SeqCst) {
            return Err(EngineError::Encryption("input proof generation failed".into()));
        }

        let count = input.values().len();
        let handles: Vec<B256> = input
            .values()
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let index = u8::try_from(index).map_err(|_| EngineError::TooManyValues(count))?;
                Ok(self.db.insert(
                    value.as_u64(),
                    index,
                    self.chain_id,
                    value.type_tag(),
                    &[input.user(), input.contract()],
                ))
            })
            .collect::<Result<_, EngineError>>()?;

        let proof = encode_input_proof(input.contract(), input.user(), &handles)?;
        Ok(EncryptedAmount {
            handles,
            proof,
            contract: input.contract(),
            user: input.user(),
        })
    }

    async fn reencrypt(
        &self,
        signer: &WalletSigner,
        handle: U256,
        contract: Address,
    ) -> Result<u64, EngineError> {
        if handle.is_zero() {
            return Err(EngineError::HandleNotInitialized);
        }
        let handle = B256::from(handle.to_be_bytes::<32>());

        let mut request = Vec::with_capacity(52);
        request.extend_from_slice(handle.as_slice());
        request.extend_from_slice(contract.as_slice());
        signer
            .sign_hash(&keccak256(&request))
            .await
            .map_err(|e| EngineError::Reencryption(e.to_string()))?;

        let user = signer.address();
        if !self.db.is_allowed(&handle, &user) {
            return Err(EngineError::Reencryption(format!(
                "{user} is not allowed to read {handle}"
            )));
        }
        self.db
            .value(&handle)
            .ok_or_else(|| EngineError::Reencryption(format!("unknown handle {handle}")))
    }
}

/// Creates [`MockEngine`]s sharing one db.
#[derive(Debug, Clone, Default)]
pub struct MockEngineFactory {
    db: CiphertextDb,
    fail_encryption: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl MockEngineFactory {
    pub fn new(db: CiphertextDb) -> Self {
        Self {
            db,
            ..Self::default()
        }
    }

    /// Makes every subsequent encryption fail until reset.
    pub fn set_encryption_failure(&self, fail: bool) {
        self.fail_encryption.store(fail, Ordering::SeqCst);
    }

    /// Makes instance creation fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn create_instance(&self, chain_id: &str) -> Result<Arc<dyn EncryptionEngine>, EngineError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("public key could not be fetched".into()));
        }
        let chain_id = parse_chain_id(chain_id)
            .ok_or_else(|| EngineError::Unavailable(format!("bad chain id {chain_id}")))?;
        Ok(Arc::new(MockEngine {
            db: self.db.clone(),
            chain_id,
            fail_encryption: self.fail_encryption.clone(),
        }))
    }
}

#[derive(Debug)]
struct WalletState {
    chain_id: String,
    signers: Vec<PrivateKeySigner>,
    exposed: Option<Vec<Address>>,
    authorized: bool,
    refuse_switch: bool,
    reject_requests: bool,
    switch_requests: Vec<String>,
}

/// Wallet holding local keys. Accounts stay hidden until
/// [`WalletProvider::request_accounts`] or [`MockWallet::authorize`].
#[derive(Debug)]
pub struct MockWallet {
    hub: EventHub,
    state: Mutex<WalletState>,
}

impl MockWallet {
    pub fn new(chain_id: &str) -> Self {
        Self {
            hub: EventHub::new(),
            state: Mutex::new(WalletState {
                chain_id: chain_id.to_string(),
                signers: Vec::new(),
                exposed: None,
                authorized: false,
                refuse_switch: false,
                reject_requests: false,
                switch_requests: Vec::new(),
            }),
        }
    }

    pub fn with_signer(self, signer: PrivateKeySigner) -> Self {
        lock(&self.state).signers.push(signer);
        self
    }

    pub fn refusing_switch(self) -> Self {
        lock(&self.state).refuse_switch = true;
        self
    }

    pub fn rejecting_requests(self) -> Self {
        lock(&self.state).reject_requests = true;
        self
    }

    /// Marks the accounts as already authorized, as after a previous visit.
    pub fn authorize(&self) {
        lock(&self.state).authorized = true;
    }

    /// Simulates the user picking another network in the wallet.
    pub fn set_chain(&self, chain_id: &str) {
        lock(&self.state).chain_id = chain_id.to_string();
        self.hub.emit(ProviderEvent::ChainChanged);
    }

    /// Simulates the user changing the exposed accounts.
    pub fn change_accounts(&self, accounts: Vec<Address>) {
        {
            let mut state = lock(&self.state);
            state.authorized = true;
            state.exposed = Some(accounts.clone());
        }
        self.hub.emit(ProviderEvent::AccountsChanged(accounts));
    }

    pub fn switch_requests(&self) -> Vec<String> {
        lock(&self.state).switch_requests.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    fn exposed_accounts(state: &WalletState) -> Vec<Address> {
        match &state.exposed {
            Some(accounts) => accounts.clone(),
            None => state.signers.iter().map(|s| s.address()).collect(),
        }
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn chain_id(&self) -> Result<String, WalletError> {
        Ok(lock(&self.state).chain_id.clone())
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        let state = lock(&self.state);
        if !state.authorized {
            return Ok(Vec::new());
        }
        Ok(Self::exposed_accounts(&state))
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let accounts = {
            let mut state = lock(&self.state);
            if state.reject_requests {
                return Err(WalletError::Rejected);
            }
            state.authorized = true;
            Self::exposed_accounts(&state)
        };
        self.hub.emit(ProviderEvent::AccountsChanged(accounts.clone()));
        Ok(accounts)
    }

    async fn switch_chain(&self, chain_id: &str) -> Result<(), WalletError> {
        {
            let mut state = lock(&self.state);
            state.switch_requests.push(chain_id.to_string());
            if state.refuse_switch {
                return Err(WalletError::UnrecognizedChain(chain_id.to_string()));
            }
            state.chain_id = chain_id.to_string();
        }
        self.hub.emit(ProviderEvent::ChainChanged);
        Ok(())
    }

    async fn signer(&self) -> Result<WalletSigner, WalletError> {
        let state = lock(&self.state);
        if !state.authorized {
            return Err(WalletError::NoAccount);
        }
        let selected = Self::exposed_accounts(&state)
            .first()
            .copied()
            .ok_or(WalletError::NoAccount)?;
        let signer = state
            .signers
            .iter()
            .find(|s| s.address() == selected)
            .cloned()
            .ok_or(WalletError::NoAccount)?;
        Ok(Arc::new(signer))
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }
}

/// Calls observed by a [`MockLedger`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerCalls {
    pub balance_of: usize,
    pub transfers: Vec<TransferArgs>,
    pub secret_requests: usize,
    pub secret_polls: usize,
}

#[derive(Debug)]
struct LedgerState {
    balances: HashMap<Address, B256>,
    secret: u64,
    reveal_after_polls: usize,
    polls_since_request: usize,
    secret_requested: bool,
    fail_next_transfer: bool,
    tx_counter: u64,
    calls: LedgerCalls,
}

/// Confidential token deployed at a single address, evaluated over a
/// [`CiphertextDb`].
///
/// Transfers of more than the sender holds move zero, as the encrypted
/// contract does.
#[derive(Debug)]
pub struct MockLedger {
    db: CiphertextDb,
    contract: Address,
    chain_id: u64,
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new(db: CiphertextDb, contract: Address, chain_id: u64) -> Self {
        Self {
            db,
            contract,
            chain_id,
            state: Mutex::new(LedgerState {
                balances: HashMap::new(),
                secret: 0,
                reveal_after_polls: 0,
                polls_since_request: 0,
                secret_requested: false,
                fail_next_transfer: false,
                tx_counter: 0,
                calls: LedgerCalls::default(),
            }),
        }
    }

    /// Secret revealed once `reveal_after_polls` polls have been made after
    /// the request.
    pub fn with_secret(self, secret: u64, reveal_after_polls: usize) -> Self {
        {
            let mut state = lock(&self.state);
            state.secret = secret;
            state.reveal_after_polls = reveal_after_polls;
        }
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Credits `amount` to `account` under a fresh handle.
    pub fn mint(&self, account: Address, amount: u64) {
        let mut state = lock(&self.state);
        let current = state
            .balances
            .get(&account)
            .and_then(|h| self.db.value(h))
            .unwrap_or(0);
        let handle = self.db.insert(
            current.saturating_add(amount),
            0,
            self.chain_id,
            EUINT64_TAG,
            &[account, self.contract],
        );
        state.balances.insert(account, handle);
    }

    /// Overwrites the stored balance handle of `account`.
    pub fn set_balance_handle(&self, account: Address, handle: B256) {
        lock(&self.state).balances.insert(account, handle);
    }

    /// Makes the next transfer fail before it is mined.
    pub fn fail_next_transfer(&self) {
        lock(&self.state).fail_next_transfer = true;
    }

    pub fn calls(&self) -> LedgerCalls {
        lock(&self.state).calls.clone()
    }

    /// Clear balance of `account`, for assertions.
    pub fn clear_balance(&self, account: &Address) -> u64 {
        let state = lock(&self.state);
        state
            .balances
            .get(account)
            .and_then(|h| self.db.value(h))
            .unwrap_or(0)
    }

    fn check_contract(&self, contract: Address, method: &'static str) -> Result<(), LedgerError> {
        if contract != self.contract {
            return Err(LedgerError::Call(method, format!("no contract deployed at {contract}")));
        }
        Ok(())
    }

    fn next_tx_hash(state: &mut LedgerState) -> TxHash {
        state.tx_counter += 1;
        keccak256(state.tx_counter.to_be_bytes())
    }
}

#[async_trait]
impl ConfidentialLedger for MockLedger {
    async fn balance_of(&self, contract: Address, account: Address) -> Result<U256, LedgerError> {
        self.check_contract(contract, "balanceOf")?;
        let mut state = lock(&self.state);
        state.calls.balance_of += 1;
        Ok(state
            .balances
            .get(&account)
            .map(|h| U256::from_be_bytes(h.0))
            .unwrap_or(U256::ZERO))
    }

    async fn transfer(
        &self,
        contract: Address,
        signer: &WalletSigner,
        args: &TransferArgs,
    ) -> Result<TxHash, LedgerError> {
        self.check_contract(contract, "transfer")?;
        let sender = signer.address();
        let handle = args.handle_bytes()?;
        let proof = args.proof_bytes()?;

        let mut state = lock(&self.state);
        state.calls.transfers.push(args.clone());
        if std::mem::take(&mut state.fail_next_transfer) {
            return Err(LedgerError::Transaction("transfer", "transaction underpriced".into()));
        }
        if !verify_input_proof(&proof, &handle, contract, sender) {
            return Err(LedgerError::Transaction("transfer", "invalid input proof".into()));
        }

        let requested = self.db.value(&handle).unwrap_or(0);
        let sender_balance = state
            .balances
            .get(&sender)
            .and_then(|h| self.db.value(h))
            .unwrap_or(0);
        let moved = if requested <= sender_balance { requested } else { 0 };

        let sender_handle = self.db.insert(
            sender_balance - moved,
            0,
            self.chain_id,
            EUINT64_TAG,
            &[sender, self.contract],
        );
        state.balances.insert(sender, sender_handle);
        // Read after the debit so a transfer to self nets to zero.
        let recipient_balance = state
            .balances
            .get(&args.recipient)
            .and_then(|h| self.db.value(h))
            .unwrap_or(0);
        let recipient_handle = self.db.insert(
            recipient_balance.saturating_add(moved),
            0,
            self.chain_id,
            EUINT64_TAG,
            &[args.recipient, self.contract],
        );
        state.balances.insert(args.recipient, recipient_handle);

        debug!(%sender, recipient = %args.recipient, "mock transfer mined");
        Ok(Self::next_tx_hash(&mut state))
    }

    async fn request_secret(&self, contract: Address, _signer: &WalletSigner) -> Result<TxHash, LedgerError> {
        self.check_contract(contract, "requestSecret")?;
        let mut state = lock(&self.state);
        state.calls.secret_requests += 1;
        state.secret_requested = true;
        state.polls_since_request = 0;
        Ok(Self::next_tx_hash(&mut state))
    }

    async fn revealed_secret(&self, contract: Address) -> Result<u64, LedgerError> {
        self.check_contract(contract, "revealedSecret")?;
        let mut state = lock(&self.state);
        state.calls.secret_polls += 1;
        if !state.secret_requested {
            return Ok(0);
        }
        if state.polls_since_request < state.reveal_after_polls {
            state.polls_since_request += 1;
            return Ok(0);
        }
        Ok(state.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("0x7a69"), Some(31337));
        assert_eq!(parse_chain_id("0xAA36A7"), Some(11155111));
        assert_eq!(parse_chain_id("nope"), None);
    }

    #[test]
    fn test_dev_signer_addresses() {
        let first = dev_signer(0).unwrap();
        assert_eq!(
            first.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
        assert!(dev_signer(2).is_err());
    }

    #[test]
    fn test_handle_layout() {
        let db = CiphertextDb::new();
        let handle = db.insert(9, 3, 31337, EUINT64_TAG, &[]);
        assert_eq!(handle[21], 3);
        assert_eq!(&handle[22..30], &31337u64.to_be_bytes());
        assert_eq!(handle[30], EUINT64_TAG);
        assert_eq!(handle[31], 0);
        assert_eq!(db.value(&handle), Some(9));
    }

    #[test]
    fn test_input_proof_binds_contract_and_user() {
        let contract = Address::repeat_byte(1);
        let user = Address::repeat_byte(2);
        let handle = B256::repeat_byte(3);
        let proof = encode_input_proof(contract, user, &[handle]).unwrap();

        assert!(verify_input_proof(&proof, &handle, contract, user));
        assert!(!verify_input_proof(&proof, &handle, contract, Address::repeat_byte(9)));
        assert!(!verify_input_proof(&proof, &B256::repeat_byte(4), contract, user));
        assert!(!verify_input_proof(&proof[..proof.len() - 1], &handle, contract, user));
        assert!(!verify_input_proof(&[], &handle, contract, user));
    }

    #[tokio::test]
    async fn test_engine_reencrypts_own_handles_only() {
        let factory = MockEngineFactory::default();
        let engine = factory.create_instance("0x7a69").await.unwrap();
        let owner: WalletSigner = Arc::new(dev_signer(0).unwrap());
        let stranger: WalletSigner = Arc::new(dev_signer(1).unwrap());
        let contract = Address::repeat_byte(7);

        let amount = engine
            .encrypt(EncryptedInput::new(contract, owner.address()).add64(42))
            .await
            .unwrap();
        let handle = U256::from_be_bytes(amount.handles[0].0);

        assert_eq!(engine.reencrypt(&owner, handle, contract).await, Ok(42));
        assert!(matches!(
            engine.reencrypt(&stranger, handle, contract).await,
            Err(EngineError::Reencryption(_))
        ));
        assert_eq!(
            engine.reencrypt(&owner, U256::ZERO, contract).await,
            Err(EngineError::HandleNotInitialized)
        );
    }

    #[tokio::test]
    async fn test_ledger_transfer_moves_encrypted_amount() {
        let db = CiphertextDb::new();
        let contract = Address::repeat_byte(7);
        let ledger = MockLedger::new(db.clone(), contract, 31337);
        let engine = MockEngineFactory::new(db).create_instance("0x7a69").await.unwrap();
        let sender: WalletSigner = Arc::new(dev_signer(0).unwrap());
        let recipient = dev_signer(1).unwrap().address();
        ledger.mint(sender.address(), 100);

        let amount = engine
            .encrypt(EncryptedInput::new(contract, sender.address()).add64(30))
            .await
            .unwrap();
        let args = TransferArgs {
            recipient,
            handle: crate::encoding::to_hex_string(amount.handles[0].as_slice()),
            proof: crate::encoding::to_hex_string(&amount.proof),
        };
        ledger.transfer(contract, &sender, &args).await.unwrap();

        assert_eq!(ledger.clear_balance(&sender.address()), 70);
        assert_eq!(ledger.clear_balance(&recipient), 30);
    }

    #[tokio::test]
    async fn test_ledger_transfer_to_self_keeps_balance() {
        let db = CiphertextDb::new();
        let contract = Address::repeat_byte(7);
        let ledger = MockLedger::new(db.clone(), contract, 31337);
        let engine = MockEngineFactory::new(db).create_instance("0x7a69").await.unwrap();
        let sender: WalletSigner = Arc::new(dev_signer(0).unwrap());
        ledger.mint(sender.address(), 100);
        let before = ledger.balance_of(contract, sender.address()).await.unwrap();

        let amount = engine
            .encrypt(EncryptedInput::new(contract, sender.address()).add64(30))
            .await
            .unwrap();
        let args = TransferArgs {
            recipient: sender.address(),
            handle: crate::encoding::to_hex_string(amount.handles[0].as_slice()),
            proof: crate::encoding::to_hex_string(&amount.proof),
        };
        ledger.transfer(contract, &sender, &args).await.unwrap();

        assert_eq!(ledger.clear_balance(&sender.address()), 100);
        assert_ne!(ledger.balance_of(contract, sender.address()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_engine_encrypts_largest_input() {
        let contract = Address::repeat_byte(7);
        let user = Address::repeat_byte(2);
        let engine = MockEngineFactory::default().create_instance("0x7a69").await.unwrap();

        let mut input = EncryptedInput::new(contract, user);
        for i in 0..crate::engine::MAX_INPUT_VALUES {
            input = input.add_bool(i % 2 == 0);
        }
        let amount = engine.encrypt(input.clone().add_bool(true)).await;
        assert_eq!(amount.unwrap_err(), EngineError::TooManyValues(256));

        let amount = engine.encrypt(input).await.unwrap();
        let last = amount.handles.last().unwrap();
        assert_eq!(last[21], 254);
        assert!(verify_input_proof(&amount.proof, last, contract, user));
    }

    #[tokio::test]
    async fn test_ledger_overdraft_moves_nothing() {
        let db = CiphertextDb::new();
        let contract = Address::repeat_byte(7);
        let ledger = MockLedger::new(db.clone(), contract, 31337);
        let engine = MockEngineFactory::new(db).create_instance("0x7a69").await.unwrap();
        let sender: WalletSigner = Arc::new(dev_signer(0).unwrap());
        let recipient = Address::repeat_byte(0xbb);
        ledger.mint(sender.address(), 10);

        let amount = engine
            .encrypt(EncryptedInput::new(contract, sender.address()).add64(11))
            .await
            .unwrap();
        let args = TransferArgs {
            recipient,
            handle: crate::encoding::to_hex_string(amount.handles[0].as_slice()),
            proof: crate::encoding::to_hex_string(&amount.proof),
        };
        ledger.transfer(contract, &sender, &args).await.unwrap();

        assert_eq!(ledger.clear_balance(&sender.address()), 10);
        assert_eq!(ledger.clear_balance(&recipient), 0);
    }

    #[tokio::test]
    async fn test_ledger_secret_reveal_after_polls() {
        let contract = Address::repeat_byte(7);
        let ledger = MockLedger::new(CiphertextDb::new(), contract, 31337).with_secret(1337, 2);
        let signer: WalletSigner = Arc::new(dev_signer(0).unwrap());

        assert_eq!(ledger.revealed_secret(contract).await.unwrap(), 0);
        ledger.request_secret(contract, &signer).await.unwrap();
        assert_eq!(ledger.revealed_secret(contract).await.unwrap(), 0);
        assert_eq!(ledger.revealed_secret(contract).await.unwrap(), 0);
        assert_eq!(ledger.revealed_secret(contract).await.unwrap(), 1337);
    }

    #[tokio::test]
    async fn test_ledger_rejects_other_contract() {
        let ledger = MockLedger::new(CiphertextDb::new(), Address::repeat_byte(7), 31337);
        let err = ledger
            .balance_of(Address::repeat_byte(8), Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Call("balanceOf", _)));
    }

    #[tokio::test]
    async fn test_wallet_hides_accounts_until_requested() {
        let wallet = MockWallet::new("0x7a69").with_signer(dev_signer(0).unwrap());
        assert!(wallet.accounts().await.unwrap().is_empty());
        assert!(matches!(wallet.signer().await, Err(WalletError::NoAccount)));

        let accounts = wallet.request_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(wallet.accounts().await.unwrap(), accounts);
        assert_eq!(wallet.signer().await.unwrap().address(), accounts[0]);
    }
}
