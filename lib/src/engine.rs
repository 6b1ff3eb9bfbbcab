//! Encryption engine interface
//!
//! The engine turns clear integers into ciphertext handles plus an input
//! proof bound to a `(contract, user)` pair, and turns an on-chain handle back
//! into a clear value through a signed reencryption request. The cryptography
//! lives behind [`EncryptionEngine`]; this module only fixes its shape and
//! owns the lazily created engine instance.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::wallet::WalletSigner;

/// Upper bound on the bits packed into one encrypted input.
pub const MAX_INPUT_BITS: u32 = 2048;

/// Upper bound on the values packed into one encrypted input; each handle
/// carries its index in a single byte.
pub const MAX_INPUT_VALUES: usize = u8::MAX as usize;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The handle was never assigned on-chain.
    #[error("Handle is not initialized")]
    HandleNotInitialized,

    #[error("encrypted input is empty")]
    EmptyInput,

    #[error("encrypted input carries {0} bits, more than the {MAX_INPUT_BITS} allowed")]
    InputTooLarge(u32),

    #[error("encrypted input carries {0} values, more than the {MAX_INPUT_VALUES} allowed")]
    TooManyValues(usize),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("reencryption failed: {0}")]
    Reencryption(String),

    #[error("engine instance could not be created: {0}")]
    Unavailable(String),
}

/// One clear value queued in an [`EncryptedInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl ClearValue {
    pub fn bits(&self) -> u32 {
        match self {
            ClearValue::Bool(_) => 2,
            ClearValue::U8(_) => 8,
            ClearValue::U16(_) => 16,
            ClearValue::U32(_) => 32,
            ClearValue::U64(_) => 64,
        }
    }

    /// Type tag as encoded in the last bytes of a handle.
    pub fn type_tag(&self) -> u8 {
        match self {
            ClearValue::Bool(_) => 0,
            ClearValue::U8(_) => 2,
            ClearValue::U16(_) => 3,
            ClearValue::U32(_) => 4,
            ClearValue::U64(_) => 5,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match *self {
            ClearValue::Bool(v) => v as u64,
            ClearValue::U8(v) => v as u64,
            ClearValue::U16(v) => v as u64,
            ClearValue::U32(v) => v as u64,
            ClearValue::U64(v) => v,
        }
    }
}

/// Values to encrypt together, bound to the contract that will consume them
/// and the account that will submit them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    contract: Address,
    user: Address,
    values: Vec<ClearValue>,
}

impl EncryptedInput {
    pub fn new(contract: Address, user: Address) -> Self {
        Self {
            contract,
            user,
            values: Vec::new(),
        }
    }

    pub fn add_bool(self, value: bool) -> Self {
        self.push(ClearValue::Bool(value))
    }

    pub fn add8(self, value: u8) -> Self {
        self.push(ClearValue::U8(value))
    }

    pub fn add16(self, value: u16) -> Self {
        self.push(ClearValue::U16(value))
    }

    pub fn add32(self, value: u32) -> Self {
        self.push(ClearValue::U32(value))
    }

    pub fn add64(self, value: u64) -> Self {
        self.push(ClearValue::U64(value))
    }

    fn push(mut self, value: ClearValue) -> Self {
        self.values.push(value);
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn user(&self) -> Address {
        self.user
    }

    pub fn values(&self) -> &[ClearValue] {
        &self.values
    }

    pub fn total_bits(&self) -> u32 {
        self.values.iter().map(ClearValue::bits).sum()
    }

    /// Checks the input is non-empty and within [`MAX_INPUT_VALUES`] and
    /// [`MAX_INPUT_BITS`].
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.values.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        if self.values.len() > MAX_INPUT_VALUES {
            return Err(EngineError::TooManyValues(self.values.len()));
        }
        let bits = self.total_bits();
        if bits > MAX_INPUT_BITS {
            return Err(EngineError::InputTooLarge(bits));
        }
        Ok(())
    }
}

/// Ciphertext handles and the proof that must accompany them on-chain.
///
/// The pair is only valid together, and only for the `(contract, user)` it
/// was produced for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedAmount {
    pub handles: Vec<B256>,
    pub proof: Bytes,
    pub contract: Address,
    pub user: Address,
}

impl EncryptedAmount {
    pub fn first_handle(&self) -> Option<&B256> {
        self.handles.first()
    }

    /// True when both a handle and a non-empty proof are present.
    pub fn is_submittable(&self) -> bool {
        !self.handles.is_empty() && !self.proof.is_empty()
    }

    pub fn is_bound_to(&self, contract: Address, user: Address) -> bool {
        self.contract == contract && self.user == user
    }
}

#[async_trait]
pub trait EncryptionEngine: Send + Sync {
    /// Encrypts every value of `input` in one shot.
    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedAmount, EngineError>;

    /// Recovers the clear value behind `handle`, authenticated by `signer`.
    ///
    /// Fails with [`EngineError::HandleNotInitialized`] for a handle that was
    /// never set on-chain.
    async fn reencrypt(
        &self,
        signer: &WalletSigner,
        handle: U256,
        contract: Address,
    ) -> Result<u64, EngineError>;
}

/// Creates engine instances for a validated network.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create_instance(&self, chain_id: &str) -> Result<Arc<dyn EncryptionEngine>, EngineError>;
}

struct ActiveEngine {
    chain_id: String,
    engine: Arc<dyn EncryptionEngine>,
}

/// Lazily created, process-wide engine instance.
///
/// The instance is created on first use for a chain and reused until a
/// different chain is requested.
#[derive(Clone)]
pub struct EngineHandle {
    factory: Arc<dyn EngineFactory>,
    active: Arc<Mutex<Option<ActiveEngine>>>,
}

impl EngineHandle {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the instance for `chain_id`, creating it if needed.
    pub async fn get_or_init(&self, chain_id: &str) -> Result<Arc<dyn EncryptionEngine>, EngineError> {
        let chain_id = chain_id.to_ascii_lowercase();
        let mut active = self.active.lock().await;

        if let Some(current) = active.as_ref() {
            if current.chain_id == chain_id {
                debug!(%chain_id, "reusing encryption engine");
                return Ok(current.engine.clone());
            }
        }

        info!(%chain_id, "creating encryption engine instance");
        let engine = self.factory.create_instance(&chain_id).await?;
        *active = Some(ActiveEngine {
            chain_id,
            engine: engine.clone(),
        });
        Ok(engine)
    }

    /// The current instance, if one has been created.
    pub async fn current(&self) -> Option<Arc<dyn EncryptionEngine>> {
        self.active.lock().await.as_ref().map(|a| a.engine.clone())
    }
}
