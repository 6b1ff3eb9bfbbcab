//! HTTP encryption gateway
//!
//! Production engine: the homomorphic encryption runs in a gateway service
//! next to the client, which exposes the network key, input encryption with
//! proof generation, and signed reencryption over JSON.
//!
//! | Method | Path                 | Purpose                         |
//! |--------|----------------------|---------------------------------|
//! | GET    | `/v1/keyurl`         | network key for a chain         |
//! | POST   | `/v1/input-proof`    | encrypt values, return proof    |
//! | POST   | `/v1/reencrypt`      | decrypt a handle for a signer   |

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use cerc20_lib::encoding::to_hex_string;
use cerc20_lib::engine::{ClearValue, EncryptedAmount, EncryptedInput, EncryptionEngine, EngineError, EngineFactory};
use cerc20_lib::wallet::WalletSigner;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Error code the gateway returns for a handle never set on-chain.
pub const HANDLE_NOT_INITIALIZED: &str = "HANDLE_NOT_INITIALIZED";

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GatewayResponse<T> {
    Success { data: T },
    Error { code: Option<String>, message: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub public_key_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValue {
    /// Bit width, `2` for booleans.
    pub bits: u32,
    pub value: String,
}

impl From<&ClearValue> for InputValue {
    fn from(value: &ClearValue) -> Self {
        Self {
            bits: value.bits(),
            value: value.as_u64().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputProofRequest {
    pub chain_id: String,
    pub public_key_id: String,
    pub contract_address: Address,
    pub user_address: Address,
    pub values: Vec<InputValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputProofResponse {
    pub handles: Vec<String>,
    pub input_proof: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReencryptRequest {
    pub chain_id: String,
    pub handle: String,
    pub contract_address: Address,
    pub user_address: Address,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct ReencryptResponse {
    pub value: String,
}

#[derive(Clone)]
struct Gateway {
    client: reqwest::Client,
    base_url: String,
}

impl Gateway {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayFailure> {
        if !response.status().is_success() && response.status() != reqwest::StatusCode::BAD_REQUEST {
            return Err(GatewayFailure::Transport(format!(
                "gateway returned error status: {}",
                response.status()
            )));
        }
        let body: GatewayResponse<T> = response
            .json()
            .await
            .map_err(|e| GatewayFailure::Transport(format!("Failed to parse gateway response: {e}")))?;
        match body {
            GatewayResponse::Success { data } => Ok(data),
            GatewayResponse::Error { code, message } => Err(GatewayFailure::Rejected { code, message }),
        }
    }
}

enum GatewayFailure {
    Transport(String),
    Rejected { code: Option<String>, message: String },
}

impl GatewayFailure {
    fn into_message(self) -> String {
        match self {
            GatewayFailure::Transport(message) => message,
            GatewayFailure::Rejected { message, .. } => message,
        }
    }
}

/// Creates [`RelayerEngine`]s after fetching the network key id.
pub struct RelayerEngineFactory {
    gateway: Gateway,
}

impl RelayerEngineFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            gateway: Gateway {
                client,
                base_url: base_url.into(),
            },
        }
    }
}

#[async_trait]
impl EngineFactory for RelayerEngineFactory {
    async fn create_instance(&self, chain_id: &str) -> Result<Arc<dyn EncryptionEngine>, EngineError> {
        let response = self
            .gateway
            .client
            .get(self.gateway.url("/v1/keyurl"))
            .query(&[("chainId", chain_id)])
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(format!("Failed to contact gateway: {e}")))?;
        let key: KeyInfo = Gateway::read(response)
            .await
            .map_err(|e| EngineError::Unavailable(e.into_message()))?;
        info!(public_key_id = %key.public_key_id, "network key fetched");

        Ok(Arc::new(RelayerEngine {
            gateway: self.gateway.clone(),
            chain_id: chain_id.to_string(),
            public_key_id: key.public_key_id,
        }))
    }
}

pub struct RelayerEngine {
    gateway: Gateway,
    chain_id: String,
    public_key_id: String,
}

/// Digest the user signs to authorize a reencryption.
pub fn reencryption_digest(handle: &B256, contract: Address) -> B256 {
    let mut preimage = Vec::with_capacity(52);
    preimage.extend_from_slice(handle.as_slice());
    preimage.extend_from_slice(contract.as_slice());
    keccak256(preimage)
}

#[async_trait]
impl EncryptionEngine for RelayerEngine {
    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedAmount, EngineError> {
        input.validate()?;
        let request = InputProofRequest {
            chain_id: self.chain_id.clone(),
            public_key_id: self.public_key_id.clone(),
            contract_address: input.contract(),
            user_address: input.user(),
            values: input.values().iter().map(InputValue::from).collect(),
        };

        let response = self
            .gateway
            .client
            .post(self.gateway.url("/v1/input-proof"))
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Encryption(format!("Failed to contact gateway: {e}")))?;
        let body: InputProofResponse = Gateway::read(response)
            .await
            .map_err(|e| EngineError::Encryption(e.into_message()))?;

        let handles = body
            .handles
            .iter()
            .map(|h| B256::from_str(h).map_err(|e| EngineError::Encryption(format!("bad handle {h}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let proof = Bytes::from_str(&body.input_proof)
            .map_err(|e| EngineError::Encryption(format!("bad input proof: {e}")))?;
        debug!(handles = handles.len(), proof_len = proof.len(), "input encrypted");

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
        let signature = signer
            .sign_hash(&reencryption_digest(&handle, contract))
            .await
            .map_err(|e| EngineError::Reencryption(e.to_string()))?;

        let request = ReencryptRequest {
            chain_id: self.chain_id.clone(),
            handle: to_hex_string(handle.as_slice()),
            contract_address: contract,
            user_address: signer.address(),
            signature: to_hex_string(&signature.as_bytes()),
        };
        let response = self
            .gateway
            .client
            .post(self.gateway.url("/v1/reencrypt"))
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Reencryption(format!("Failed to contact gateway: {e}")))?;

        let body: ReencryptResponse = match Gateway::read(response).await {
            Ok(body) => body,
            Err(GatewayFailure::Rejected { code: Some(code), .. }) if code == HANDLE_NOT_INITIALIZED => {
                return Err(EngineError::HandleNotInitialized);
            }
            Err(e) => return Err(EngineError::Reencryption(e.into_message())),
        };
        body.value
            .parse()
            .map_err(|e| EngineError::Reencryption(format!("bad clear value {}: {e}", body.value)))
    }
}
