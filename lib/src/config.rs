//! Build-mode configuration
//!
//! Selects which network this client is authorized to operate against and
//! where the deployed token contract address is read from. The selection is
//! fixed per build: a [`BuildMode`] value is created once at startup and
//! handed to every component that needs it.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use alloy::primitives::Address;
use serde::Deserialize;
use thiserror::Error;

/// Chain identifier of Sepolia, the production network
pub const SEPOLIA_CHAIN_ID: &str = "0xaa36a7";

/// Chain identifier of the alternate mock devnet
pub const DEVNET_CHAIN_ID: &str = "0x2328";

/// Chain identifier of a local Hardhat node
pub const HARDHAT_CHAIN_ID: &str = "0x7a69";

/// Every identifier this client knows about, production first.
pub const AUTHORIZED_CHAIN_IDS: [&str; 3] = [SEPOLIA_CHAIN_ID, DEVNET_CHAIN_ID, HARDHAT_CHAIN_ID];

/// Artifact name of the confidential token in the deployment directory
pub const TOKEN_DEPLOYMENT_NAME: &str = "MyConfidentialERC20";

/// Whether the client targets the production network or a mocked local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Production,
    Mocked,
}

impl BuildMode {
    /// Reads the mode from a `MOCKED`-style flag value.
    ///
    /// Anything other than an empty string, `0` or `false` selects the mocked mode.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag.map(|v| v.trim().to_ascii_lowercase()) {
            None => BuildMode::Production,
            Some(v) if v.is_empty() || v == "0" || v == "false" => BuildMode::Production,
            Some(_) => BuildMode::Mocked,
        }
    }

    /// The single chain identifier accepted in this mode.
    pub fn authorized_chain_id(self) -> &'static str {
        match self {
            BuildMode::Production => AUTHORIZED_CHAIN_IDS[0],
            BuildMode::Mocked => AUTHORIZED_CHAIN_IDS[2],
        }
    }

    /// Human readable name of the authorized network.
    pub fn network_name(self) -> &'static str {
        match self {
            BuildMode::Production => "Sepolia",
            BuildMode::Mocked => "Hardhat",
        }
    }

    /// Sub-directory of the deployment metadata for this mode.
    pub fn deployment_network(self) -> &'static str {
        match self {
            BuildMode::Production => "sepolia",
            BuildMode::Mocked => "localhost",
        }
    }

    /// Case-insensitive comparison of a reported chain id against the
    /// authorized one.
    pub fn accepts_chain(self, chain_id: &str) -> bool {
        chain_id.trim().to_ascii_lowercase() == self.authorized_chain_id()
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Production => write!(f, "production"),
            BuildMode::Mocked => write!(f, "mocked"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("deployment file {path} could not be read: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deployment file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no deployment recorded for the {0} build")]
    Missing(BuildMode),
}

/// Where the deployed contract address for a build mode comes from.
pub trait DeploymentSource: Send + Sync {
    fn contract_address(&self, mode: BuildMode) -> Result<Address, DeploymentError>;
}

/// The subset of a hardhat-deploy artifact this client reads.
#[derive(Debug, Deserialize)]
struct DeploymentArtifact {
    address: Address,
}

/// hardhat-deploy output directory, laid out as
/// `<root>/<network>/<name>.json`.
#[derive(Debug, Clone)]
pub struct DeploymentDir {
    root: PathBuf,
    name: String,
}

impl DeploymentDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            name: TOKEN_DEPLOYMENT_NAME.to_string(),
        }
    }

    /// Path of the artifact file for a mode.
    pub fn artifact_path(&self, mode: BuildMode) -> PathBuf {
        self.root
            .join(mode.deployment_network())
            .join(format!("{}.json", self.name))
    }
}

impl DeploymentSource for DeploymentDir {
    fn contract_address(&self, mode: BuildMode) -> Result<Address, DeploymentError> {
        let path = self.artifact_path(mode);
        let content = fs::read_to_string(&path).map_err(|source| DeploymentError::Read {
            path: path.clone(),
            source,
        })?;
        let artifact: DeploymentArtifact =
            serde_json::from_str(&content).map_err(|source| DeploymentError::Parse { path, source })?;
        Ok(artifact.address)
    }
}

/// Address known ahead of time, e.g. an in-process mocked deployment.
#[derive(Debug, Clone, Copy)]
pub struct FixedDeployment {
    pub mode: BuildMode,
    pub address: Address,
}

impl DeploymentSource for FixedDeployment {
    fn contract_address(&self, mode: BuildMode) -> Result<Address, DeploymentError> {
        if mode == self.mode {
            Ok(self.address)
        } else {
            Err(DeploymentError::Missing(mode))
        }
    }
}
