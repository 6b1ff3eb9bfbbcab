//! Command line and environment configuration

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cerc20_lib::config::{DEVNET_CHAIN_ID, HARDHAT_CHAIN_ID, SEPOLIA_CHAIN_ID};
use cerc20_lib::BuildMode;
use clap::Args;
use tracing::debug;

/// Expand environment variables in a string (e.g., "$PRIVATE_KEY" -> actual value)
pub fn expand_env_vars(input: &str) -> Result<String> {
    match input.strip_prefix('$') {
        Some(var_name) => {
            let value = env::var(var_name)
                .with_context(|| format!("Environment variable {var_name} not found"))?;
            debug!("expanded {input} from the environment");
            Ok(value)
        }
        None => Ok(input.to_string()),
    }
}

/// Settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct AppConfig {
    /// Run against the in-process mocked network instead of Sepolia
    /// (`MOCKED=1`, `--mocked` or `--mocked=false`)
    #[arg(
        long,
        env = "MOCKED",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub mocked: Option<String>,

    /// Private key of the account to use (a `$VAR` reference is expanded)
    #[arg(long, short = 'p', env = "PRIVATE_KEY", hide_env_values = true, global = true)]
    pub private_key: Option<String>,

    /// Sepolia RPC endpoint
    #[arg(long, env = "SEPOLIA_RPC_URL", global = true)]
    pub sepolia_rpc_url: Option<String>,

    /// Devnet RPC endpoint
    #[arg(long, env = "DEVNET_RPC_URL", global = true)]
    pub devnet_rpc_url: Option<String>,

    /// Local Hardhat node RPC endpoint
    #[arg(long, env = "HARDHAT_RPC_URL", default_value = "http://127.0.0.1:8545", global = true)]
    pub hardhat_rpc_url: String,

    /// Chain the wallet starts on, defaults to the authorized one
    #[arg(long, env = "CHAIN_ID", global = true)]
    pub chain_id: Option<String>,

    /// Encryption gateway used in production
    #[arg(long, env = "RELAYER_URL", default_value = "http://127.0.0.1:3000", global = true)]
    pub relayer_url: String,

    /// Hardhat-deploy output directory
    #[arg(long, env = "DEPLOYMENTS_DIR", default_value = "deployments", global = true)]
    pub deployments_dir: PathBuf,
}

impl AppConfig {
    pub fn mode(&self) -> BuildMode {
        BuildMode::from_flag(self.mocked.as_deref())
    }

    /// Chain the wallet reports before any switch.
    pub fn initial_chain_id(&self) -> String {
        self.chain_id
            .clone()
            .unwrap_or_else(|| self.mode().authorized_chain_id().to_string())
            .to_ascii_lowercase()
    }

    /// Endpoints of every network the wallet knows, keyed by chain id.
    pub fn rpc_urls(&self) -> HashMap<String, String> {
        let mut urls = HashMap::new();
        if let Some(url) = &self.sepolia_rpc_url {
            urls.insert(SEPOLIA_CHAIN_ID.to_string(), url.clone());
        }
        if let Some(url) = &self.devnet_rpc_url {
            urls.insert(DEVNET_CHAIN_ID.to_string(), url.clone());
        }
        urls.insert(HARDHAT_CHAIN_ID.to_string(), self.hardhat_rpc_url.clone());
        urls
    }

    /// The private key, expanded and checked for shape.
    pub fn private_key(&self) -> Result<Option<String>> {
        let Some(raw) = &self.private_key else {
            return Ok(None);
        };
        let key = expand_env_vars(raw.trim())?;
        if !key.starts_with("0x") || key.len() != 66 {
            bail!("Private key must be a valid hex string starting with 0x");
        }
        Ok(Some(key))
    }
}
