use crate::{
    error::{AppError, AppResult},
    implementations::rpc::Commitment,
};
use dotenvy::dotenv;
use serde::Deserialize;
use std::{env, fs, path::Path, time::Duration};

const DEFAULT_CONFIG_PATH: &str = "Config.toml";
const DEFAULT_CHAIN_ID: u64 = 1;
const DEFAULT_SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_DAPP_URL: &str = "http://localhost:3000/";

/// Strongly-typed configuration derived from a `Config.toml` or environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_solana_rpc_url")]
    pub solana_rpc_url: String,
    #[serde(default)]
    pub commitment: Commitment,
    /// Page handed to mobile wallets through deeplinks.
    #[serde(default = "default_dapp_url")]
    pub dapp_url: String,
    #[serde(default)]
    pub evm_private_key: Option<String>,
    #[serde(default = "default_chain_id")]
    pub evm_chain_id: u64,
    /// Hex or base58; a 32 byte ed25519 seed or a 64 byte keypair.
    #[serde(default)]
    pub solana_secret_key: Option<String>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub injected_provider: bool,
    #[serde(default)]
    pub standalone_display: bool,
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_solana_rpc_url() -> String {
    DEFAULT_SOLANA_RPC_URL.to_string()
}

fn default_dapp_url() -> String {
    DEFAULT_DAPP_URL.to_string()
}

impl AppConfig {
    /// Load configuration, preferring a user-provided config file and falling back to env vars.
    pub fn load() -> AppResult<Self> {
        dotenv().ok();

        let configured_path =
            env::var("WALLET_HUB_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let config_path = Path::new(&configured_path);

        if config_path.exists() {
            let raw = fs::read_to_string(config_path)
                .map_err(|err| AppError::Config(format!("failed to read config file: {err}")))?;
            return Self::from_toml(&raw);
        }

        Self::from_env()
    }

    pub fn from_toml(raw: &str) -> AppResult<Self> {
        let mut cfg: AppConfig = toml::from_str(raw)
            .map_err(|err| AppError::Config(format!("failed to parse config file: {err}")))?;
        cfg.apply_chain_id_default();
        Ok(cfg)
    }

    /// Helper used when no config file is present.
    fn from_env() -> AppResult<Self> {
        let commitment = match env::var("SOLANA_COMMITMENT") {
            Ok(raw) => raw.parse::<Commitment>()?,
            Err(_) => Commitment::default(),
        };
        let connect_timeout_secs = env::var("CONNECT_TIMEOUT_SECS")
            .ok()
            .map(|v| {
                v.parse::<u64>().map_err(|err| {
                    AppError::Config(format!("CONNECT_TIMEOUT_SECS is not a number: {err}"))
                })
            })
            .transpose()?;

        let mut cfg = Self {
            solana_rpc_url: env::var("SOLANA_RPC_URL").unwrap_or_else(|_| default_solana_rpc_url()),
            commitment,
            dapp_url: env::var("DAPP_URL").unwrap_or_else(|_| default_dapp_url()),
            evm_private_key: env::var("EVM_PRIVATE_KEY").ok(),
            evm_chain_id: env::var("EVM_CHAIN_ID")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_CHAIN_ID),
            solana_secret_key: env::var("SOLANA_SECRET_KEY").ok(),
            connect_timeout_secs,
            user_agent: env::var("WALLET_HUB_USER_AGENT").ok(),
            injected_provider: env_flag("WALLET_HUB_INJECTED_PROVIDER"),
            standalone_display: env_flag("WALLET_HUB_STANDALONE"),
        };
        cfg.apply_chain_id_default();
        Ok(cfg)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Ensure we never surface a zero chain id from user input.
    fn apply_chain_id_default(&mut self) {
        if self.evm_chain_id == 0 {
            self.evm_chain_id = DEFAULT_CHAIN_ID;
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
