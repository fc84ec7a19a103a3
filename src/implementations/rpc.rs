use std::{fmt, str::FromStr};

use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Provider};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Solana commitment level used when asking for a recent blockhash.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Commitment::Processed => write!(f, "processed"),
            Commitment::Confirmed => write!(f, "confirmed"),
            Commitment::Finalized => write!(f, "finalized"),
        }
    }
}

impl FromStr for Commitment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(AppError::Config(format!("unknown commitment level: {other}"))),
        }
    }
}

/// Source of the short-lived anchor a Solana transaction must reference.
#[async_trait]
pub trait BlockReferenceSource: Send + Sync {
    async fn recent_block_reference(&self, commitment: Commitment) -> AppResult<String>;
}

#[derive(Debug, Deserialize, Serialize)]
struct LatestBlockhash {
    value: BlockhashValue,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
    #[allow(dead_code)]
    last_valid_block_height: u64,
}

/// `getLatestBlockhash` over any ethers JSON-RPC transport.
#[derive(Debug)]
pub struct SolanaRpcClient<P> {
    provider: Provider<P>,
}

impl SolanaRpcClient<Http> {
    pub fn from_url(url: &str) -> AppResult<Self> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|err| AppError::Config(format!("failed to create solana rpc client: {err}")))?;
        Ok(Self::new(provider))
    }
}

impl<P: JsonRpcClient> SolanaRpcClient<P> {
    pub fn new(provider: Provider<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> BlockReferenceSource for SolanaRpcClient<P>
where
    P: JsonRpcClient + 'static,
{
    async fn recent_block_reference(&self, commitment: Commitment) -> AppResult<String> {
        let response: LatestBlockhash = self
            .provider
            .request("getLatestBlockhash", [json!({ "commitment": commitment })])
            .await?;

        if response.value.blockhash.is_empty() {
            return Err(AppError::Rpc("getLatestBlockhash returned an empty blockhash".into()));
        }
        debug!(blockhash = %response.value.blockhash, %commitment, "fetched recent blockhash");
        Ok(response.value.blockhash)
    }
}
