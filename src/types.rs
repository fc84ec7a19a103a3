use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ErrorResponse;

/// Account model a wallet provider operates under.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    /// Account based ledger with `{to, value, data}` transactions.
    Evm,
    /// Instruction list ledger anchored on a recent blockhash.
    Solana,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => write!(f, "evm"),
            ChainFamily::Solana => write!(f, "solana"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum ReadyState {
    Installed,
    NotDetected,
    Loadable,
    Unsupported,
}

impl ReadyState {
    /// Whether the provider can be asked to connect right away.
    pub fn is_ready(self) -> bool {
        self == ReadyState::Installed
    }
}

/// Stable provider identity, resolved once when a wallet is registered.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    MetaMask,
    Phantom,
    Solflare,
    Trust,
    Other,
}

/// Snapshot of a registered wallet, readiness included.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WalletDescriptor {
    pub name: String,
    pub icon: String,
    pub url: Option<String>,
    pub ready_state: ReadyState,
    pub chain_family: ChainFamily,
    pub identity: ProviderId,
}

impl WalletDescriptor {
    pub fn is_phantom(&self) -> bool {
        self.identity == ProviderId::Phantom
    }

    pub fn is_solflare(&self) -> bool {
        self.identity == ProviderId::Solflare
    }

    pub fn is_metamask(&self) -> bool {
        self.identity == ProviderId::MetaMask
    }

    pub fn is_trust(&self) -> bool {
        self.identity == ProviderId::Trust
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    NoSelection,
    Selected,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// The single mutable connection record observed by callers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    pub active_wallet: Option<WalletDescriptor>,
    pub status: ConnectionStatus,
    pub account_id: Option<String>,
    pub last_error: Option<ErrorResponse>,
    #[serde(skip)]
    pub(crate) attempt: u64,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }

    /// Account id rendered as `abcd..wxyz` for compact display.
    pub fn shortened_account_id(&self) -> Option<String> {
        self.account_id.as_deref().map(shorten)
    }
}

fn shorten(account: &str) -> String {
    let chars: Vec<char> = account.chars().collect();
    if chars.len() <= 8 {
        return account.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}..{tail}")
}

/// Evm transfer forwarded untouched to the provider, which estimates fees.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EvmTransaction {
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Option<Bytes>,
}

/// Caller-level Solana instruction; accounts are completed from the session.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    Transfer { to: String, lamports: u64 },
    Memo { text: String },
}

impl Instruction {
    pub fn transfer(to: impl Into<String>, lamports: u64) -> Self {
        Instruction::Transfer {
            to: to.into(),
            lamports,
        }
    }

    pub fn memo(text: impl Into<String>) -> Self {
        Instruction::Memo { text: text.into() }
    }
}

/// Chain-tagged send request; the tag must match the active wallet.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "chain_family", rename_all = "snake_case")]
pub enum SendRequest {
    Evm(EvmTransaction),
    Solana { instructions: Vec<Instruction> },
}

impl SendRequest {
    pub fn chain_family(&self) -> ChainFamily {
        match self {
            SendRequest::Evm(_) => ChainFamily::Evm,
            SendRequest::Solana { .. } => ChainFamily::Solana,
        }
    }
}

/// Where a connect attempt sent the user instead of connecting.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RedirectKind {
    InstallPage,
    Deeplink,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConnectOutcome {
    Connected { account_id: String },
    Redirected { kind: RedirectKind, target: String },
    /// The wallet was re-selected while this attempt was in flight.
    Superseded,
}

#[derive(Debug, Deserialize)]
pub struct SelectWalletParams {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SignMessageParams {
    /// Hex encoded bytes, with or without `0x`.
    pub message_hex: String,
}

#[derive(Debug, Serialize)]
pub struct SignatureOut {
    pub signature_hex: String,
}

#[derive(Debug, Deserialize)]
pub struct SignEncodedParams {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct EncodedSignatureOut {
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct SendOut {
    pub signature_or_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderRequestParams {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Deserialize, Default)]
pub struct NoParams {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shortens_long_account_ids() {
        let session = Session {
            account_id: Some("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU".into()),
            status: ConnectionStatus::Connected,
            ..Session::default()
        };
        assert_eq!(session.shortened_account_id().as_deref(), Some("7xKX..gAsU"));
    }

    #[test]
    fn short_account_ids_are_kept() {
        assert_eq!(shorten("abc"), "abc");
    }

    #[test]
    fn send_request_is_tagged_by_family() {
        let request: SendRequest = serde_json::from_value(json!({
            "chain_family": "solana",
            "instructions": [{ "type": "transfer", "to": "abc", "lamports": 1000 }]
        }))
        .unwrap();
        assert_eq!(request.chain_family(), ChainFamily::Solana);
        assert_eq!(
            request,
            SendRequest::Solana {
                instructions: vec![Instruction::transfer("abc", 1000)]
            }
        );

        let request: SendRequest = serde_json::from_value(json!({
            "chain_family": "evm",
            "to": "0x0000000000000000000000000000000000000001",
            "value": "0x0"
        }))
        .unwrap();
        assert_eq!(request.chain_family(), ChainFamily::Evm);
    }

    #[test]
    fn only_installed_is_ready() {
        assert!(ReadyState::Installed.is_ready());
        assert!(!ReadyState::Loadable.is_ready());
        assert!(!ReadyState::NotDetected.is_ready());
        assert!(!ReadyState::Unsupported.is_ready());
    }
}
