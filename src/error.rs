use ethers::providers::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{fmt, io, time::Duration};
use thiserror::Error;

use crate::types::ChainFamily;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no wallet selected")]
    NotSelected,
    #[error("wallet not installed: {0}")]
    NotInstalled(String),
    #[error("request rejected: {0}")]
    UserRejected(String),
    #[error("network mismatch: request targets {request} but active wallet is {active}")]
    NetworkMismatch {
        request: ChainFamily,
        active: ChainFamily,
    },
    #[error("wrong network: {0}")]
    WrongNetwork(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("wallet is not connected")]
    NotConnected,
    #[error("a connection attempt is already in progress")]
    ConnectInProgress,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Origin of a failure as shown to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCause {
    ProviderRejected,
    NotInstalled,
    NetworkMismatch,
    Unknown,
}

/// Reason-bearing failure published on the session. Overwritten, never queued.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub reason: String,
    pub cause: Option<ErrorCause>,
}

impl ErrorResponse {
    pub fn new(reason: impl Into<String>, cause: ErrorCause) -> Self {
        Self {
            reason: reason.into(),
            cause: Some(cause),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Raw failure reported by a wallet provider primitive.
///
/// Evm providers report EIP-1193 numeric codes, Solana adapters report an
/// error `name`; either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Error)]
#[error("{message}")]
pub struct ProviderRejection {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ProviderRejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn user_rejected() -> Self {
        Self::new("User rejected the request.").with_code(EIP1193_USER_REJECTED)
    }

    pub fn not_installed(wallet: &str) -> Self {
        Self::new(format!("{wallet} is not installed")).with_name("WalletNotReadyError")
    }

    pub fn unsupported(operation: &str) -> Self {
        Self::new(format!("{operation} is not supported by this wallet"))
            .with_code(EIP1193_UNSUPPORTED_METHOD)
    }

    pub fn timed_out(after: Duration) -> Self {
        Self::new(format!("wallet did not respond within {}s", after.as_secs_f32()))
            .with_name("WalletTimeoutError")
    }
}

const EIP1193_USER_REJECTED: i64 = 4001;
const EIP1193_UNAUTHORIZED: i64 = 4100;
const EIP1193_UNSUPPORTED_METHOD: i64 = 4200;
const EIP1193_CHAIN_DISCONNECTED: i64 = 4901;
const EIP3085_UNRECOGNIZED_CHAIN: i64 = 4902;

fn classify(raw: &ProviderRejection) -> ErrorCause {
    match raw.code {
        Some(EIP1193_USER_REJECTED | EIP1193_UNAUTHORIZED) => return ErrorCause::ProviderRejected,
        Some(EIP1193_CHAIN_DISCONNECTED | EIP3085_UNRECOGNIZED_CHAIN) => {
            return ErrorCause::NetworkMismatch;
        }
        _ => {}
    }

    if let Some(name) = raw.name.as_deref() {
        match name {
            "WalletNotReadyError" | "WalletNotFoundError" | "WalletNotInstalledError" => {
                return ErrorCause::NotInstalled;
            }
            "WalletNetworkError" => return ErrorCause::NetworkMismatch,
            _ => {}
        }
    }

    let message = raw.message.to_lowercase();
    if ["user rejected", "user denied", "declined", "rejected the request"]
        .iter()
        .any(|needle| message.contains(needle))
    {
        ErrorCause::ProviderRejected
    } else if ["not installed", "not detected"]
        .iter()
        .any(|needle| message.contains(needle))
    {
        ErrorCause::NotInstalled
    } else if ["wrong network", "network mismatch", "unrecognized chain"]
        .iter()
        .any(|needle| message.contains(needle))
    {
        ErrorCause::NetworkMismatch
    } else {
        ErrorCause::Unknown
    }
}

/// Map a provider specific failure into the caller-facing shape.
pub fn normalize(raw: &ProviderRejection) -> ErrorResponse {
    let reason = if raw.message.is_empty() {
        raw.name
            .clone()
            .unwrap_or_else(|| "wallet request failed".to_string())
    } else {
        raw.message.clone()
    };
    ErrorResponse::new(reason, classify(raw))
}

impl From<ProviderRejection> for AppError {
    fn from(raw: ProviderRejection) -> Self {
        let response = normalize(&raw);
        match response.cause {
            Some(ErrorCause::ProviderRejected) => AppError::UserRejected(response.reason),
            Some(ErrorCause::NotInstalled) => AppError::NotInstalled(response.reason),
            Some(ErrorCause::NetworkMismatch) => AppError::WrongNetwork(response.reason),
            _ if raw.code.is_none() && raw.name.is_none() && raw.message.is_empty() => {
                AppError::Unknown(response.reason)
            }
            _ => AppError::Provider(response.reason),
        }
    }
}

#[derive(Debug)]
pub struct JsonRpcErrorPayload {
    pub code: i32,
    pub message: String,
    pub data: Value,
}

impl JsonRpcErrorPayload {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: json!({}),
        }
    }

    fn with_response(mut self, response: &ErrorResponse) -> Self {
        self.data = json!({ "reason": response.reason, "cause": response.cause });
        self
    }
}

impl AppError {
    /// True for failures detected before any provider or RPC call was made.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            AppError::NotSelected
                | AppError::NotConnected
                | AppError::ConnectInProgress
                | AppError::NetworkMismatch { .. }
                | AppError::InvalidInput(_)
        )
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let cause = match self {
            AppError::NotInstalled(_) => ErrorCause::NotInstalled,
            AppError::UserRejected(_) => ErrorCause::ProviderRejected,
            AppError::NetworkMismatch { .. } | AppError::WrongNetwork(_) => {
                ErrorCause::NetworkMismatch
            }
            _ => ErrorCause::Unknown,
        };
        let reason = match self {
            AppError::NotInstalled(msg)
            | AppError::UserRejected(msg)
            | AppError::WrongNetwork(msg)
            | AppError::Provider(msg)
            | AppError::Unknown(msg) => msg.clone(),
            other => other.to_string(),
        };
        ErrorResponse::new(reason, cause)
    }

    pub fn to_json_rpc(&self) -> JsonRpcErrorPayload {
        let code = match self {
            AppError::NotSelected => -32010,
            AppError::NotConnected => -32011,
            AppError::ConnectInProgress => -32012,
            AppError::NotInstalled(_) => -32013,
            AppError::UserRejected(_) => 4001,
            AppError::NetworkMismatch { .. } | AppError::WrongNetwork(_) => -32014,
            AppError::Provider(_) => -32020,
            AppError::Config(_) => -32001,
            AppError::InvalidInput(_) => -32602,
            AppError::Rpc(_) => -32002,
            AppError::Io(_) => -32040,
            AppError::Serialization(_) => -32700,
            AppError::Unknown(_) => -32603,
        };
        JsonRpcErrorPayload::new(code, self.to_string()).with_response(&self.to_error_response())
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::Rpc(err.to_string())
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl fmt::Display for JsonRpcErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}
