//! Unified wallet connection orchestrator.
//!
//! One caller-facing surface ([`WalletHub`]) over wallet providers of two chain
//! families: Evm wallets that send `{to, value, data}` transactions and Solana
//! wallets that sign instruction lists anchored on a recent blockhash.
//!
//! The hub tracks the registered wallets, classifies the host environment to
//! decide between a direct connect, an install page or a mobile deeplink, and
//! routes sign and send requests to the builder for the active family.

pub mod config;
pub mod error;
pub mod implementations;
pub mod layers;
pub mod types;
pub mod wallet;

pub use self::{
    error::{AppError, AppResult, ErrorCause, ErrorResponse, ProviderRejection},
    implementations::{
        dispatch::ProviderPayload,
        environment::{AmbientSignals, Environment, StaticSignals},
        registry::{WalletInfo, WalletProvider, WalletRegistry},
        rpc::{BlockReferenceSource, Commitment, SolanaRpcClient},
        strategy::{Launcher, TracingLauncher},
    },
    layers::hub::{HubContext, WalletHub},
    types::{
        ChainFamily, ConnectOutcome, ConnectionStatus, EvmTransaction, Instruction, ProviderId,
        ReadyState, RedirectKind, SendRequest, Session, WalletDescriptor,
    },
};
