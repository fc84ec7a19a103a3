use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult, ProviderRejection},
    implementations::dispatch::ProviderPayload,
    types::{ChainFamily, ProviderId, ReadyState, WalletDescriptor},
};

mod defaults;

pub type ProviderResult<T> = Result<T, ProviderRejection>;

/// Primitives every wallet provider exposes over its own wire protocol.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Polled on every registry listing; extensions come and go at runtime.
    fn ready_state(&self) -> ReadyState;

    async fn connect(&self) -> ProviderResult<String>;

    async fn disconnect(&self) -> ProviderResult<()>;

    async fn sign_message(&self, message: &[u8]) -> ProviderResult<Vec<u8>>;

    /// Evm providers send and return a transaction hash. Solana providers sign
    /// and return the signature without submitting.
    async fn send(&self, payload: ProviderPayload) -> ProviderResult<String>;

    async fn request(&self, method: &str, _params: Value) -> ProviderResult<Value> {
        Err(ProviderRejection::unsupported(method))
    }
}

/// Static part of a registered wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletInfo {
    pub name: String,
    pub icon: String,
    pub url: Option<String>,
    pub chain_family: ChainFamily,
    pub identity: ProviderId,
}

impl WalletInfo {
    pub fn new(
        name: impl Into<String>,
        identity: ProviderId,
        chain_family: ChainFamily,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            url: None,
            chain_family,
            identity,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

struct WalletEntry {
    info: WalletInfo,
    provider: Arc<dyn WalletProvider>,
}

impl WalletEntry {
    fn describe(&self) -> WalletDescriptor {
        WalletDescriptor {
            name: self.info.name.clone(),
            icon: self.info.icon.clone(),
            url: self.info.url.clone(),
            ready_state: self.provider.ready_state(),
            chain_family: self.info.chain_family,
            identity: self.info.identity,
        }
    }
}

/// Registration-ordered list of wallet providers.
#[derive(Default)]
pub struct WalletRegistry {
    entries: Vec<WalletEntry>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the bundled wallets, asking `factory` for each provider.
    pub fn with_defaults<F>(factory: F) -> AppResult<Self>
    where
        F: FnMut(&WalletInfo) -> Arc<dyn WalletProvider>,
    {
        let mut registry = Self::new();
        defaults::populate_defaults(&mut registry, factory)?;
        Ok(registry)
    }

    pub fn register(
        &mut self,
        info: WalletInfo,
        provider: Arc<dyn WalletProvider>,
    ) -> AppResult<()> {
        if self.entries.iter().any(|entry| entry.info.name == info.name) {
            return Err(AppError::InvalidInput(format!(
                "wallet already registered: {}",
                info.name
            )));
        }
        self.entries.push(WalletEntry { info, provider });
        Ok(())
    }

    /// Descriptors in registration order with freshly polled readiness.
    pub fn list(&self) -> Vec<WalletDescriptor> {
        self.entries.iter().map(WalletEntry::describe).collect()
    }

    pub fn describe(&self, name: &str) -> Option<WalletDescriptor> {
        self.entry(name).map(WalletEntry::describe)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn provider(&self, name: &str) -> AppResult<Arc<dyn WalletProvider>> {
        self.entry(name)
            .map(|entry| entry.provider.clone())
            .ok_or_else(|| AppError::InvalidInput(format!("unknown wallet: {name}")))
    }

    fn entry(&self, name: &str) -> Option<&WalletEntry> {
        self.entries.iter().find(|entry| entry.info.name == name)
    }
}
