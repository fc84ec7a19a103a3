use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::{
    error::AppResult,
    implementations::{
        connection::ConnectionManager,
        dispatch::{ActiveWallet, TransactionDispatcher},
        environment::{self, AmbientSignals, Environment},
        registry::WalletRegistry,
        rpc::{BlockReferenceSource, Commitment},
        strategy::Launcher,
    },
    types::{ConnectOutcome, SendRequest, Session, WalletDescriptor},
};

/// Collaborators the hub is wired with.
#[derive(Clone)]
pub struct HubContext {
    pub registry: Arc<WalletRegistry>,
    pub signals: Arc<dyn AmbientSignals>,
    pub launcher: Arc<dyn Launcher>,
    pub blocks: Arc<dyn BlockReferenceSource>,
    pub commitment: Commitment,
    pub connect_timeout: Option<Duration>,
}

impl HubContext {
    pub fn new(
        registry: Arc<WalletRegistry>,
        signals: Arc<dyn AmbientSignals>,
        launcher: Arc<dyn Launcher>,
        blocks: Arc<dyn BlockReferenceSource>,
    ) -> Self {
        Self {
            registry,
            signals,
            launcher,
            blocks,
            commitment: Commitment::default(),
            connect_timeout: None,
        }
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Single caller-facing surface over every registered wallet, whatever its
/// chain family.
#[derive(Clone)]
pub struct WalletHub {
    ctx: Arc<HubContext>,
    connection: Arc<ConnectionManager>,
    dispatcher: Arc<TransactionDispatcher>,
}

impl WalletHub {
    pub fn new(ctx: HubContext) -> Self {
        let connection = ConnectionManager::new(
            ctx.registry.clone(),
            ctx.signals.clone(),
            ctx.launcher.clone(),
        )
        .with_connect_timeout(ctx.connect_timeout);
        let dispatcher = TransactionDispatcher::new(
            ctx.registry.clone(),
            connection.subscribe(),
            ctx.blocks.clone(),
            ctx.commitment,
        );

        Self {
            ctx: Arc::new(ctx),
            connection: Arc::new(connection),
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn list_wallets(&self) -> Vec<WalletDescriptor> {
        self.ctx.registry.list()
    }

    pub fn environment(&self) -> Environment {
        environment::classify(self.ctx.signals.as_ref())
    }

    pub fn session(&self) -> Session {
        self.connection.session()
    }

    /// Latest-value view of the session; overlapping updates coalesce.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.connection.subscribe()
    }

    #[instrument(skip(self))]
    pub fn select_wallet(&self, name: &str) -> AppResult<WalletDescriptor> {
        self.connection.select_wallet(name)
    }

    #[instrument(skip(self))]
    pub async fn connect(&self) -> AppResult<ConnectOutcome> {
        let outcome = self.connection.connect().await?;
        info!(?outcome, "connect finished");
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> AppResult<()> {
        self.connection.disconnect().await
    }

    #[instrument(skip(self, message), fields(len = message.len()))]
    pub async fn sign_message(&self, message: &[u8]) -> AppResult<Vec<u8>> {
        let active = self.dispatcher.active()?;
        let result = self.dispatcher.sign_message(&active, message).await;
        self.settle(&active, result)
    }

    #[instrument(skip(self, text))]
    pub async fn sign_message_encoded(&self, text: &str) -> AppResult<String> {
        let active = self.dispatcher.active()?;
        let result = self.dispatcher.sign_message_encoded(&active, text).await;
        self.settle(&active, result)
    }

    /// See [`TransactionDispatcher::send`]: a Solana signature is not a
    /// confirmation that anything reached the ledger.
    #[instrument(skip(self, request), fields(family = %request.chain_family()))]
    pub async fn send(&self, request: SendRequest) -> AppResult<String> {
        let active = self.dispatcher.active()?;
        let result = self.dispatcher.send(&active, request).await;
        let signature = self.settle(&active, result)?;
        info!(%signature, "send finished");
        Ok(signature)
    }

    #[instrument(skip(self, params))]
    pub async fn request(&self, method: &str, params: Value) -> AppResult<Value> {
        let active = self.dispatcher.active()?;
        let result = self.dispatcher.request(&active, method, params).await;
        self.settle(&active, result)
    }

    /// Collaborator failures become the session's `last_error`; precondition
    /// failures are only returned.
    fn settle<T>(&self, active: &ActiveWallet, result: AppResult<T>) -> AppResult<T> {
        if let Err(err) = &result {
            if err.is_precondition() {
                return result;
            }
            warn!(wallet = %active.descriptor.name, "wallet operation failed: {err}");
            self.connection.publish_error(active.attempt, err);
        }
        result
    }
}
