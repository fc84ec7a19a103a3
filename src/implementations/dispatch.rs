use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    implementations::{
        evm,
        registry::{WalletProvider, WalletRegistry},
        rpc::{BlockReferenceSource, Commitment},
        solana::{self, UnsignedTransaction},
    },
    types::{ChainFamily, EvmTransaction, SendRequest, Session, WalletDescriptor},
};

/// Chain specific structure passed to a provider's send primitive.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "chain_family", rename_all = "snake_case")]
pub enum ProviderPayload {
    Evm(EvmTransaction),
    Solana(UnsignedTransaction),
}

/// Connected wallet captured from the session at the start of an operation.
pub struct ActiveWallet {
    pub descriptor: WalletDescriptor,
    pub account_id: String,
    pub(crate) attempt: u64,
    provider: Arc<dyn WalletProvider>,
}

impl ActiveWallet {
    pub fn chain_family(&self) -> ChainFamily {
        self.descriptor.chain_family
    }

    fn ensure_family(&self, request: ChainFamily) -> AppResult<()> {
        let active = self.chain_family();
        if request != active {
            return Err(AppError::NetworkMismatch { request, active });
        }
        Ok(())
    }
}

/// Routes sign and send requests to the builder for the active chain family.
/// Reads the session, never writes it.
pub struct TransactionDispatcher {
    registry: Arc<WalletRegistry>,
    session: watch::Receiver<Session>,
    blocks: Arc<dyn BlockReferenceSource>,
    commitment: Commitment,
}

impl TransactionDispatcher {
    pub fn new(
        registry: Arc<WalletRegistry>,
        session: watch::Receiver<Session>,
        blocks: Arc<dyn BlockReferenceSource>,
        commitment: Commitment,
    ) -> Self {
        Self {
            registry,
            session,
            blocks,
            commitment,
        }
    }

    /// The connected wallet, or the precondition that is not met.
    pub fn active(&self) -> AppResult<ActiveWallet> {
        let session = self.session.borrow();
        let descriptor = session.active_wallet.clone().ok_or(AppError::NotSelected)?;
        let account_id = match (&session.account_id, session.is_connected()) {
            (Some(account), true) => account.clone(),
            _ => return Err(AppError::NotConnected),
        };
        let attempt = session.attempt;
        drop(session);

        let provider = self.registry.provider(&descriptor.name)?;
        Ok(ActiveWallet {
            descriptor,
            account_id,
            attempt,
            provider,
        })
    }

    pub async fn sign_message(&self, active: &ActiveWallet, message: &[u8]) -> AppResult<Vec<u8>> {
        debug!(wallet = %active.descriptor.name, len = message.len(), "sign message");
        Ok(active.provider.sign_message(message).await?)
    }

    /// Sign UTF-8 text; base58 for Solana wallets, `0x`-hex for Evm wallets.
    pub async fn sign_message_encoded(
        &self,
        active: &ActiveWallet,
        text: &str,
    ) -> AppResult<String> {
        let signature = self.sign_message(active, text.as_bytes()).await?;
        Ok(match active.chain_family() {
            ChainFamily::Evm => evm::encode_signature(&signature),
            ChainFamily::Solana => solana::encode_signature(&signature),
        })
    }

    /// Evm: transaction hash. Solana: signature of a transaction that was
    /// signed but not submitted; it says nothing about finality.
    pub async fn send(&self, active: &ActiveWallet, request: SendRequest) -> AppResult<String> {
        active.ensure_family(request.chain_family())?;

        let payload = match request {
            SendRequest::Evm(tx) => ProviderPayload::Evm(tx),
            SendRequest::Solana { instructions } => {
                let tx = solana::assemble(
                    self.blocks.as_ref(),
                    self.commitment,
                    &active.account_id,
                    instructions,
                )
                .await?;
                ProviderPayload::Solana(tx)
            }
        };

        debug!(wallet = %active.descriptor.name, family = %active.chain_family(), "dispatch send");
        Ok(active.provider.send(payload).await?)
    }

    /// Raw provider request, only meaningful for Evm wallets.
    pub async fn request(
        &self,
        active: &ActiveWallet,
        method: &str,
        params: Value,
    ) -> AppResult<Value> {
        active.ensure_family(ChainFamily::Evm)?;
        debug!(wallet = %active.descriptor.name, %method, "provider request");
        Ok(active.provider.request(method, params).await?)
    }
}
