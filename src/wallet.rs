use std::{
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use ethers::signers::{LocalWallet, Signer};
use serde_json::{Value, json};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult, ProviderRejection},
    implementations::{
        dispatch::ProviderPayload,
        evm,
        registry::{ProviderResult, WalletInfo, WalletProvider},
        solana,
    },
    types::{ChainFamily, ReadyState},
};

/// Optional in-process signing keys loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct LocalKeys {
    evm: Option<LocalWallet>,
    solana: Option<SigningKey>,
    chain_id: u64,
}

impl LocalKeys {
    pub fn new(evm: Option<LocalWallet>, solana: Option<SigningKey>, chain_id: u64) -> Self {
        Self {
            evm,
            solana,
            chain_id,
        }
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let evm = match config.evm_private_key.as_deref() {
            Some(key) => {
                let trimmed = key.trim().trim_start_matches("0x");
                let wallet = LocalWallet::from_str(trimmed).map_err(|err| {
                    AppError::Config(format!("failed to parse evm private key: {err}"))
                })?;
                Some(wallet)
            }
            None => None,
        };
        let solana = config
            .solana_secret_key
            .as_deref()
            .map(parse_solana_secret)
            .transpose()?;

        Ok(Self::new(evm, solana, config.evm_chain_id))
    }

    /// Provider for a registered wallet: a local signer when a key for its
    /// chain family is configured, otherwise a wallet that is not detected.
    pub fn provider_for(&self, info: &WalletInfo) -> Arc<dyn WalletProvider> {
        match (info.chain_family, &self.evm, &self.solana) {
            (ChainFamily::Evm, Some(signer), _) => {
                Arc::new(LocalEvmWallet::new(signer.clone(), self.chain_id))
            }
            (ChainFamily::Solana, _, Some(key)) => Arc::new(LocalSolanaWallet::new(key.clone())),
            _ => Arc::new(AbsentWallet::new(&info.name)),
        }
    }
}

/// Accepts a hex 32 byte seed or a base58 32/64 byte keypair export.
fn parse_solana_secret(raw: &str) -> AppResult<SigningKey> {
    let raw = raw.trim();
    let bytes = match hex::decode(raw.trim_start_matches("0x")) {
        Ok(bytes) => bytes,
        Err(_) => bs58::decode(raw)
            .into_vec()
            .map_err(|err| AppError::Config(format!("failed to decode solana secret key: {err}")))?,
    };
    let seed: [u8; 32] = match bytes.len() {
        32 | 64 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes[..32]);
            seed
        }
        other => {
            return Err(AppError::Config(format!(
                "solana secret key must be 32 or 64 bytes, got {other}"
            )));
        }
    };
    Ok(SigningKey::from_bytes(&seed))
}

fn not_authorized() -> ProviderRejection {
    ProviderRejection::new("The requested account has not been authorized by the user.")
        .with_code(4100)
}

/// Evm wallet backed by a local private key.
#[derive(Debug)]
pub struct LocalEvmWallet {
    signer: LocalWallet,
    chain_id: u64,
    connected: AtomicBool,
}

impl LocalEvmWallet {
    pub fn new(signer: LocalWallet, chain_id: u64) -> Self {
        Self {
            signer: signer.with_chain_id(chain_id),
            chain_id,
            connected: AtomicBool::new(false),
        }
    }

    pub fn account(&self) -> String {
        evm::format_account(self.signer.address())
    }

    fn ensure_connected(&self) -> ProviderResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(not_authorized())
        }
    }
}

#[async_trait]
impl WalletProvider for LocalEvmWallet {
    fn ready_state(&self) -> ReadyState {
        ReadyState::Installed
    }

    async fn connect(&self) -> ProviderResult<String> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.account())
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_message(&self, message: &[u8]) -> ProviderResult<Vec<u8>> {
        self.ensure_connected()?;
        let signature = self
            .signer
            .sign_message(message)
            .await
            .map_err(|err| ProviderRejection::new(format!("signing failed: {err}")))?;
        Ok(signature.to_vec())
    }

    /// Signs a legacy transaction and returns its hash. Nothing is broadcast.
    async fn send(&self, payload: ProviderPayload) -> ProviderResult<String> {
        self.ensure_connected()?;
        let ProviderPayload::Evm(tx) = payload else {
            return Err(ProviderRejection::new("Unrecognized chain: expected an evm transaction")
                .with_code(4902));
        };

        let typed = evm::to_typed_transaction(&tx, self.signer.address(), self.chain_id);
        let signature = self
            .signer
            .sign_transaction(&typed)
            .await
            .map_err(|err| ProviderRejection::new(format!("signing failed: {err}")))?;
        Ok(format!("{:#x}", typed.hash(&signature)))
    }

    async fn request(&self, method: &str, _params: Value) -> ProviderResult<Value> {
        match method {
            "eth_chainId" => Ok(json!(format!("0x{:x}", self.chain_id))),
            "eth_accounts" | "eth_requestAccounts" => {
                if self.connected.load(Ordering::SeqCst) {
                    Ok(json!([self.account()]))
                } else {
                    Ok(json!([]))
                }
            }
            "web3_clientVersion" => Ok(json!(concat!("wallet-hub/", env!("CARGO_PKG_VERSION")))),
            other => Err(ProviderRejection::unsupported(other)),
        }
    }
}

/// Solana wallet backed by a local ed25519 key.
#[derive(Debug)]
pub struct LocalSolanaWallet {
    key: SigningKey,
    connected: AtomicBool,
}

impl LocalSolanaWallet {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            connected: AtomicBool::new(false),
        }
    }

    pub fn account(&self) -> String {
        bs58::encode(self.key.verifying_key().to_bytes()).into_string()
    }

    fn ensure_connected(&self) -> ProviderResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderRejection::new("Wallet not connected").with_name("WalletNotConnectedError"))
        }
    }
}

#[async_trait]
impl WalletProvider for LocalSolanaWallet {
    fn ready_state(&self) -> ReadyState {
        ReadyState::Installed
    }

    async fn connect(&self) -> ProviderResult<String> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.account())
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_message(&self, message: &[u8]) -> ProviderResult<Vec<u8>> {
        self.ensure_connected()?;
        Ok(self.key.sign(message).to_bytes().to_vec())
    }

    /// Signs and returns the base58 signature; submission is left to the caller.
    async fn send(&self, payload: ProviderPayload) -> ProviderResult<String> {
        self.ensure_connected()?;
        let ProviderPayload::Solana(tx) = payload else {
            return Err(ProviderRejection::new("expected a solana transaction")
                .with_name("WalletNetworkError"));
        };
        if tx.fee_payer != self.account() {
            return Err(ProviderRejection::new("fee payer is not the connected account")
                .with_name("WalletSignTransactionError"));
        }

        let message = tx
            .message_bytes()
            .map_err(|err| ProviderRejection::new(err.to_string()))?;
        Ok(solana::encode_signature(&self.key.sign(&message).to_bytes()))
    }
}

/// Stand-in for a wallet whose extension or app is not present.
#[derive(Debug)]
pub struct AbsentWallet {
    name: String,
}

impl AbsentWallet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl WalletProvider for AbsentWallet {
    fn ready_state(&self) -> ReadyState {
        ReadyState::NotDetected
    }

    async fn connect(&self) -> ProviderResult<String> {
        Err(ProviderRejection::not_installed(&self.name))
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        Err(ProviderRejection::not_installed(&self.name))
    }

    async fn sign_message(&self, _message: &[u8]) -> ProviderResult<Vec<u8>> {
        Err(ProviderRejection::not_installed(&self.name))
    }

    async fn send(&self, _payload: ProviderPayload) -> ProviderResult<String> {
        Err(ProviderRejection::not_installed(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        implementations::solana::{CompiledInstruction, SYSTEM_PROGRAM_ID, UnsignedTransaction},
        types::{EvmTransaction, Instruction, ProviderId},
    };
    use ethers::types::{Address, U256};

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn evm_wallet() -> LocalEvmWallet {
        LocalEvmWallet::new(TEST_KEY.parse().unwrap(), 1)
    }

    #[tokio::test]
    async fn evm_wallet_requires_connection() {
        let wallet = evm_wallet();
        let err = wallet.sign_message(b"hi").await.unwrap_err();
        assert_eq!(err.code, Some(4100));

        let account = wallet.connect().await.unwrap();
        let signature = wallet.sign_message(b"hi").await.unwrap();
        assert!(evm::verify_message(&account, b"hi", &signature).unwrap());
    }

    #[tokio::test]
    async fn evm_send_returns_transaction_hash() {
        let wallet = evm_wallet();
        wallet.connect().await.unwrap();
        let tx = EvmTransaction {
            to: Address::from_low_u64_be(2),
            value: U256::zero(),
            data: None,
        };
        let hash = wallet.send(ProviderPayload::Evm(tx)).await.unwrap();
        assert!(hash.starts_with("0x"));
        assert_eq!(hash.len(), 66);
    }

    #[tokio::test]
    async fn evm_client_version_request() {
        let wallet = evm_wallet();
        let version = wallet.request("web3_clientVersion", Value::Null).await.unwrap();
        assert!(version.as_str().unwrap().starts_with("wallet-hub/"));
        assert_eq!(wallet.request("eth_accounts", Value::Null).await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn solana_wallet_signs_without_submitting() {
        let wallet = LocalSolanaWallet::new(SigningKey::from_bytes(&[3; 32]));
        let account = wallet.connect().await.unwrap();
        let recipient = bs58::encode([9u8; 32]).into_string();
        let tx = UnsignedTransaction {
            fee_payer: account.clone(),
            recent_block_reference: "abc123".into(),
            instructions: vec![CompiledInstruction {
                program_id: SYSTEM_PROGRAM_ID.into(),
                accounts: vec![account.clone(), recipient.clone()],
                instruction: Instruction::transfer(recipient, 1000),
            }],
        };

        let signature = wallet.send(ProviderPayload::Solana(tx.clone())).await.unwrap();
        let raw = bs58::decode(&signature).into_vec().unwrap();
        assert!(solana::verify_message(&account, &tx.message_bytes().unwrap(), &raw).unwrap());
    }

    #[tokio::test]
    async fn solana_wallet_rejects_foreign_fee_payer() {
        let wallet = LocalSolanaWallet::new(SigningKey::from_bytes(&[3; 32]));
        wallet.connect().await.unwrap();
        let tx = UnsignedTransaction {
            fee_payer: bs58::encode([1u8; 32]).into_string(),
            recent_block_reference: "abc123".into(),
            instructions: vec![],
        };
        assert!(wallet.send(ProviderPayload::Solana(tx)).await.is_err());
    }

    #[test]
    fn parses_solana_secrets() {
        let hex_seed = hex::encode([5u8; 32]);
        let from_hex = parse_solana_secret(&hex_seed).unwrap();
        let public = SigningKey::from_bytes(&[5u8; 32]).verifying_key().to_bytes();
        let keypair = [[5u8; 32], public].concat();
        let from_b58 = parse_solana_secret(&bs58::encode(keypair).into_string()).unwrap();
        assert_eq!(from_hex.to_bytes(), from_b58.to_bytes());
        assert!(parse_solana_secret("abcd").is_err());
    }

    #[test]
    fn keys_pick_provider_per_family() {
        let keys = LocalKeys::new(None, Some(SigningKey::from_bytes(&[1; 32])), 1);
        let phantom = WalletInfo::new("Phantom", ProviderId::Phantom, ChainFamily::Solana, "p.svg");
        let metamask = WalletInfo::new("MetaMask", ProviderId::MetaMask, ChainFamily::Evm, "m.svg");
        assert_eq!(keys.provider_for(&phantom).ready_state(), ReadyState::Installed);
        assert_eq!(keys.provider_for(&metamask).ready_state(), ReadyState::NotDetected);
    }
}
