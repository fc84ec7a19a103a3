#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::oneshot;
use wallet_hub::{
    AppResult, BlockReferenceSource, ChainFamily, Commitment, HubContext, Launcher, ProviderId,
    ProviderPayload, ProviderRejection, ReadyState, StaticSignals, WalletHub, WalletInfo,
    WalletProvider, WalletRegistry,
};

pub const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
pub const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
pub const DAPP_URL: &str = "https://dapp.example/";

/// Scriptable provider that counts every primitive call.
pub struct MockWallet {
    ready: Mutex<ReadyState>,
    account: String,
    connect_error: Mutex<Option<ProviderRejection>>,
    connect_gate: Mutex<Option<oneshot::Receiver<()>>>,
    disconnect_error: Mutex<Option<ProviderRejection>>,
    sign_error: Mutex<Option<ProviderRejection>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub signs: AtomicUsize,
    pub sends: AtomicUsize,
    pub sent: Mutex<Vec<ProviderPayload>>,
}

impl MockWallet {
    pub fn new(account: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            ready: Mutex::new(ReadyState::Installed),
            account: account.into(),
            connect_error: Mutex::new(None),
            connect_gate: Mutex::new(None),
            disconnect_error: Mutex::new(None),
            sign_error: Mutex::new(None),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            signs: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_ready(&self, state: ReadyState) {
        *self.ready.lock().unwrap() = state;
    }

    pub fn fail_connect(&self, rejection: ProviderRejection) {
        *self.connect_error.lock().unwrap() = Some(rejection);
    }

    pub fn clear_connect_failure(&self) {
        *self.connect_error.lock().unwrap() = None;
    }

    pub fn fail_disconnect(&self, rejection: ProviderRejection) {
        *self.disconnect_error.lock().unwrap() = Some(rejection);
    }

    pub fn fail_sign(&self, rejection: ProviderRejection) {
        *self.sign_error.lock().unwrap() = Some(rejection);
    }

    /// The next connect suspends until the returned sender fires.
    pub fn gate_connect(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.connect_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn provider_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
            + self.disconnects.load(Ordering::SeqCst)
            + self.signs.load(Ordering::SeqCst)
            + self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn ready_state(&self) -> ReadyState {
        *self.ready.lock().unwrap()
    }

    async fn connect(&self) -> Result<String, ProviderRejection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let gate = self.connect_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self.connect_error.lock().unwrap().clone() {
            Some(rejection) => Err(rejection),
            None => Ok(self.account.clone()),
        }
    }

    async fn disconnect(&self) -> Result<(), ProviderRejection> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        match self.disconnect_error.lock().unwrap().clone() {
            Some(rejection) => Err(rejection),
            None => Ok(()),
        }
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, ProviderRejection> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        match self.sign_error.lock().unwrap().clone() {
            Some(rejection) => Err(rejection),
            None => Ok(message.iter().rev().copied().collect()),
        }
    }

    async fn send(&self, payload: ProviderPayload) -> Result<String, ProviderRejection> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(payload);
        Ok("signature-1".to_string())
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub opened: Mutex<Vec<String>>,
}

impl Launcher for RecordingLauncher {
    fn open(&self, target: &str) {
        self.opened.lock().unwrap().push(target.to_string());
    }
}

impl RecordingLauncher {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

pub struct FixedBlocks {
    pub blockhash: String,
    pub calls: AtomicUsize,
}

impl FixedBlocks {
    pub fn new(blockhash: &str) -> Arc<Self> {
        Arc::new(Self {
            blockhash: blockhash.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockReferenceSource for FixedBlocks {
    async fn recent_block_reference(&self, _commitment: Commitment) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.blockhash.clone())
    }
}

pub fn info(name: &str, identity: ProviderId, family: ChainFamily) -> WalletInfo {
    WalletInfo::new(name, identity, family, format!("https://icons.example/{name}.svg"))
        .with_url(format!("https://wallets.example/{name}/install"))
}

pub fn desktop_extension() -> StaticSignals {
    StaticSignals::new(DESKTOP_UA, DAPP_URL).with_injected_provider(true)
}

pub fn desktop_plain() -> StaticSignals {
    StaticSignals::new(DESKTOP_UA, DAPP_URL)
}

pub fn mobile_in_app_browser() -> StaticSignals {
    StaticSignals::new(IPHONE_UA, DAPP_URL).with_injected_provider(true)
}

pub fn mobile_browser() -> StaticSignals {
    StaticSignals::new(IPHONE_UA, DAPP_URL)
}

pub struct Harness {
    pub hub: WalletHub,
    pub launcher: Arc<RecordingLauncher>,
    pub blocks: Arc<FixedBlocks>,
}

pub fn entry<P: WalletProvider + 'static>(
    info: WalletInfo,
    provider: Arc<P>,
) -> (WalletInfo, Arc<dyn WalletProvider>) {
    (info, provider)
}

pub fn harness(
    wallets: Vec<(WalletInfo, Arc<dyn WalletProvider>)>,
    signals: StaticSignals,
) -> Harness {
    harness_with_timeout(wallets, signals, None)
}

pub fn harness_with_timeout(
    wallets: Vec<(WalletInfo, Arc<dyn WalletProvider>)>,
    signals: StaticSignals,
    connect_timeout: Option<Duration>,
) -> Harness {
    let mut registry = WalletRegistry::new();
    for (info, provider) in wallets {
        registry.register(info, provider).unwrap();
    }
    let launcher = Arc::new(RecordingLauncher::default());
    let blocks = FixedBlocks::new("abc123");
    let ctx = HubContext::new(
        Arc::new(registry),
        Arc::new(signals),
        launcher.clone(),
        blocks.clone(),
    )
    .with_connect_timeout(connect_timeout);
    Harness {
        hub: WalletHub::new(ctx),
        launcher,
        blocks,
    }
}
