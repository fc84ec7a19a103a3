use tracing::info;

use crate::{
    implementations::environment::Environment,
    types::{ProviderId, RedirectKind, WalletDescriptor},
};

/// What a connect attempt does in a given environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStrategy {
    Connect,
    /// Connect without knowing whether the wallet can answer.
    BestEffortConnect,
    InstallPage,
    Deeplink,
}

impl ConnectStrategy {
    pub fn is_direct(self) -> bool {
        matches!(self, ConnectStrategy::Connect | ConnectStrategy::BestEffortConnect)
    }
}

pub fn plan(environment: Environment, wallet_ready: bool) -> ConnectStrategy {
    match (environment, wallet_ready) {
        (Environment::DesktopDappBrowser, true) => ConnectStrategy::Connect,
        (Environment::DesktopDappBrowser, false) => ConnectStrategy::InstallPage,
        (Environment::DesktopBrowser, _) => ConnectStrategy::InstallPage,
        (Environment::MobileDappBrowser, true) => ConnectStrategy::Connect,
        (Environment::MobileDappBrowser, false) => ConnectStrategy::BestEffortConnect,
        (Environment::MobileBrowser | Environment::Pwa, _) => ConnectStrategy::Deeplink,
        (Environment::Unknown, _) => ConnectStrategy::BestEffortConnect,
    }
}

/// Fire-and-forget navigation to an install page or wallet deeplink.
pub trait Launcher: Send + Sync {
    fn open(&self, target: &str);
}

/// Launcher for headless hosts: the target is logged and returned to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLauncher;

impl Launcher for TracingLauncher {
    fn open(&self, target: &str) {
        info!(%target, "open external wallet surface");
    }
}

/// Mobile app entry point for wallets that publish one.
pub fn deeplink_for(identity: ProviderId, current_url: &str) -> Option<String> {
    let encoded = encode_uri_component(current_url);
    match identity {
        ProviderId::MetaMask => Some(format!("metamask://dapp/{encoded}")),
        ProviderId::Phantom => Some(format!("phantom://browse/{encoded}")),
        ProviderId::Solflare => Some(format!("solflare://wallet/adapt?url={encoded}")),
        ProviderId::Trust => Some(format!("trust://open_url?url={encoded}")),
        ProviderId::Other => None,
    }
}

/// Navigation target for a redirecting strategy. `None` when the wallet has
/// neither a deeplink nor an install page.
pub fn redirect_target(
    strategy: ConnectStrategy,
    wallet: &WalletDescriptor,
    current_url: &str,
) -> Option<(RedirectKind, String)> {
    let install = || {
        wallet
            .url
            .clone()
            .map(|url| (RedirectKind::InstallPage, url))
    };
    match strategy {
        ConnectStrategy::Deeplink => deeplink_for(wallet.identity, current_url)
            .map(|link| (RedirectKind::Deeplink, link))
            .or_else(install),
        ConnectStrategy::InstallPage => install(),
        ConnectStrategy::Connect | ConnectStrategy::BestEffortConnect => None,
    }
}

/// Percent-encode everything outside `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
fn encode_uri_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
