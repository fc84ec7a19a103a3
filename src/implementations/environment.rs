use std::fmt;

use serde::Serialize;

/// Runtime category that drives the connect strategy.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    DesktopDappBrowser,
    DesktopBrowser,
    MobileDappBrowser,
    MobileBrowser,
    Pwa,
    Unknown,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Environment::DesktopDappBrowser => "desktop-dapp-browser",
            Environment::DesktopBrowser => "desktop-browser",
            Environment::MobileDappBrowser => "mobile-dapp-browser",
            Environment::MobileBrowser => "mobile-browser",
            Environment::Pwa => "pwa",
            Environment::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Read-only view of the host the orchestrator runs in.
pub trait AmbientSignals: Send + Sync {
    fn user_agent(&self) -> Option<String>;

    /// Whether a wallet injected a provider object into the page.
    fn has_injected_provider(&self) -> bool;

    fn is_standalone_display(&self) -> bool;

    /// Address of the running dapp, embedded into deeplinks.
    fn current_url(&self) -> String;
}

/// Signals supplied up front, from configuration or a test.
#[derive(Debug, Clone, Default)]
pub struct StaticSignals {
    pub user_agent: Option<String>,
    pub injected_provider: bool,
    pub standalone_display: bool,
    pub current_url: String,
}

impl StaticSignals {
    pub fn new(user_agent: impl Into<String>, current_url: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
            current_url: current_url.into(),
            ..Self::default()
        }
    }

    pub fn with_injected_provider(mut self, injected: bool) -> Self {
        self.injected_provider = injected;
        self
    }

    pub fn with_standalone_display(mut self, standalone: bool) -> Self {
        self.standalone_display = standalone;
        self
    }
}

impl AmbientSignals for StaticSignals {
    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }

    fn has_injected_provider(&self) -> bool {
        self.injected_provider
    }

    fn is_standalone_display(&self) -> bool {
        self.standalone_display
    }

    fn current_url(&self) -> String {
        self.current_url.clone()
    }
}

const MOBILE_MARKERS: [&str; 8] = [
    "android",
    "iphone",
    "ipad",
    "ipod",
    "mobile",
    "opera mini",
    "iemobile",
    "blackberry",
];

fn is_mobile(user_agent: &str) -> bool {
    let user_agent = user_agent.to_ascii_lowercase();
    MOBILE_MARKERS.iter().any(|marker| user_agent.contains(marker))
}

/// Classify the host. Pure: equal signals always give the same category.
pub fn classify(signals: &dyn AmbientSignals) -> Environment {
    let Some(user_agent) = signals.user_agent().filter(|ua| !ua.trim().is_empty()) else {
        return Environment::Unknown;
    };
    let injected = signals.has_injected_provider();

    if signals.is_standalone_display() && !injected {
        return Environment::Pwa;
    }

    match (is_mobile(&user_agent), injected) {
        (true, true) => Environment::MobileDappBrowser,
        (true, false) => Environment::MobileBrowser,
        (false, true) => Environment::DesktopDappBrowser,
        (false, false) => Environment::DesktopBrowser,
    }
}
