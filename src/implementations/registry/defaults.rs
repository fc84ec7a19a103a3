use std::sync::Arc;

use serde::Deserialize;
use serde_json::from_str;

use crate::{
    error::{AppError, AppResult},
    types::{ChainFamily, ProviderId},
};

use super::{WalletInfo, WalletProvider, WalletRegistry};

#[derive(Debug, Deserialize)]
struct WalletDefaultsEntry {
    name: String,
    identity: ProviderId,
    chain_family: ChainFamily,
    icon: String,
    #[serde(default)]
    url: Option<String>,
}

const DEFAULTS_JSON: &str = include_str!("../../../config/wallet_defaults.json");

pub(crate) fn populate_defaults<F>(registry: &mut WalletRegistry, mut factory: F) -> AppResult<()>
where
    F: FnMut(&WalletInfo) -> Arc<dyn WalletProvider>,
{
    let entries: Vec<WalletDefaultsEntry> = from_str(DEFAULTS_JSON)
        .map_err(|err| AppError::Config(format!("failed to parse wallet_defaults.json: {err}")))?;

    for entry in entries {
        let mut info = WalletInfo::new(entry.name, entry.identity, entry.chain_family, entry.icon);
        info.url = entry.url;
        let provider = factory(&info);
        registry.register(info, provider)?;
    }

    Ok(())
}
