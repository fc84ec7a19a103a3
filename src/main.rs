use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wallet_hub::{
    HubContext, SolanaRpcClient, StaticSignals, TracingLauncher, WalletHub, WalletRegistry,
    config::AppConfig, error::AppResult, layers::stdio::StdioServer, wallet::LocalKeys,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("fatal error: {err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    init_tracing();

    info!("loading configuration");
    let config = AppConfig::load()?;

    info!("loading local signing keys");
    let keys = LocalKeys::from_config(&config)?;
    let registry = Arc::new(WalletRegistry::with_defaults(|info| keys.provider_for(info))?);
    info!(wallets = registry.len(), "wallet registry ready");

    info!("connecting to solana rpc");
    let blocks = Arc::new(SolanaRpcClient::from_url(&config.solana_rpc_url)?);

    let signals = StaticSignals {
        user_agent: config.user_agent.clone(),
        injected_provider: config.injected_provider,
        standalone_display: config.standalone_display,
        current_url: config.dapp_url.clone(),
    };

    let ctx = HubContext::new(registry, Arc::new(signals), Arc::new(TracingLauncher), blocks)
        .with_commitment(config.commitment)
        .with_connect_timeout(config.connect_timeout());
    let hub = WalletHub::new(ctx);
    info!(environment = %hub.environment(), "environment classified");

    info!("starting stdio bridge");
    tokio::select! {
        result = StdioServer::new(hub).run_stdio() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .init();
}
