use anyhow::{Context, Result};
use clap::Parser;
use ladder_retrace::broker::{BrokerAdapter, NoopBroker};
use ladder_retrace::dispatcher::BarDispatcher;
use ladder_retrace::store::StateStore;
use ladder_retrace::strategy::{load_strategy_configs, Strategy};
use ladder_retrace::tradovate::{TokenManager, TradovateBroker, TradovateConfig};
use ladder_retrace::types::AppState;
use ladder_retrace::api;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the per-strategy JSON configuration file
    #[arg(short, long, env = "STRATEGY_CONFIG", default_value = "strategy_config.json")]
    config: PathBuf,

    /// Path to the strategy state database
    #[arg(long, env = "STATE_DB", default_value = "trading_bot_state.db")]
    db: PathBuf,

    /// Port for the webhook server
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Contract symbol to trade
    #[arg(short, long, env = "TRADE_SYMBOL", default_value = "ESM5")]
    symbol: String,

    /// Minutes between access-token refreshes
    #[arg(long, default_value = "30")]
    token_refresh_minutes: u64,

    /// Run without a broker connection (orders always treated as filled)
    #[arg(long)]
    paper: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ladder_retrace=info".parse().unwrap())
                .add_directive("tower_http=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    info!("Starting ladder-retrace trading engine");
    info!("Strategy config: {}", args.config.display());
    info!("State database: {}", args.db.display());
    info!("Symbol: {}", args.symbol);
    info!("Port: {}", args.port);

    let mut configs = load_strategy_configs(&args.config)?;

    // IS_LONG_ONLY_TRADE forces the direction of every strategy in this
    // process when set; otherwise each config's own flag applies.
    if let Ok(raw) = std::env::var("IS_LONG_ONLY_TRADE") {
        let long_only = matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes");
        info!("IS_LONG_ONLY_TRADE={raw}: forcing all strategies to {}", if long_only { "long" } else { "short" });
        for config in &mut configs {
            config.is_trading_long = long_only;
        }
    }

    let store = Arc::new(StateStore::open(&args.db)?);

    let broker: Arc<dyn BrokerAdapter> = if args.paper {
        warn!("paper mode: broker orders are simulated");
        Arc::new(NoopBroker)
    } else {
        let tradovate = TradovateConfig::from_env()?;
        let tokens = Arc::new(TokenManager::new(
            tradovate.clone(),
            Duration::from_secs(args.token_refresh_minutes * 60),
        )?);
        tokens
            .clone()
            .start()
            .await
            .context("initial Tradovate authentication failed")?;
        Arc::new(TradovateBroker::new(&tradovate, tokens, args.symbol.clone())?)
    };

    let mut dispatcher = BarDispatcher::new();
    for config in configs {
        let mut strategy = Strategy::new(config, broker.clone(), Some(store.clone()));
        strategy.load_state();
        dispatcher.register(strategy);
    }
    if dispatcher.strategy_count() == 0 {
        warn!("no strategies configured; webhook will reject bars");
    }

    let state = Arc::new(AppState::new(dispatcher));
    let app = api::router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("webhook server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The in-flight bar (if any) completed before serve returned; finish
    // with a final save and the stats summary for every strategy.
    state.dispatcher.lock().await.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to install ctrl-c handler: {e}");
    } else {
        info!("shutdown signal received");
    }
}
