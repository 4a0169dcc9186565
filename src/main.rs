//! Faucet service binary

use clap::Parser;
use solana_faucet::api::{router, AppState};
use solana_faucet::{
    BalanceCache, FaucetConfig, FaucetDatabase, FaucetService, SolanaClient, TurnstileClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Faucet service CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server bind address
    #[arg(long)]
    server_addr: Option<String>,

    /// Solana RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Path to the funding wallet keypair file
    #[arg(long)]
    wallet_path: Option<String>,

    /// Amount to send per request (in SOL)
    #[arg(long)]
    amount: Option<f64>,

    /// Claim cooldown (seconds)
    #[arg(long)]
    cooldown: Option<u64>,

    /// Database path
    #[arg(long)]
    db_path: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = if args.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Solana faucet service v{}", env!("CARGO_PKG_VERSION"));

    let mut config = FaucetConfig::from_env();

    if let Some(addr) = args.server_addr {
        config.server_addr = addr;
    }
    if let Some(rpc_url) = args.rpc_url {
        config.rpc_url = rpc_url;
    }
    if let Some(path) = args.wallet_path {
        config.wallet_path = path;
    }
    if let Some(amount) = args.amount {
        config.amount_per_request = amount;
    }
    if let Some(cooldown) = args.cooldown {
        config.claim_cooldown_secs = cooldown;
    }
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }

    info!("Configuration:");
    info!("  Server address: {}", config.server_addr);
    info!("  RPC URL: {}", config.rpc_url);
    info!("  Amount per request: {} SOL", config.amount_per_request);
    info!("  Claim cooldown: {}s", config.claim_cooldown_secs);
    info!(
        "  Turnstile: {}",
        if config.turnstile_secret.is_empty() {
            "disabled"
        } else {
            "enabled"
        }
    );

    let database = Arc::new(FaucetDatabase::new(&config.db_path)?);
    info!("Database initialized at: {}", config.db_path);

    let distributor = Arc::new(SolanaClient::new(
        config.rpc_url.clone(),
        &config.wallet_path,
        config.rpc_timeout(),
    )?);
    let verifier = Arc::new(TurnstileClient::new(config.turnstile_secret.clone()));

    let balance = Arc::new(BalanceCache::new(distributor.clone()));
    let service = Arc::new(FaucetService::new(
        config.clone(),
        database.clone(),
        distributor,
        verifier,
    ));

    let state = AppState {
        service,
        balance,
        database,
    };

    let cors = if config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers(Any)
    };

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors);

    let addr: SocketAddr = config.server_addr.parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutting down gracefully");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
