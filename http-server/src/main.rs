use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use wallet::{AccountStore, AuthService, WalletConfig, WalletService};

mod error;
mod middleware;
mod routes;

use routes::users::{login, signup};
use routes::wallets::{deposit, get_balance, get_transactions, update, withdraw};

// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub wallet: WalletService,
}

impl AppState {
    pub fn new(store: Arc<dyn AccountStore>, config: &WalletConfig) -> Self {
        Self {
            auth: AuthService::new(store.clone(), config),
            wallet: WalletService::new(store, config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/wallet", get(get_balance))
        .route("/wallet/transactions", get(get_transactions))
        .route("/wallet/deposit", post(deposit))
        .route("/wallet/withdraw", post(withdraw))
        .route("/wallet/update", post(update))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = WalletConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    let store = wallet::store::open(&config.database_url)?;
    let state = AppState::new(store.clone(), &config);

    let listener = tokio::net::TcpListener::bind(config.address()).await?;
    tracing::info!("Server running on http://{}", config.address());
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.flush()?;
    tracing::info!("Account store flushed, shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// Root endpoint
async fn root() -> &'static str {
    "Wallet API - POST /signup, POST /login, GET /wallet, POST /wallet/deposit, POST /wallet/withdraw, POST /wallet/update"
}
