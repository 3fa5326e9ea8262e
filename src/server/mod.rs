//! HTTP surface: trading signals and the paper portfolio.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::{AccountView, PortfolioView, TradeRequest, ACCOUNT_HEADER};

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::orchestrator::{build_orchestrator, SignalOrchestrator};
use crate::trading::{
    AccountManager, AccountStore, InMemoryAccountStore, PgAccountStore, QuoteService,
};

pub struct AppState {
    pub orchestrator: Arc<SignalOrchestrator>,
    pub accounts: Arc<AccountManager>,
    pub quotes: Arc<QuoteService>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/signal", get(handlers::get_signal))
        .route("/api/portfolio", get(handlers::get_portfolio))
        .route("/api/portfolio/open", post(handlers::open_account))
        .route("/api/portfolio/buy", post(handlers::buy))
        .route("/api/portfolio/sell", post(handlers::sell))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Postgres when `DATABASE_URL` is set, otherwise a process-local store
pub async fn account_store(config: &Config) -> Result<Arc<dyn AccountStore>> {
    match &config.database.url {
        Some(url) => {
            let db = Database::new(url, &config.database).await?;
            db.run_migrations().await?;
            db.health_check().await?;
            Ok(Arc::new(PgAccountStore::new(db.pool)))
        }
        None => {
            warn!("DATABASE_URL not set; accounts are kept in memory and lost on restart");
            Ok(Arc::new(InMemoryAccountStore::new()))
        }
    }
}

/// Wire production clients and run until Ctrl-C
pub async fn serve(config: &Config) -> Result<()> {
    let orchestrator = Arc::new(build_orchestrator(config)?);
    let quotes = Arc::new(QuoteService::new(
        orchestrator.price_provider(),
        config.trading.max_price_deviation_pct,
    ));
    let accounts = Arc::new(AccountManager::new(
        account_store(config).await?,
        &config.trading,
    ));

    let app = build_router(AppState {
        orchestrator,
        accounts,
        quotes,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
