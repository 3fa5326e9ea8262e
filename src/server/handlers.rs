use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::{AppState, WebError};
use crate::data::validation::normalize_symbol;
use crate::orchestrator::SignalResult;
use crate::trading::{Account, TradeReceipt, Valuation};

/// Identity set by the upstream auth layer
pub const ACCOUNT_HEADER: &str = "x-account-id";

#[derive(Debug, Deserialize)]
pub struct SignalQuery {
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub quantity: u64,
    pub price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub account_id: String,
    pub version: i64,
    pub account: Account,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioView {
    pub account_id: String,
    pub version: i64,
    pub account: Account,
    pub valuation: Valuation,
}

#[derive(Clone, Copy)]
enum Side {
    Buy,
    Sell,
}

fn account_id(headers: &HeaderMap) -> Result<String, WebError> {
    headers
        .get(ACCOUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| WebError::unauthorized("Missing X-Account-Id header"))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Degradations show up in the payload, never in the status code
pub async fn get_signal(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignalQuery>,
) -> Result<Json<SignalResult>, WebError> {
    let symbol = normalize_symbol(query.symbol.as_deref().unwrap_or_default())?;
    Ok(Json(state.orchestrator.generate_signal(&symbol).await))
}

pub async fn open_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AccountView>, WebError> {
    let account_id = account_id(&headers)?;
    let opened = state.accounts.open_account(&account_id).await?;

    Ok(Json(AccountView {
        account_id,
        version: opened.version,
        account: opened.account,
    }))
}

pub async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PortfolioView>, WebError> {
    let account_id = account_id(&headers)?;
    let current = state.accounts.get_account(&account_id).await?;

    let symbols: Vec<String> = current
        .account
        .positions
        .iter()
        .map(|p| p.symbol.clone())
        .collect();
    let quotes = state.quotes.latest_quotes(&symbols).await;
    let valuation = current
        .account
        .valuation(&quotes, state.accounts.starting_cash());

    Ok(Json(PortfolioView {
        account_id,
        version: current.version,
        account: current.account,
        valuation,
    }))
}

pub async fn buy(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<TradeReceipt>, WebError> {
    let Json(request) = request?;
    trade(&state, &headers, request, Side::Buy).await
}

pub async fn sell(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<TradeReceipt>, WebError> {
    let Json(request) = request?;
    trade(&state, &headers, request, Side::Sell).await
}

async fn trade(
    state: &AppState,
    headers: &HeaderMap,
    request: TradeRequest,
    side: Side,
) -> Result<Json<TradeReceipt>, WebError> {
    let account_id = account_id(headers)?;
    let symbol = normalize_symbol(&request.symbol)?;

    // Malformed orders go straight to the ledger for its own rejection
    if request.quantity > 0 && request.price.is_finite() && request.price > 0.0 {
        state.quotes.check_trade_price(&symbol, request.price).await?;
    }

    let receipt = match side {
        Side::Buy => {
            state
                .accounts
                .buy(&account_id, &symbol, request.quantity, request.price)
                .await?
        }
        Side::Sell => {
            state
                .accounts
                .sell(&account_id, &symbol, request.quantity, request.price)
                .await?
        }
    };

    info!(
        "{} {} x{} @ ${:.2} for {}",
        match side {
            Side::Buy => "Bought",
            Side::Sell => "Sold",
        },
        symbol,
        request.quantity,
        request.price,
        account_id
    );
    Ok(Json(receipt))
}

pub async fn not_found() -> WebError {
    WebError::new(axum::http::StatusCode::NOT_FOUND, "NotFound", "No such route")
}
