use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use papertrader::data::validation::normalize_symbol;
use papertrader::data::ChartPriceClient;
use papertrader::orchestrator::{build_orchestrator, SignalDecision};
use papertrader::server::account_store;
use papertrader::trading::{AccountManager, QuoteService};
use papertrader::Config;

#[derive(Debug, Clone, Copy)]
pub enum Side {
    Buy,
    Sell,
}

async fn account_manager(config: &Config) -> Result<AccountManager> {
    Ok(AccountManager::new(
        account_store(config).await?,
        &config.trading,
    ))
}

fn quote_service(config: &Config) -> Result<QuoteService> {
    let provider = Arc::new(ChartPriceClient::new(&config.market)?);
    Ok(QuoteService::new(
        provider,
        config.trading.max_price_deviation_pct,
    ))
}

/// Run the signal pipeline once and print the result
pub async fn signal(config: &Config, symbol: &str) -> Result<()> {
    let symbol = normalize_symbol(symbol)?;
    let orchestrator = build_orchestrator(config)?;
    let result = orchestrator.generate_signal(&symbol).await;

    println!("\n{} → {} ({})", result.symbol, result.signal, result.note);
    println!("{}", result.insight);

    if result.signal == SignalDecision::Unknown {
        info!("Signal for {} could not be computed", symbol);
    }
    Ok(())
}

pub async fn open(config: &Config, account_id: &str) -> Result<()> {
    let manager = account_manager(config).await?;
    let opened = manager
        .open_account(account_id)
        .await
        .with_context(|| format!("Failed to open account {}", account_id))?;

    println!(
        "Account {} ready: cash ${:.2}, {} positions",
        account_id,
        opened.account.cash_balance,
        opened.account.positions.len()
    );
    Ok(())
}

pub async fn trade(
    config: &Config,
    account_id: &str,
    symbol: &str,
    quantity: u64,
    price: f64,
    side: Side,
) -> Result<()> {
    let symbol = normalize_symbol(symbol)?;
    let manager = account_manager(config).await?;

    quote_service(config)?
        .check_trade_price(&symbol, price)
        .await?;

    let receipt = match side {
        Side::Buy => manager.buy(account_id, &symbol, quantity, price).await,
        Side::Sell => manager.sell(account_id, &symbol, quantity, price).await,
    }
    .with_context(|| format!("{:?} {} x{} rejected", side, symbol, quantity))?;

    println!(
        "{:?} {} x{} @ ${:.2}. Cash now ${:.2}",
        side, symbol, quantity, price, receipt.account.cash_balance
    );
    if let Some(pnl) = receipt.realized_pnl {
        println!("Realized P/L: ${:+.2}", pnl);
    }
    Ok(())
}

pub async fn portfolio(config: &Config, account_id: &str) -> Result<()> {
    let manager = account_manager(config).await?;
    let current = manager
        .get_account(account_id)
        .await
        .with_context(|| format!("Failed to load account {}", account_id))?;

    let symbols: Vec<String> = current
        .account
        .positions
        .iter()
        .map(|p| p.symbol.clone())
        .collect();
    let quotes = quote_service(config)?.latest_quotes(&symbols).await;
    let valuation = current.account.valuation(&quotes, manager.starting_cash());

    println!("\nPortfolio {}", account_id);
    println!("{:<8} {:>8} {:>12} {:>12}", "Symbol", "Qty", "Avg Cost", "Last");
    for position in &current.account.positions {
        let last = quotes
            .get(&position.symbol)
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<8} {:>8} {:>12.2} {:>12}",
            position.symbol, position.quantity, position.average_cost, last
        );
    }

    println!("\nCash:       ${:.2}", valuation.cash_balance);
    println!("Holdings:   ${:.2}", valuation.market_value);
    println!("Net worth:  ${:.2}", valuation.net_worth);
    println!(
        "Total gain: ${:+.2} ({:+.2}%)",
        valuation.total_gain, valuation.total_gain_pct
    );
    if !valuation.unpriced.is_empty() {
        println!("Valued at cost (no quote): {}", valuation.unpriced.join(", "));
    }
    Ok(())
}
