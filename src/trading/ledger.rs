// Portfolio Ledger
// Pure (account, operation) -> account transitions with cost-basis accounting.
// Persistence and concurrency live in the account store/manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    /// Always > 0; a position that reaches zero is removed
    pub quantity: u64,
    pub average_cost: f64,
    pub acquired_at: DateTime<Utc>,
}

impl Position {
    pub fn cost_basis(&self) -> f64 {
        self.quantity as f64 * self.average_cost
    }
}

/// Account document as held by the external store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub cash_balance: f64,
    /// Unique by symbol
    #[serde(default)]
    pub positions: Vec<Position>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    #[error("Price must be positive, got {price}")]
    InvalidPrice { price: f64 },

    #[error("Insufficient funds: need ${required:.2}, have ${available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("No position held in {symbol}")]
    PositionNotFound { symbol: String },

    #[error("Insufficient shares of {symbol}: requested {requested}, held {held}")]
    InsufficientShares {
        symbol: String,
        requested: u64,
        held: u64,
    },

    #[error("Position in {symbol} would exceed the maximum share count")]
    QuantityOverflow { symbol: String },
}

impl LedgerError {
    /// Stable name used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InvalidQuantity => "InvalidQuantity",
            LedgerError::InvalidPrice { .. } => "InvalidPrice",
            LedgerError::InsufficientFunds { .. } => "InsufficientFunds",
            LedgerError::PositionNotFound { .. } => "PositionNotFound",
            LedgerError::InsufficientShares { .. } => "InsufficientShares",
            LedgerError::QuantityOverflow { .. } => "QuantityOverflow",
        }
    }
}

/// New account state after a sell plus the realized P/L of that sale
#[derive(Debug, Clone, PartialEq)]
pub struct SellOutcome {
    pub account: Account,
    pub realized_pnl: f64,
}

/// Mark-to-market summary of an account
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub cash_balance: f64,
    pub market_value: f64,
    pub net_worth: f64,
    pub total_gain: f64,
    pub total_gain_pct: f64,
    /// Held symbols valued at average cost for lack of a quote
    pub unpriced: Vec<String>,
}

fn validate_order(quantity: u64, price: f64) -> Result<(), LedgerError> {
    if quantity == 0 {
        return Err(LedgerError::InvalidQuantity);
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(LedgerError::InvalidPrice { price });
    }
    Ok(())
}

impl Account {
    /// Fresh account with starting cash and no positions
    pub fn new(starting_cash: f64) -> Self {
        Self {
            cash_balance: starting_cash,
            positions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    fn position_index(&self, symbol: &str) -> Option<usize> {
        self.positions.iter().position(|p| p.symbol == symbol)
    }

    /// Buy `quantity` shares at `price`
    pub fn apply_buy(&self, symbol: &str, quantity: u64, price: f64) -> Result<Account, LedgerError> {
        self.apply_buy_at(symbol, quantity, price, Utc::now())
    }

    pub fn apply_buy_at(
        &self,
        symbol: &str,
        quantity: u64,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<Account, LedgerError> {
        validate_order(quantity, price)?;

        let total_cost = quantity as f64 * price;
        if self.cash_balance < total_cost {
            return Err(LedgerError::InsufficientFunds {
                required: total_cost,
                available: self.cash_balance,
            });
        }

        let mut next = self.clone();
        next.cash_balance = self.cash_balance - total_cost;

        match next.position_index(symbol) {
            Some(idx) => {
                let held = &mut next.positions[idx];
                let new_quantity = held.quantity.checked_add(quantity).ok_or_else(|| {
                    LedgerError::QuantityOverflow {
                        symbol: symbol.to_string(),
                    }
                })?;
                held.average_cost = (held.cost_basis() + total_cost) / new_quantity as f64;
                held.quantity = new_quantity;
                held.acquired_at = now;
            }
            None => next.positions.push(Position {
                symbol: symbol.to_string(),
                quantity,
                average_cost: price,
                acquired_at: now,
            }),
        }

        Ok(next)
    }

    /// Sell `quantity` shares at the current market `price`
    pub fn apply_sell(&self, symbol: &str, quantity: u64, price: f64) -> Result<SellOutcome, LedgerError> {
        validate_order(quantity, price)?;

        let idx = self
            .position_index(symbol)
            .ok_or_else(|| LedgerError::PositionNotFound {
                symbol: symbol.to_string(),
            })?;

        let held = &self.positions[idx];
        if quantity > held.quantity {
            return Err(LedgerError::InsufficientShares {
                symbol: symbol.to_string(),
                requested: quantity,
                held: held.quantity,
            });
        }

        let sale_value = quantity as f64 * price;
        let realized_pnl = sale_value - quantity as f64 * held.average_cost;

        let mut next = self.clone();
        next.cash_balance = self.cash_balance + sale_value;

        if quantity == held.quantity {
            next.positions.remove(idx);
        } else {
            // Cost basis of the remaining shares is untouched
            next.positions[idx].quantity -= quantity;
        }

        Ok(SellOutcome {
            account: next,
            realized_pnl,
        })
    }

    /// Value positions at `quotes` (symbol -> price); missing quotes fall back to average cost
    pub fn valuation(&self, quotes: &HashMap<String, f64>, starting_cash: f64) -> Valuation {
        let mut market_value = 0.0;
        let mut unpriced = Vec::new();

        for position in &self.positions {
            match quotes.get(&position.symbol) {
                Some(price) => market_value += position.quantity as f64 * price,
                None => {
                    market_value += position.cost_basis();
                    unpriced.push(position.symbol.clone());
                }
            }
        }

        let net_worth = self.cash_balance + market_value;
        let total_gain = net_worth - starting_cash;
        let total_gain_pct = if starting_cash > 0.0 {
            total_gain / starting_cash * 100.0
        } else {
            0.0
        };

        Valuation {
            cash_balance: self.cash_balance,
            market_value,
            net_worth,
            total_gain,
            total_gain_pct,
            unpriced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(cash: f64) -> Account {
        Account::new(cash)
    }

    #[test]
    fn test_buy_new_position() {
        let next = account(1_000.0).apply_buy("AAPL", 2, 150.0).expect("buy succeeds");
        assert_eq!(next.cash_balance, 700.0);
        let position = next.position("AAPL").expect("position exists");
        assert_eq!(position.quantity, 2);
        assert_eq!(position.average_cost, 150.0);
    }

    #[test]
    fn test_buy_exact_cash_is_allowed() {
        let next = account(300.0).apply_buy("AAPL", 2, 150.0).expect("buy succeeds");
        assert_eq!(next.cash_balance, 0.0);
    }

    #[test]
    fn test_buy_rejects_insufficient_funds() {
        let before = account(299.99);
        let err = before.apply_buy("AAPL", 2, 150.0).expect_err("should reject");
        assert_eq!(err.kind(), "InsufficientFunds");
    }

    #[test]
    fn test_buy_rejects_bad_inputs() {
        let before = account(1_000.0);
        assert_eq!(before.apply_buy("AAPL", 0, 10.0), Err(LedgerError::InvalidQuantity));
        assert!(matches!(
            before.apply_buy("AAPL", 1, 0.0),
            Err(LedgerError::InvalidPrice { .. })
        ));
        assert!(matches!(
            before.apply_buy("AAPL", 1, f64::NAN),
            Err(LedgerError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_buy_rejects_quantity_overflow() {
        let held = account(1_000.0).apply_buy("X", 10, 1e-300).expect("buy succeeds");
        let err = held.apply_buy("X", u64::MAX, 1e-300).expect_err("should reject");
        assert_eq!(
            err,
            LedgerError::QuantityOverflow {
                symbol: "X".to_string()
            }
        );
        assert_eq!(err.kind(), "QuantityOverflow");
        assert_eq!(held.position("X").map(|p| p.quantity), Some(10));
    }

    #[test]
    fn test_sell_unknown_symbol() {
        let err = account(1_000.0).apply_sell("MSFT", 1, 10.0).expect_err("should reject");
        assert_eq!(
            err,
            LedgerError::PositionNotFound {
                symbol: "MSFT".to_string()
            }
        );
    }

    #[test]
    fn test_sell_more_than_held() {
        let held = account(1_000.0).apply_buy("AAPL", 3, 100.0).expect("buy succeeds");
        let err = held.apply_sell("AAPL", 4, 120.0).expect_err("should reject");
        assert_eq!(
            err,
            LedgerError::InsufficientShares {
                symbol: "AAPL".to_string(),
                requested: 4,
                held: 3
            }
        );
    }

    #[test]
    fn test_sell_full_removes_position() {
        let held = account(1_000.0).apply_buy("AAPL", 3, 100.0).expect("buy succeeds");
        let outcome = held.apply_sell("AAPL", 3, 90.0).expect("sell succeeds");
        assert!(outcome.account.position("AAPL").is_none());
        assert_eq!(outcome.account.cash_balance, 970.0);
        assert_eq!(outcome.realized_pnl, -30.0);
    }

    #[test]
    fn test_valuation_with_missing_quote() {
        let held = account(10_000.0)
            .apply_buy("AAPL", 10, 100.0)
            .and_then(|a| a.apply_buy("MSFT", 5, 200.0))
            .expect("buys succeed");

        let quotes = HashMap::from([("AAPL".to_string(), 110.0)]);
        let valuation = held.valuation(&quotes, 10_000.0);

        assert_eq!(valuation.cash_balance, 8_000.0);
        assert_eq!(valuation.market_value, 1_100.0 + 1_000.0);
        assert_eq!(valuation.net_worth, 10_100.0);
        assert_eq!(valuation.total_gain, 100.0);
        assert!((valuation.total_gain_pct - 1.0).abs() < 1e-9);
        assert_eq!(valuation.unpriced, vec!["MSFT".to_string()]);
    }

    #[test]
    fn test_account_document_shape() {
        let held = account(500.0).apply_buy("AAPL", 1, 100.0).expect("buy succeeds");
        let json = serde_json::to_value(&held).expect("serializes");
        assert!(json.get("cashBalance").is_some());
        assert!(json.get("createdAt").is_some());
        let position = &json["positions"][0];
        assert_eq!(position["symbol"], "AAPL");
        assert_eq!(position["quantity"], 1);
        assert_eq!(position["averageCost"], 100.0);
        assert!(position.get("acquiredAt").is_some());
    }
}
