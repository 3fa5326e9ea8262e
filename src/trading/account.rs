// Account Manager
// Serializes ledger operations against the account store.
// Each trade is a read-modify-write that only commits if nobody else
// committed in between, so concurrent trades can never overdraw cash.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, Instrument};

use super::ledger::{Account, LedgerError};
use super::retry::retry_on_conflict;
use super::store::{AccountStore, StoreError, VersionedAccount};
use crate::config::TradingConfig;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Account {0} not found")]
    NotFound(String),

    #[error("Gave up on account {account_id} after {attempts} conflicting attempts")]
    RetriesExhausted { account_id: String, attempts: usize },

    #[error(transparent)]
    Store(StoreError),
}

impl AccountError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AccountError::Store(e) if e.is_conflict())
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AccountError::NotFound(id),
            other => AccountError::Store(other),
        }
    }
}

/// Committed account state after a trade
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeReceipt {
    pub account: Account,
    pub version: i64,
    /// Only set for sells
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<f64>,
}

pub struct AccountManager {
    store: Arc<dyn AccountStore>,
    starting_cash: f64,
    max_commit_attempts: usize,
}

impl AccountManager {
    pub fn new(store: Arc<dyn AccountStore>, config: &TradingConfig) -> Self {
        Self {
            store,
            starting_cash: config.starting_cash,
            max_commit_attempts: config.max_commit_attempts,
        }
    }

    pub fn starting_cash(&self) -> f64 {
        self.starting_cash
    }

    /// Return the account, creating it with starting cash on first use
    pub async fn open_account(&self, account_id: &str) -> Result<VersionedAccount, AccountError> {
        if let Some(existing) = self.store.load(account_id).await? {
            return Ok(existing);
        }

        match self
            .store
            .create(account_id, &Account::new(self.starting_cash))
            .await
        {
            Ok(created) => {
                info!(
                    "Opened account {} with ${:.2}",
                    account_id, self.starting_cash
                );
                Ok(created)
            }
            // Lost a first-use race; the other request created it
            Err(StoreError::AlreadyExists(_)) => self.get_account(account_id).await,
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_account(&self, account_id: &str) -> Result<VersionedAccount, AccountError> {
        self.store
            .load(account_id)
            .await?
            .ok_or_else(|| AccountError::NotFound(account_id.to_string()))
    }

    pub async fn buy(
        &self,
        account_id: &str,
        symbol: &str,
        quantity: u64,
        price: f64,
    ) -> Result<TradeReceipt, AccountError> {
        let span = tracing::info_span!("buy", account_id, symbol, quantity, price);
        self.commit(account_id, |account| {
            Ok((account.apply_buy(symbol, quantity, price)?, None))
        })
        .instrument(span)
        .await
    }

    pub async fn sell(
        &self,
        account_id: &str,
        symbol: &str,
        quantity: u64,
        price: f64,
    ) -> Result<TradeReceipt, AccountError> {
        let span = tracing::info_span!("sell", account_id, symbol, quantity, price);
        self.commit(account_id, |account| {
            let outcome = account.apply_sell(symbol, quantity, price)?;
            Ok((outcome.account, Some(outcome.realized_pnl)))
        })
        .instrument(span)
        .await
    }

    /// Load, apply `op`, compare-and-swap; repeat from a fresh read on conflict
    async fn commit<F>(&self, account_id: &str, op: F) -> Result<TradeReceipt, AccountError>
    where
        F: Fn(&Account) -> Result<(Account, Option<f64>), LedgerError>,
    {
        let op = &op;
        let result = retry_on_conflict(
            account_id,
            move || async move {
                let current = self.get_account(account_id).await?;
                let (next, realized_pnl) = op(&current.account)?;
                let committed = self
                    .store
                    .compare_and_swap(account_id, current.version, &next)
                    .await?;

                Ok::<_, AccountError>(TradeReceipt {
                    account: committed.account,
                    version: committed.version,
                    realized_pnl,
                })
            },
            self.max_commit_attempts,
        )
        .await;

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(AccountError::Ledger(e)) => {
                info!("Trade rejected: {}", e);
                return Err(AccountError::Ledger(e));
            }
            Err(e) => return Err(e),
        };

        info!(
            "Committed version {}, cash ${:.2}",
            receipt.version, receipt.account.cash_balance
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::store::{InMemoryAccountStore, StoreResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> TradingConfig {
        TradingConfig {
            starting_cash: 1_000.0,
            max_commit_attempts: 3,
            max_price_deviation_pct: None,
        }
    }

    fn manager_with(store: Arc<dyn AccountStore>) -> AccountManager {
        AccountManager::new(store, &config())
    }

    /// Store whose writes always lose the version race
    struct AlwaysConflicting {
        inner: InMemoryAccountStore,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl AccountStore for AlwaysConflicting {
        async fn load(&self, id: &str) -> StoreResult<Option<VersionedAccount>> {
            self.inner.load(id).await
        }

        async fn create(&self, id: &str, account: &Account) -> StoreResult<VersionedAccount> {
            self.inner.create(id, account).await
        }

        async fn compare_and_swap(
            &self,
            id: &str,
            expected_version: i64,
            _account: &Account,
        ) -> StoreResult<VersionedAccount> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict {
                account_id: id.to_string(),
                expected_version,
            })
        }
    }

    #[tokio::test]
    async fn test_open_account_is_idempotent() {
        let manager = manager_with(Arc::new(InMemoryAccountStore::new()));
        let first = manager.open_account("alice").await.expect("open");
        assert_eq!(first.account.cash_balance, 1_000.0);

        manager.buy("alice", "AAPL", 1, 100.0).await.expect("buy");

        let again = manager.open_account("alice").await.expect("open");
        assert_eq!(again.account.cash_balance, 900.0);
        assert_eq!(again.version, 2);
    }

    #[tokio::test]
    async fn test_trade_on_unknown_account() {
        let manager = manager_with(Arc::new(InMemoryAccountStore::new()));
        let err = manager
            .buy("nobody", "AAPL", 1, 10.0)
            .await
            .expect_err("unknown account");
        assert!(matches!(err, AccountError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ledger_rejection_leaves_account_untouched() {
        let manager = manager_with(Arc::new(InMemoryAccountStore::new()));
        manager.open_account("alice").await.expect("open");

        let err = manager
            .buy("alice", "AAPL", 100, 100.0)
            .await
            .expect_err("too expensive");
        assert!(matches!(
            err,
            AccountError::Ledger(LedgerError::InsufficientFunds { .. })
        ));

        let current = manager.get_account("alice").await.expect("exists");
        assert_eq!(current.version, 1);
        assert_eq!(current.account.cash_balance, 1_000.0);
    }

    #[tokio::test]
    async fn test_sell_reports_realized_pnl() {
        let manager = manager_with(Arc::new(InMemoryAccountStore::new()));
        manager.open_account("alice").await.expect("open");
        manager.buy("alice", "AAPL", 4, 100.0).await.expect("buy");

        let receipt = manager.sell("alice", "AAPL", 2, 130.0).await.expect("sell");
        assert_eq!(receipt.realized_pnl, Some(60.0));
        assert_eq!(receipt.account.cash_balance, 860.0);
        assert_eq!(receipt.account.position("AAPL").map(|p| p.quantity), Some(2));
    }

    #[tokio::test]
    async fn test_conflicts_exhaust_retries() {
        let store = Arc::new(AlwaysConflicting {
            inner: InMemoryAccountStore::new(),
            writes: AtomicUsize::new(0),
        });
        let manager = manager_with(store.clone());
        manager.open_account("alice").await.expect("open");

        let err = manager
            .buy("alice", "AAPL", 1, 10.0)
            .await
            .expect_err("never commits");

        assert!(matches!(
            err,
            AccountError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    }
}
