use approx::assert_relative_eq;
use async_trait::async_trait;
use papertrader::config::TradingConfig;
use papertrader::trading::store::StoreResult;
use papertrader::trading::{
    Account, AccountError, AccountManager, AccountStore, InMemoryAccountStore, LedgerError,
    VersionedAccount,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory store that yields between a read and the next write, so every
/// racer reads the same version before anyone commits
#[derive(Default)]
struct ContendedStore {
    inner: InMemoryAccountStore,
    conflicts: AtomicUsize,
}

impl ContendedStore {
    fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for ContendedStore {
    async fn load(&self, account_id: &str) -> StoreResult<Option<VersionedAccount>> {
        let loaded = self.inner.load(account_id).await;
        tokio::task::yield_now().await;
        loaded
    }

    async fn create(&self, account_id: &str, account: &Account) -> StoreResult<VersionedAccount> {
        self.inner.create(account_id, account).await
    }

    async fn compare_and_swap(
        &self,
        account_id: &str,
        expected_version: i64,
        account: &Account,
    ) -> StoreResult<VersionedAccount> {
        let result = self
            .inner
            .compare_and_swap(account_id, expected_version, account)
            .await;
        if matches!(&result, Err(e) if e.is_conflict()) {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

fn manager(
    starting_cash: f64,
    max_commit_attempts: usize,
) -> (Arc<AccountManager>, Arc<ContendedStore>) {
    let store = Arc::new(ContendedStore::default());
    let manager = Arc::new(AccountManager::new(
        store.clone(),
        &TradingConfig {
            starting_cash,
            max_commit_attempts,
            max_price_deviation_pct: None,
        },
    ));
    (manager, store)
}

#[tokio::test]
async fn test_concurrent_buys_never_overdraw() {
    // Cash for exactly 10 shares, 25 buyers racing for one share each
    let (manager, store) = manager(1_000.0, 100);
    manager.open_account("alice").await.expect("open");

    let mut handles = vec![];
    for _ in 0..25 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.buy("alice", "AAPL", 1, 100.0).await
        }));
    }

    let results = futures::future::join_all(handles).await;

    let mut filled = 0;
    let mut rejected = 0;
    for result in results {
        match result.expect("task panicked") {
            Ok(_) => filled += 1,
            Err(AccountError::Ledger(LedgerError::InsufficientFunds { .. })) => rejected += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(filled, 10);
    assert_eq!(rejected, 15);
    assert!(store.conflicts() > 0, "racers never collided");

    let account = manager.get_account("alice").await.expect("exists");
    assert_relative_eq!(account.account.cash_balance, 0.0);
    assert_eq!(account.account.position("AAPL").map(|p| p.quantity), Some(10));
    // One committed write per fill on top of the initial version
    assert_eq!(account.version, 11);
}

#[tokio::test]
async fn test_concurrent_mixed_trades_conserve_value() {
    let (manager, store) = manager(10_000.0, 100);
    manager.open_account("bob").await.expect("open");
    manager.buy("bob", "MSFT", 20, 100.0).await.expect("seed position");

    let mut handles = vec![];
    for i in 0..20 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                manager.buy("bob", "MSFT", 1, 100.0).await
            } else {
                manager.sell("bob", "MSFT", 1, 100.0).await
            }
        }));
    }

    for result in futures::future::join_all(handles).await {
        result.expect("task panicked").expect("trade commits");
    }
    assert!(store.conflicts() > 0, "racers never collided");

    // Every trade is at cost, so cash + cost basis is unchanged
    let account = manager.get_account("bob").await.expect("exists").account;
    let position = account.position("MSFT").expect("still held");
    assert_eq!(position.quantity, 20);
    assert_relative_eq!(account.cash_balance + position.cost_basis(), 10_000.0);
}

#[tokio::test]
async fn test_concurrent_first_sign_in_creates_once() {
    let (manager, _) = manager(100_000.0, 5);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.open_account("carol").await })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        let opened = result.expect("task panicked").expect("open succeeds");
        assert_eq!(opened.version, 1);
        assert_relative_eq!(opened.account.cash_balance, 100_000.0);
    }
}
