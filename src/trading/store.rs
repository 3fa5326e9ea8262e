// Account Store
// Versioned account documents with compare-and-swap writes.
// A write only lands if the version it was computed from is still current.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use super::ledger::Account;

/// Account document plus the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedAccount {
    pub account: Account,
    pub version: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Account {account_id} changed since version {expected_version}")]
    Conflict {
        account_id: String,
        expected_version: i64,
    },

    #[error("Account {0} not found")]
    NotFound(String),

    #[error("Account {0} already exists")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Account document error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn load(&self, account_id: &str) -> StoreResult<Option<VersionedAccount>>;

    /// Insert at version 1; fails with `AlreadyExists` if the id is taken
    async fn create(&self, account_id: &str, account: &Account) -> StoreResult<VersionedAccount>;

    /// Replace the document iff its version still equals `expected_version`
    async fn compare_and_swap(
        &self,
        account_id: &str,
        expected_version: i64,
        account: &Account,
    ) -> StoreResult<VersionedAccount>;
}

/// Process-local store, used by tests and by `serve` without a database
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, VersionedAccount>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn load(&self, account_id: &str) -> StoreResult<Option<VersionedAccount>> {
        Ok(self.accounts.read().await.get(account_id).cloned())
    }

    async fn create(&self, account_id: &str, account: &Account) -> StoreResult<VersionedAccount> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(account_id) {
            return Err(StoreError::AlreadyExists(account_id.to_string()));
        }
        let stored = VersionedAccount {
            account: account.clone(),
            version: 1,
        };
        accounts.insert(account_id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn compare_and_swap(
        &self,
        account_id: &str,
        expected_version: i64,
        account: &Account,
    ) -> StoreResult<VersionedAccount> {
        let mut accounts = self.accounts.write().await;
        let current = accounts
            .get_mut(account_id)
            .ok_or_else(|| StoreError::NotFound(account_id.to_string()))?;

        if current.version != expected_version {
            return Err(StoreError::Conflict {
                account_id: account_id.to_string(),
                expected_version,
            });
        }

        current.account = account.clone();
        current.version += 1;
        Ok(current.clone())
    }
}

/// Postgres-backed store: one JSONB document per account row
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn load(&self, account_id: &str) -> StoreResult<Option<VersionedAccount>> {
        let row: Option<(Json<Account>, i64)> =
            sqlx::query_as("SELECT document, version FROM accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(account), version)| VersionedAccount { account, version }))
    }

    async fn create(&self, account_id: &str, account: &Account) -> StoreResult<VersionedAccount> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (id, document, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(Json(account))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(account_id.to_string()));
        }

        tracing::info!("Created account {}", account_id);
        Ok(VersionedAccount {
            account: account.clone(),
            version: 1,
        })
    }

    async fn compare_and_swap(
        &self,
        account_id: &str,
        expected_version: i64,
        account: &Account,
    ) -> StoreResult<VersionedAccount> {
        let new_version: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET document = $3, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(account_id)
        .bind(expected_version)
        .bind(Json(account))
        .fetch_optional(&self.pool)
        .await?;

        match new_version {
            Some((version,)) => Ok(VersionedAccount {
                account: account.clone(),
                version,
            }),
            None => {
                // Zero rows: either the row is gone or someone else wrote first
                let exists: Option<(i64,)> =
                    sqlx::query_as("SELECT version FROM accounts WHERE id = $1")
                        .bind(account_id)
                        .fetch_optional(&self.pool)
                        .await?;

                match exists {
                    Some(_) => Err(StoreError::Conflict {
                        account_id: account_id.to_string(),
                        expected_version,
                    }),
                    None => Err(StoreError::NotFound(account_id.to_string())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_load() {
        let store = InMemoryAccountStore::new();
        assert!(store.load("alice").await.expect("load").is_none());

        let created = store.create("alice", &Account::new(100.0)).await.expect("create");
        assert_eq!(created.version, 1);

        let loaded = store.load("alice").await.expect("load").expect("exists");
        assert_eq!(loaded, created);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = InMemoryAccountStore::new();
        store.create("alice", &Account::new(100.0)).await.expect("create");
        let err = store
            .create("alice", &Account::new(5.0))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_compare_and_swap_detects_stale_version() {
        let store = InMemoryAccountStore::new();
        let v1 = store.create("alice", &Account::new(100.0)).await.expect("create");

        let mut updated = v1.account.clone();
        updated.cash_balance = 50.0;
        let v2 = store
            .compare_and_swap("alice", v1.version, &updated)
            .await
            .expect("first write wins");
        assert_eq!(v2.version, 2);

        let err = store
            .compare_and_swap("alice", v1.version, &v1.account)
            .await
            .expect_err("stale write");
        assert!(err.is_conflict());

        let current = store.load("alice").await.expect("load").expect("exists");
        assert_eq!(current.account.cash_balance, 50.0);
    }

    #[tokio::test]
    async fn test_compare_and_swap_missing_account() {
        let store = InMemoryAccountStore::new();
        let err = store
            .compare_and_swap("ghost", 1, &Account::new(1.0))
            .await
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
