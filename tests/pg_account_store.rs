use papertrader::config::DatabaseConfig;
use papertrader::db::Database;
use papertrader::trading::{Account, AccountStore, PgAccountStore, StoreError};
use uuid::Uuid;

async fn setup_store() -> PgAccountStore {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/papertrader".to_string());

    let db = Database::new(
        &database_url,
        &DatabaseConfig {
            url: Some(database_url.clone()),
            max_connections: 5,
            min_connections: 1,
        },
    )
    .await
    .expect("Failed to connect to test database");
    db.run_migrations().await.expect("migrations apply");

    PgAccountStore::new(db.pool)
}

#[tokio::test]
#[ignore] // Requires a running PostgreSQL
async fn test_pg_compare_and_swap() {
    let store = setup_store().await;
    let id = format!("test-{}", Uuid::new_v4());

    let created = store.create(&id, &Account::new(1_000.0)).await.expect("create");
    assert_eq!(created.version, 1);
    assert!(matches!(
        store.create(&id, &Account::new(5.0)).await,
        Err(StoreError::AlreadyExists(_))
    ));

    let bought = created
        .account
        .apply_buy("AAPL", 2, 100.0)
        .expect("affordable");
    let v2 = store
        .compare_and_swap(&id, created.version, &bought)
        .await
        .expect("current version commits");
    assert_eq!(v2.version, 2);

    let stale = store
        .compare_and_swap(&id, created.version, &created.account)
        .await
        .expect_err("stale version rejected");
    assert!(stale.is_conflict());

    let loaded = store.load(&id).await.expect("load").expect("exists");
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.account.cash_balance, 800.0);
    assert_eq!(loaded.account.positions.len(), 1);

    assert!(matches!(
        store.compare_and_swap("missing-account", 1, &bought).await,
        Err(StoreError::NotFound(_))
    ));
}
