use anyhow::{Context, Result};

use papertrader::db::Database;
use papertrader::Config;

pub async fn execute(config: &Config) -> Result<()> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;

    let db = Database::new(url, &config.database).await?;
    db.run_migrations().await?;

    println!("Database migrations completed successfully");
    Ok(())
}
