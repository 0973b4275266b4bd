use std::path::Path;
use std::str::FromStr;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};

use crate::error::StorageError;
use crate::storage::SettingsProvider;

/// Settings table in a local SQLite database, editable while the bot runs.
pub struct SqliteSettings {
    pool: SqlitePool,
}

impl SqliteSettings {
    /// Open (or create) a SQLite database at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self, Report<StorageError>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .change_context(StorageError::Migration)
                .attach_with(|| format!("cannot create data directory: {}", parent.display()))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .change_context(StorageError::Migration)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts)
            .await
            .change_context(StorageError::Migration)
            .attach_with(|| format!("database path: {}", path.display()))?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, Report<StorageError>> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .change_context(StorageError::Migration)?;
        Ok(Self { pool })
    }

    pub async fn set_number(&self, key: &str, value: f64) -> Result<(), Report<StorageError>> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .change_context(StorageError::Query)
            .attach_with(|| format!("key: {key}"))?;
        Ok(())
    }
}

impl SettingsProvider for SqliteSettings {
    fn number<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<f64>, Report<StorageError>>> {
        Box::pin(async move {
            let row: Option<(f64,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .change_context(StorageError::Query)
                .attach_with(|| format!("key: {key}"))?;
            Ok(row.map(|(value,)| value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ALERT_COUNT_KEY, resolve_alert_count};

    async fn in_memory_settings() -> SqliteSettings {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true);
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .unwrap();
        SqliteSettings::migrate(pool).await.unwrap()
    }

    #[tokio::test]
    async fn missing_key_reads_none() {
        let settings = in_memory_settings().await;
        assert_eq!(settings.number("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn stored_number_is_read_back_and_replaced() {
        let settings = in_memory_settings().await;
        settings.set_number(ALERT_COUNT_KEY, 5.0).await.unwrap();
        assert_eq!(settings.number(ALERT_COUNT_KEY).await.unwrap(), Some(5.0));

        settings.set_number(ALERT_COUNT_KEY, 3.0).await.unwrap();
        assert_eq!(resolve_alert_count(&settings, 4).await, 3);
    }
}
