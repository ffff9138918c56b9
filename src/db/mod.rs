mod migrations;
mod models;
mod queries;

pub use models::*;
pub use queries::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::store::{CachedImage, ImageCache, StoreError, Subscription, SubscriptionStore};

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection, running migrations if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or migrations fail.
    pub async fn new(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Without a busy timeout, the newsletter task and an interactive
            // scrape hitting the cache at the same time can fail with an
            // immediate SQLITE_BUSY. WAL helps, but writes are still serialized.
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let db = Self { pool };
        db.run_migrations().await?;
        db.verify_writable(path).await?;

        Ok(db)
    }

    async fn verify_writable(&self, path: &Path) -> Result<()> {
        // Detect common deployment misconfigurations early (e.g. a volume
        // mounted read-only), which otherwise show up later as "attempt to
        // write a readonly database" in the middle of a delivery.
        //
        // Starting a transaction requires write capability on SQLite.
        let tx = self.pool.begin().await.with_context(|| {
            format!(
                "SQLite database is not writable (path: {}). Check volume mount permissions/ownership",
                path.display()
            )
        })?;

        tx.commit()
            .await
            .context("Failed to commit SQLite writability check")?;
        Ok(())
    }

    /// Run all pending migrations.
    async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ImageCache for Database {
    async fn lookup(&self, source_url: &str) -> Result<Option<CachedImage>, StoreError> {
        get_cached_image(&self.pool, source_url).await
    }

    async fn create(
        &self,
        source_url: &str,
        file_id: &str,
        cached_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        insert_cached_image(&self.pool, source_url, file_id, cached_at).await
    }
}

#[async_trait]
impl SubscriptionStore for Database {
    async fn subscriptions_for_topic(
        &self,
        topic_path: &str,
    ) -> Result<Vec<Subscription>, StoreError> {
        get_subscriptions_for_topic(&self.pool, topic_path).await
    }

    async fn subscribe(&self, chat_id: i64, topic_path: &str) -> Result<(), StoreError> {
        insert_subscription(&self.pool, chat_id, topic_path).await
    }

    async fn unsubscribe(&self, chat_id: i64, topic_path: &str) -> Result<(), StoreError> {
        delete_subscription(&self.pool, chat_id, topic_path).await
    }

    async fn advance_watermark(
        &self,
        subscription_id: i64,
        seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        queries::advance_watermark(&self.pool, subscription_id, seen_at).await
    }
}
