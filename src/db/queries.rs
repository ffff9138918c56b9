use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{format_timestamp, CachedImageRow, SubscriptionRow};
use crate::store::{CachedImage, StoreError, Subscription};

// ========== Image cache ==========

/// Look up a cache entry by normalized image URL.
pub async fn get_cached_image(
    pool: &SqlitePool,
    source_url: &str,
) -> Result<Option<CachedImage>, StoreError> {
    let row: Option<CachedImageRow> =
        sqlx::query_as("SELECT * FROM cached_images WHERE source_url = ?")
            .bind(source_url)
            .fetch_optional(pool)
            .await?;

    row.map(CachedImageRow::into_domain).transpose()
}

/// Create a cache entry. The first write wins; creating an existing key is
/// a no-op, so concurrent deliveries of the same image are safe.
pub async fn insert_cached_image(
    pool: &SqlitePool,
    source_url: &str,
    file_id: &str,
    cached_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO cached_images (source_url, file_id, cached_at)
        VALUES (?, ?, ?)
        ON CONFLICT(source_url) DO NOTHING
        ",
    )
    .bind(source_url)
    .bind(file_id)
    .bind(format_timestamp(cached_at))
    .execute(pool)
    .await?;

    Ok(())
}

// ========== Subscriptions ==========

/// All subscriptions for one topic, oldest first.
pub async fn get_subscriptions_for_topic(
    pool: &SqlitePool,
    topic_path: &str,
) -> Result<Vec<Subscription>, StoreError> {
    let rows: Vec<SubscriptionRow> =
        sqlx::query_as("SELECT * FROM subscriptions WHERE topic_path = ? ORDER BY id")
            .bind(topic_path)
            .fetch_all(pool)
            .await?;

    rows.into_iter()
        .map(SubscriptionRow::into_domain)
        .collect()
}

/// Create a subscription with its watermark set to now. Subscribing twice
/// to the same topic is a no-op.
pub async fn insert_subscription(
    pool: &SqlitePool,
    chat_id: i64,
    topic_path: &str,
) -> Result<(), StoreError> {
    let now = format_timestamp(Utc::now());
    sqlx::query(
        r"
        INSERT INTO subscriptions (chat_id, topic_path, created_at, last_seen_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(chat_id, topic_path) DO NOTHING
        ",
    )
    .bind(chat_id)
    .bind(topic_path)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_subscription(
    pool: &SqlitePool,
    chat_id: i64,
    topic_path: &str,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM subscriptions WHERE chat_id = ? AND topic_path = ?")
        .bind(chat_id)
        .bind(topic_path)
        .execute(pool)
        .await?;

    Ok(())
}

/// Move a subscription's watermark forward. The guard keeps it monotonic:
/// an older timestamp leaves the row untouched.
pub async fn advance_watermark(
    pool: &SqlitePool,
    subscription_id: i64,
    seen_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let seen_at = format_timestamp(seen_at);
    sqlx::query("UPDATE subscriptions SET last_seen_at = ? WHERE id = ? AND last_seen_at < ?")
        .bind(&seen_at)
        .bind(subscription_id)
        .bind(&seen_at)
        .execute(pool)
        .await?;

    Ok(())
}
