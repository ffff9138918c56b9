//! Persistent collaborators of the scrape and newsletter paths: the image
//! dedup cache and the subscription store. Both are injected as traits so
//! the walker and the newsletter stay testable with in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid stored timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// A previously delivered image: its platform handle and first-cached date.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub file_id: String,
    pub cached_at: DateTime<Utc>,
}

/// One chat's subscription to one topic.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i64,
    pub chat_id: i64,
    pub topic_path: String,
    /// Watermark: posts seen at or before this instant were already delivered.
    pub last_seen_at: DateTime<Utc>,
}

/// Deduplication cache keyed by normalized image URL.
///
/// An entry is created after an image's first successful delivery and is
/// immutable afterward: one URL maps to one handle, forever.
#[async_trait]
pub trait ImageCache: Send + Sync {
    async fn lookup(&self, source_url: &str) -> Result<Option<CachedImage>, StoreError>;

    /// Record a delivered image. Creating an existing key is a no-op: the
    /// first handle wins, which makes concurrent creation safe.
    async fn create(
        &self,
        source_url: &str,
        file_id: &str,
        cached_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Subscription state per chat and topic.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn subscriptions_for_topic(
        &self,
        topic_path: &str,
    ) -> Result<Vec<Subscription>, StoreError>;

    /// Create a subscription with its watermark set to now. Subscribing
    /// twice is a no-op.
    async fn subscribe(&self, chat_id: i64, topic_path: &str) -> Result<(), StoreError>;

    async fn unsubscribe(&self, chat_id: i64, topic_path: &str) -> Result<(), StoreError>;

    /// Move a subscription's watermark forward to `seen_at`. The watermark
    /// never moves backward; an older value is ignored.
    async fn advance_watermark(
        &self,
        subscription_id: i64,
        seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
