use chrono::{DateTime, SecondsFormat, Utc};

use crate::store::{CachedImage, StoreError, Subscription};

/// Timestamps are stored as fixed-width RFC 3339 so SQL string comparison
/// agrees with chronological order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Timestamp {
            value: value.to_string(),
            source: e,
        })
}

/// Row backing an image cache entry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CachedImageRow {
    pub id: i64,
    pub source_url: String,
    pub file_id: String,
    pub cached_at: String,
}

impl CachedImageRow {
    pub(crate) fn into_domain(self) -> Result<CachedImage, StoreError> {
        Ok(CachedImage {
            cached_at: parse_timestamp(&self.cached_at)?,
            file_id: self.file_id,
        })
    }
}

/// Row backing a subscription.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: i64,
    pub chat_id: i64,
    pub topic_path: String,
    pub created_at: String,
    pub last_seen_at: String,
}

impl SubscriptionRow {
    pub(crate) fn into_domain(self) -> Result<Subscription, StoreError> {
        Ok(Subscription {
            last_seen_at: parse_timestamp(&self.last_seen_at)?,
            id: self.id,
            chat_id: self.chat_id,
            topic_path: self.topic_path,
        })
    }
}
