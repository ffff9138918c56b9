//! Thread scraping: page fetching, image-post extraction, image resolution
//! against the dedup cache, and the backward pagination walk that produces
//! post windows.

mod extract;
mod fetch;
mod resolve;
mod walker;

pub use extract::{extract_image_posts, PostCandidate};
pub use fetch::PageFetcher;
pub use resolve::normalize_image_url;
pub use walker::{last_page_number, ThreadScraper};

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} fetching {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("malformed page {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("failed to stage image {url} to {path}: {source}")]
    Stage {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One qualifying image post in a thread.
#[derive(Debug, Clone)]
pub struct Post {
    /// Absolute permalink of the forum post.
    pub permalink: Url,
    pub image: ImageRef,
}

/// The image carried by a post.
#[derive(Debug, Clone)]
pub enum ImageRef {
    /// Already delivered once; re-sendable by platform handle without a fetch.
    Cached {
        file_id: String,
        cached_at: DateTime<Utc>,
    },
    /// Freshly downloaded and staged on disk, pending its first delivery.
    Staged {
        path: PathBuf,
        source_url: String,
        discovered_at: DateTime<Utc>,
    },
}

impl Post {
    /// When this post's image was first seen: the original cache date for a
    /// cached image, the discovery time for a staged one. Newsletter deltas
    /// compare against this.
    #[must_use]
    pub fn seen_at(&self) -> DateTime<Utc> {
        match &self.image {
            ImageRef::Cached { cached_at, .. } => *cached_at,
            ImageRef::Staged { discovered_at, .. } => *discovered_at,
        }
    }
}
