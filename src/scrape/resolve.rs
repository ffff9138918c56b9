use std::path::Path;

use chrono::Utc;
use tracing::{debug, warn};
use url::Url;

use super::fetch::PageFetcher;
use super::{ImageRef, ScrapeError};
use crate::store::ImageCache;

/// Normalize a raw image source to the absolute URL used as the cache key.
///
/// Absolute http(s) URLs pass through unchanged, protocol-relative ones gain
/// `http:`, and anything else is joined to the forum base URL.
#[must_use]
pub fn normalize_image_url(raw: &str, base: &Url) -> String {
    // The forum occasionally leaks BBCode into attributes; keep only the
    // part after the marker.
    let raw = raw
        .rfind("[IMG]")
        .map_or(raw, |i| &raw[i + "[IMG]".len()..])
        .trim();

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }
    if raw.starts_with("//") {
        return format!("http:{raw}");
    }

    base.join(raw).map_or_else(
        |_| {
            format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                raw.trim_start_matches('/')
            )
        },
        |joined| joined.to_string(),
    )
}

/// Filename used when staging an image: the URL's last path segment, with a
/// trailing slash ignored.
fn staged_file_name(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Resolves raw image sources into deliverable image references, consulting
/// the dedup cache before touching the network.
pub struct ImageResolver<'a> {
    fetcher: &'a PageFetcher,
    cache: &'a dyn ImageCache,
    base_url: &'a Url,
    work_dir: &'a Path,
}

impl<'a> ImageResolver<'a> {
    pub fn new(
        fetcher: &'a PageFetcher,
        cache: &'a dyn ImageCache,
        base_url: &'a Url,
        work_dir: &'a Path,
    ) -> Self {
        Self {
            fetcher,
            cache,
            base_url,
            work_dir,
        }
    }

    /// Resolve one raw image source.
    ///
    /// A cache hit never fetches. A miss downloads the bytes and stages them
    /// in the work directory; the cache entry itself is recorded later, by
    /// the delivery step. Returns `None` when the image cannot be fetched:
    /// the candidate is dropped rather than surfaced as a partial post.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache lookup fails or the staged file cannot
    /// be written.
    pub async fn resolve(&self, raw_source: &str) -> Result<Option<ImageRef>, ScrapeError> {
        let source_url = normalize_image_url(raw_source, self.base_url);

        if let Some(cached) = self.cache.lookup(&source_url).await? {
            debug!(url = %source_url, "image already delivered, reusing cached handle");
            return Ok(Some(ImageRef::Cached {
                file_id: cached.file_id,
                cached_at: cached.cached_at,
            }));
        }

        let bytes = match self.fetcher.fetch_bytes(&source_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %source_url, "image fetch failed, dropping post: {e}");
                return Ok(None);
            }
        };

        let path = self.work_dir.join(staged_file_name(&source_url));
        // The same filename within one run means the same image; skip the rewrite.
        let already_staged = tokio::fs::try_exists(&path).await.unwrap_or(false);
        if !already_staged {
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|e| ScrapeError::Stage {
                    url: source_url.clone(),
                    path: path.clone(),
                    source: e,
                })?;
        }

        Ok(Some(ImageRef::Staged {
            path,
            source_url,
            discovered_at: Utc::now(),
        }))
    }
}
