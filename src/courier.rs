//! Delivery glue: turns resolved posts into sent photos and cache entries.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::delivery::ImageTransport;
use crate::scrape::{ImageRef, Post};
use crate::store::ImageCache;

/// Deliver one post to one chat, captioned with its permalink. Returns the
/// delivery handle.
///
/// A staged image is uploaded once: the cache entry is recorded on success,
/// and the staged file is removed whether or not the send succeeded. If the
/// image was already delivered elsewhere since staging (another subscriber,
/// a concurrent scrape), the cache entry is used instead of the file.
///
/// # Errors
///
/// Returns an error if the send fails or the cache cannot be updated.
pub async fn deliver_post(
    transport: &dyn ImageTransport,
    cache: &dyn ImageCache,
    chat_id: i64,
    post: &Post,
) -> Result<String> {
    let caption = post.permalink.as_str();

    match &post.image {
        ImageRef::Cached { file_id, .. } => transport
            .send_cached(chat_id, file_id, caption)
            .await
            .context("Failed to re-send cached image"),
        ImageRef::Staged {
            path,
            source_url,
            discovered_at,
        } => {
            if let Some(cached) = cache.lookup(source_url).await? {
                remove_staged(path).await;
                return transport
                    .send_cached(chat_id, &cached.file_id, caption)
                    .await
                    .context("Failed to re-send cached image");
            }

            let sent = transport.send_file(chat_id, path, caption).await;
            remove_staged(path).await;

            let file_id =
                sent.with_context(|| format!("Failed to upload image {source_url}"))?;
            // Keyed to the discovery time, not the upload time, so the
            // newsletter watermark comparison sees one consistent instant
            // for this post across cycles.
            cache.create(source_url, &file_id, *discovered_at).await?;
            Ok(file_id)
        }
    }
}

/// Deliver a whole window in order; the browse path's send step.
///
/// # Errors
///
/// Returns an error on the first failed delivery.
pub async fn deliver_window(
    transport: &dyn ImageTransport,
    cache: &dyn ImageCache,
    chat_id: i64,
    posts: &[Post],
) -> Result<usize> {
    let mut sent = 0usize;
    for post in posts {
        deliver_post(transport, cache, chat_id, post).await?;
        sent += 1;
    }
    Ok(sent)
}

/// Staged files never outlive their delivery attempt.
async fn remove_staged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "failed to remove staged image: {e}");
        }
    }
}
