//! Outbound photo delivery. The transport is a trait so the courier and the
//! newsletter can be driven against a recording fake in tests.

mod telegram;

pub use telegram::TelegramClient;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram API error ({status}): {description}")]
    Api {
        status: reqwest::StatusCode,
        description: String,
    },
    #[error("telegram response did not contain a photo")]
    MalformedResponse,
    #[error("failed to read staged image {path}: {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Sends photos to a chat, returning the platform's delivery handle for the
/// uploaded image. Re-sending by handle never re-uploads bytes.
#[async_trait]
pub trait ImageTransport: Send + Sync {
    /// Re-send a previously uploaded image by its delivery handle.
    async fn send_cached(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: &str,
    ) -> Result<String, TransportError>;

    /// Upload a staged image file. Returns the new delivery handle.
    async fn send_file(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<String, TransportError>;
}
