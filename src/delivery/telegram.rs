use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

use super::{ImageTransport, TransportError};
use crate::config::Config;

/// Thin Telegram Bot API client.
///
/// Only the two `sendPhoto` shapes the courier needs: by cached `file_id`
/// (JSON body) and by multipart upload of a staged file.
pub struct TelegramClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
}

impl TelegramClient {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            // Uploads of full-size forum photos can be slow.
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_base: config.telegram_api_base.trim_end_matches('/').to_string(),
            token: config.telegram_token.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }
}

#[async_trait]
impl ImageTransport for TelegramClient {
    async fn send_cached(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: &str,
    ) -> Result<String, TransportError> {
        debug!(chat = chat_id, "re-sending cached photo");

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "photo": file_id,
                "caption": caption,
            }))
            .send()
            .await?;

        parse_sent_photo(response).await
    }

    async fn send_file(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<String, TransportError> {
        debug!(chat = chat_id, path = %path.display(), "uploading staged photo");

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| TransportError::ReadImage {
                path: path.to_path_buf(),
                source: e,
            })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "photo".to_string(), |n| n.to_string_lossy().into_owned());
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.as_ref())?;
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;

        parse_sent_photo(response).await
    }
}

/// Extract the delivery handle from a `sendPhoto` response: the file id of
/// the largest rendition (the API lists them smallest first).
async fn parse_sent_photo(response: reqwest::Response) -> Result<String, TransportError> {
    let status = response.status();
    let body: ApiResponse = response.json().await?;

    if !body.ok {
        return Err(TransportError::Api {
            status,
            description: body
                .description
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    body.result
        .and_then(|message| message.photo)
        .and_then(|sizes| sizes.into_iter().next_back())
        .map(|size| size.file_id)
        .ok_or(TransportError::MalformedResponse)
}
