use std::time::Duration;

use super::ScrapeError;

/// The forum serves a reduced page to clients without a browser User-Agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Single-attempt page and image fetcher.
///
/// No internal retries: the pagination walk is sequential and a retrying
/// fetcher would multiply its worst-case latency. Callers decide whether a
/// failed walk is retried.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }

    /// Fetch one page of thread markup.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.get(url).await?;
        response.text().await.map_err(|e| ScrapeError::Fetch {
            url: url.to_string(),
            source: e,
        })
    }

    /// Fetch raw bytes, used for image downloads.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(|e| ScrapeError::Fetch {
            url: url.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ScrapeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::Fetch {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        Ok(response)
    }
}
