/// Outbound document download
///
/// The fetcher only opens the response; the body is handed back as a
/// [`ChunkSource`] so the caller can enforce its byte ceiling while reading.
use crate::{
    config::DownloadConfig,
    error::{MediaError, MediaResult},
    media::source::{ChunkSource, StreamSource},
};
use async_trait::async_trait;
use reqwest::{header, Client};
use url::Url;

/// An opened remote document whose body has not been read yet
pub struct RemoteDocument {
    /// Declared `Content-Type`, if any
    pub content_type: Option<String>,
    /// Declared `Content-Length`, if any
    pub content_length: Option<u64>,
    /// Streamed response body
    pub body: Box<dyn ChunkSource>,
}

impl std::fmt::Debug for RemoteDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDocument")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens remote documents for streaming
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn open(&self, url: &Url) -> MediaResult<RemoteDocument>;
}

/// `reqwest`-backed fetcher with a fixed user agent and timeouts
///
/// The timeout bounds connecting and each individual read, not the whole
/// transfer, so a large document that keeps flowing is never cut off.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &DownloadConfig) -> MediaResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.timeout())
            .read_timeout(config.timeout())
            .build()
            .map_err(|e| {
                MediaError::StorageUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn open(&self, url: &Url) -> MediaResult<RemoteDocument> {
        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| MediaError::DownloadFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::DownloadFailed(format!(
                "Unexpected status {} from {}",
                status, url
            )));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_length = response.content_length();

        tracing::debug!(
            url = %url,
            content_type = ?content_type,
            content_length = ?content_length,
            "Opened remote document"
        );

        Ok(RemoteDocument {
            content_type,
            content_length,
            body: Box::new(StreamSource::new(Box::pin(response.bytes_stream()))),
        })
    }
}
