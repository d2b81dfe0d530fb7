/// Application context and dependency injection
use crate::{
    config::MediaConfig,
    error::MediaResult,
    media::{DocumentCache, DocumentFetcher, HttpFetcher, MediaUrlResolver, PathSandbox, UploadStore},
};
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<MediaConfig>,
    pub sandbox: Arc<PathSandbox>,
    pub uploads: Arc<UploadStore>,
    pub urls: Arc<MediaUrlResolver>,
    pub documents: Arc<DocumentCache>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub fn new(config: MediaConfig) -> MediaResult<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.download)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a context with a custom document fetcher
    pub fn with_fetcher(
        config: MediaConfig,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> MediaResult<Self> {
        // Validate configuration
        config.validate()?;

        let sandbox = Arc::new(PathSandbox::new(&config.storage.root)?);
        let uploads = Arc::new(UploadStore::new(Arc::clone(&sandbox), &config.storage));
        let urls = Arc::new(MediaUrlResolver::new(&config)?);
        let documents = Arc::new(DocumentCache::new(Arc::clone(&sandbox), fetcher, &config));

        tracing::info!(
            root = %sandbox.root().display(),
            static_url_path = %config.storage.static_url_path,
            "Media storage ready"
        );

        Ok(Self {
            config: Arc::new(config),
            sandbox,
            uploads,
            urls,
            documents,
        })
    }

    /// Absolute URL of a stored path
    pub fn external_url(&self, path: &str) -> Option<String> {
        self.urls.resolve(Some(path), true, None)
    }
}
