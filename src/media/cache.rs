/// Idempotent local mirroring of remote documents
///
/// A remote document is stored as `uploads/<category>/<digest><ext>`, where the
/// digest is derived from the request identity (URL and optional hint) rather
/// than from the payload. Whether a document is cached is therefore a plain
/// existence check on the filesystem; there is no separate index and no lock.
/// Concurrent fills of the same key download twice at worst and converge on
/// the same file.
use crate::{
    config::MediaConfig,
    error::{MediaError, MediaResult},
    media::{
        fetch::DocumentFetcher,
        policy::{
            cache_digest, declared_extension, extension_for_mime, sanitize_category,
            sanitize_extension, RelativeMediaPath, DEFAULT_DOCUMENT_CATEGORY, GENERIC_EXTENSION,
        },
        resolver::is_remote,
        sandbox::PathSandbox,
        spool::{spool_to_file, CommitMode},
    },
};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use url::Url;

/// Guarantees documents are available under local storage
#[derive(Clone)]
pub struct DocumentCache {
    sandbox: Arc<PathSandbox>,
    fetcher: Arc<dyn DocumentFetcher>,
    max_bytes: u64,
    /// Public prefix stripped from local references (e.g. `static/`)
    public_prefix: Option<String>,
}

impl DocumentCache {
    pub fn new(
        sandbox: Arc<PathSandbox>,
        fetcher: Arc<dyn DocumentFetcher>,
        config: &MediaConfig,
    ) -> Self {
        let prefix = config.storage.static_url_path.trim_matches('/');
        let public_prefix = (!prefix.is_empty()).then(|| format!("{}/", prefix));

        Self {
            sandbox,
            fetcher,
            max_bytes: config.storage.max_document_bytes,
            public_prefix,
        }
    }

    /// Make `source` available locally and return its relative path
    ///
    /// Local references are validated and returned unchanged. Remote URLs are
    /// downloaded at most once per (URL, hint) pair; a blank category means
    /// `documents`.
    pub async fn ensure_cached(
        &self,
        source: &str,
        category: &str,
        filename_hint: Option<&str>,
    ) -> MediaResult<RelativeMediaPath> {
        let source = source.trim();
        if source.is_empty() {
            return Err(MediaError::InvalidInput(
                "Document address is empty".to_string(),
            ));
        }

        if is_remote(source) {
            self.cache_remote(source, category, filename_hint.unwrap_or(""))
                .await
        } else {
            self.local_reference(source).await
        }
    }

    async fn local_reference(&self, source: &str) -> MediaResult<RelativeMediaPath> {
        let mut relative = source.trim_start_matches('/');
        if let Some(prefix) = &self.public_prefix {
            relative = relative.strip_prefix(prefix.as_str()).unwrap_or(relative);
        }
        let relative = relative
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect::<Vec<_>>()
            .join("/");
        if relative.is_empty() {
            return Err(MediaError::InvalidInput(format!(
                "Invalid document path: {}",
                source
            )));
        }

        let resolved = self.sandbox.resolve(&relative).await?;
        match fs::metadata(&resolved).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return Err(MediaError::NotFound(format!(
                    "Local document not found: {}",
                    relative
                )))
            }
        }

        tracing::debug!(path = %relative, "Using local document as-is");
        Ok(RelativeMediaPath::from_resolved(relative))
    }

    async fn cache_remote(
        &self,
        source: &str,
        category: &str,
        hint: &str,
    ) -> MediaResult<RelativeMediaPath> {
        if source.chars().any(char::is_control) {
            return Err(MediaError::InvalidInput(
                "Document URL contains control characters".to_string(),
            ));
        }
        let url = Url::parse(source)
            .map_err(|e| MediaError::InvalidInput(format!("Invalid document URL: {}", e)))?;

        let hint: String = hint.trim().chars().filter(|c| *c != '\0').collect();
        let digest = cache_digest(source, &hint);

        let category = match sanitize_category(category) {
            c if c.is_empty() => DEFAULT_DOCUMENT_CATEGORY.to_string(),
            c => c,
        };
        let dir = self.sandbox.ensure_subdir(&category).await?;

        let url_extension = url_extension(&url).map(|ext| sanitize_extension(&ext));

        // Cache hit: answer before touching the network.
        let cached = match &url_extension {
            Some(ext) => {
                let name = format!("{}{}", digest, ext);
                fs::try_exists(dir.join(&name))
                    .await
                    .unwrap_or(false)
                    .then_some(name)
            }
            None => find_by_stem(&dir, &digest).await?,
        };
        if let Some(name) = cached {
            tracing::debug!(url = %source, file = %name, "Document cache hit");
            return Ok(RelativeMediaPath::in_category(&category, &name));
        }

        let mut document = match self.fetcher.open(&url).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(url = %source, "Document download failed: {}", e);
                return Err(e);
            }
        };

        if let Some(length) = document.content_length {
            if length > self.max_bytes {
                return Err(MediaError::PayloadTooLarge {
                    max: self.max_bytes,
                });
            }
        }

        let extension = url_extension.unwrap_or_else(|| {
            document
                .content_type
                .as_deref()
                .and_then(extension_for_mime)
                .map(sanitize_extension)
                .unwrap_or_else(|| GENERIC_EXTENSION.to_string())
        });
        let name = format!("{}{}", digest, extension);
        let destination = dir.join(&name);

        let spooled = spool_to_file(
            document.body.as_mut(),
            &destination,
            self.max_bytes,
            CommitMode::KeepExisting,
        )
        .await?;

        let path = RelativeMediaPath::in_category(&category, &name);
        if spooled.written {
            tracing::info!(url = %source, path = %path, size = spooled.size, "Cached remote document");
        } else {
            tracing::debug!(url = %source, path = %path, "Concurrent fill already stored document");
        }
        Ok(path)
    }
}

/// Extension of the last URL path segment, if it has one
fn url_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.last()?;
    declared_extension(last)
}

/// Name of a stored file in `dir` whose stem is `stem`
async fn find_by_stem(dir: &Path, stem: &str) -> MediaResult<Option<String>> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let matches = name
            .strip_prefix(stem)
            .is_some_and(|rest| rest.starts_with('.'));
        if matches && entry.file_type().await?.is_file() {
            return Ok(Some(name.to_string()));
        }
    }
    Ok(None)
}
