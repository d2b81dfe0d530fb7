/// Public URLs for stored and externally hosted media
use crate::{
    config::MediaConfig,
    error::{MediaError, MediaResult},
};
use url::Url;

/// Turns stored relative paths into servable URLs
///
/// Pure: no I/O happens after construction.
#[derive(Debug, Clone)]
pub struct MediaUrlResolver {
    public_url: Url,
    static_segments: Vec<String>,
}

impl MediaUrlResolver {
    /// Build a resolver from the static mount path and public origin
    pub fn new(config: &MediaConfig) -> MediaResult<Self> {
        let public_url = Url::parse(&config.service.public_url).map_err(|e| {
            MediaError::StorageUnavailable(format!("Invalid public URL: {}", e))
        })?;
        if public_url.cannot_be_a_base() || !matches!(public_url.scheme(), "http" | "https") {
            return Err(MediaError::StorageUnavailable(format!(
                "Public URL cannot serve media: {}",
                public_url
            )));
        }

        let static_segments = config
            .storage
            .static_url_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            public_url,
            static_segments,
        })
    }

    /// URL for `path`, else for `fallback`, else `None`
    ///
    /// Absolute `http(s)` inputs are returned verbatim. `external` selects an
    /// absolute URL instead of a root-relative one.
    pub fn resolve(
        &self,
        path: Option<&str>,
        external: bool,
        fallback: Option<&str>,
    ) -> Option<String> {
        [path, fallback]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|p| !p.is_empty())
            .map(|p| self.url_for(p, external))
    }

    fn url_for(&self, path: &str, external: bool) -> String {
        if is_remote(path) {
            return path.to_string();
        }

        let mut url = self.public_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(&self.static_segments)
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }

        if external {
            url.to_string()
        } else {
            url.path().to_string()
        }
    }
}

/// Whether a reference points at an `http` or `https` resource
pub fn is_remote(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
