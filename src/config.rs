/// Configuration management for the ROTA media service
use crate::error::{MediaError, MediaResult};
use crate::media::policy::{MAX_DOCUMENT_BYTES, MAX_IMAGE_BYTES};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default outbound user agent for document downloads
pub const DEFAULT_USER_AGENT: &str = "ROTA-Backend/1.0";

/// Default connect/read timeout for document downloads
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Main service configuration
///
/// Built once at startup and shared read-only by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub download: DownloadConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Origin used when an absolute media URL is requested
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Public static directory; every managed file lives below it
    pub root: PathBuf,
    /// Mount path of the static file server (e.g. `/static`)
    pub static_url_path: String,
    pub max_image_bytes: u64,
    pub max_document_bytes: u64,
}

/// Outbound download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MediaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> MediaResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("ROTA_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("ROTA_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| MediaError::StorageUnavailable("Invalid port number".to_string()))?;
        let public_url = env::var("ROTA_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let root = env::var("ROTA_STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./static"));
        let static_url_path =
            env::var("ROTA_STATIC_URL_PATH").unwrap_or_else(|_| "/static".to_string());

        let timeout_secs = env::var("ROTA_DOWNLOAD_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_DOWNLOAD_TIMEOUT_SECS.to_string())
            .parse()
            .map_err(|_| MediaError::StorageUnavailable("Invalid download timeout".to_string()))?;
        let user_agent =
            env::var("ROTA_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let log_level = env::var("ROTA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = env::var("ROTA_LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(MediaConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                root,
                static_url_path,
                max_image_bytes: MAX_IMAGE_BYTES,
                max_document_bytes: MAX_DOCUMENT_BYTES,
            },
            download: DownloadConfig {
                timeout_secs,
                user_agent,
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Configuration rooted at `root` with every other setting defaulted
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        Self {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 5000,
                public_url: "http://127.0.0.1:5000".to_string(),
            },
            storage: StorageConfig {
                root: root.as_ref().to_path_buf(),
                static_url_path: "/static".to_string(),
                max_image_bytes: MAX_IMAGE_BYTES,
                max_document_bytes: MAX_DOCUMENT_BYTES,
            },
            download: DownloadConfig {
                timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }

    /// Validate configuration
    ///
    /// Creates the storage root if needed. Any failure here is fatal at startup.
    pub fn validate(&self) -> MediaResult<()> {
        std::fs::create_dir_all(&self.storage.root).map_err(|e| {
            MediaError::StorageUnavailable(format!(
                "Failed to create storage root {}: {}",
                self.storage.root.display(),
                e
            ))
        })?;

        if !self.storage.root.is_dir() {
            return Err(MediaError::StorageUnavailable(format!(
                "Storage root is not a directory: {}",
                self.storage.root.display()
            )));
        }

        let public_url = url::Url::parse(&self.service.public_url).map_err(|e| {
            MediaError::StorageUnavailable(format!("Invalid public URL: {}", e))
        })?;
        if !matches!(public_url.scheme(), "http" | "https") {
            return Err(MediaError::StorageUnavailable(
                "Public URL must use http or https".to_string(),
            ));
        }

        let static_path = &self.storage.static_url_path;
        if !static_path.starts_with('/') || static_path.trim_matches('/').is_empty() {
            return Err(MediaError::StorageUnavailable(
                "Static URL path must be a non-root path starting with '/'".to_string(),
            ));
        }

        if self.download.timeout_secs == 0 {
            return Err(MediaError::StorageUnavailable(
                "Download timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
