/// API routes and handlers
pub mod documents;
pub mod uploads;

use crate::context::AppContext;
use axum::Router;
use serde::{Deserialize, Serialize};

/// Body returned by every endpoint that stores or caches a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMediaResponse {
    /// Root-relative path to persist in entity records
    pub path: String,
    /// Absolute URL serving the file
    pub url: Option<String>,
}

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(uploads::routes())
        .merge(documents::routes())
}
