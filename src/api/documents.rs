/// Admin endpoint that guarantees a document is stored locally
use crate::{
    api::{uploads::stored, StoredMediaResponse},
    context::AppContext,
    error::MediaResult,
    media::policy::DEFAULT_DOCUMENT_CATEGORY,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

/// Build document cache routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/admin/documents/cache", post(cache_document))
}

/// Request to mirror a remote document (or validate a local one)
#[derive(Debug, Deserialize)]
pub struct CacheDocumentRequest {
    pub url: String,
    #[serde(default)]
    pub subdir: Option<String>,
    #[serde(default)]
    pub filename_hint: Option<String>,
}

async fn cache_document(
    State(ctx): State<AppContext>,
    Json(req): Json<CacheDocumentRequest>,
) -> MediaResult<(StatusCode, Json<StoredMediaResponse>)> {
    let path = ctx
        .documents
        .ensure_cached(
            &req.url,
            req.subdir.as_deref().unwrap_or(DEFAULT_DOCUMENT_CATEGORY),
            req.filename_hint.as_deref(),
        )
        .await?;

    Ok(stored(&ctx, path))
}
