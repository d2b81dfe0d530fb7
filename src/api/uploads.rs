/// Admin upload endpoints for member photos, trail thumbnails and documents
use crate::{
    api::StoredMediaResponse,
    context::AppContext,
    error::{MediaError, MediaResult},
    media::{policy::DEFAULT_DOCUMENT_CATEGORY, ChunkSource, RelativeMediaPath, UploadKind},
};
use async_trait::async_trait;
use axum::{
    extract::{multipart::Field, multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;

/// Build upload routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/uploads/members", post(upload_member_photo))
        .route("/admin/uploads/trails", post(upload_trail_thumbnail))
        .route("/admin/uploads/documents", post(upload_document))
}

/// Optional query parameters of the document upload
#[derive(Debug, Default, Deserialize)]
pub struct DocumentUploadQuery {
    pub subdir: Option<String>,
}

/// Streams a multipart field straight into the upload store
struct FieldSource<'a> {
    field: Field<'a>,
}

#[async_trait]
impl ChunkSource for FieldSource<'_> {
    async fn next_chunk(&mut self) -> MediaResult<Option<Bytes>> {
        self.field.chunk().await.map_err(multipart_error)
    }
}

fn multipart_error(e: MultipartError) -> MediaError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return MediaError::PayloadTooLarge {
            max: crate::media::MAX_DOCUMENT_BYTES,
        };
    }
    MediaError::InvalidInput(format!("Malformed multipart body: {}", e.body_text()))
}

async fn upload_member_photo(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> MediaResult<impl IntoResponse> {
    store_upload(&ctx, multipart, UploadKind::Image, Some("members".to_string())).await
}

async fn upload_trail_thumbnail(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> MediaResult<impl IntoResponse> {
    store_upload(&ctx, multipart, UploadKind::Image, Some("trails".to_string())).await
}

/// Upload a document
///
/// The category comes from `?subdir=` or a `subdir` form field sent before
/// the `file` field; it defaults to `documents`.
async fn upload_document(
    State(ctx): State<AppContext>,
    Query(query): Query<DocumentUploadQuery>,
    multipart: Multipart,
) -> MediaResult<impl IntoResponse> {
    store_upload(&ctx, multipart, UploadKind::Document, query.subdir).await
}

async fn store_upload(
    ctx: &AppContext,
    mut multipart: Multipart,
    kind: UploadKind,
    mut category: Option<String>,
) -> MediaResult<(StatusCode, Json<StoredMediaResponse>)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("subdir") if kind == UploadKind::Document && category.is_none() => {
                category = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let mut source = FieldSource { field };
                let path = save(ctx, &mut source, &filename, kind, category.as_deref()).await?;
                return Ok(stored(ctx, path));
            }
            _ => {}
        }
    }

    Err(MediaError::InvalidInput(format!(
        "Send a {} file in the 'file' field",
        kind.label()
    )))
}

async fn save(
    ctx: &AppContext,
    source: &mut dyn ChunkSource,
    filename: &str,
    kind: UploadKind,
    category: Option<&str>,
) -> MediaResult<RelativeMediaPath> {
    match kind {
        UploadKind::Image => {
            ctx.uploads
                .save_image(source, filename, category.unwrap_or_default())
                .await
        }
        UploadKind::Document => {
            ctx.uploads
                .save_document(
                    source,
                    filename,
                    category.unwrap_or(DEFAULT_DOCUMENT_CATEGORY),
                )
                .await
        }
    }
}

pub(crate) fn stored(
    ctx: &AppContext,
    path: RelativeMediaPath,
) -> (StatusCode, Json<StoredMediaResponse>) {
    let url = ctx.external_url(path.as_str());
    (
        StatusCode::CREATED,
        Json(StoredMediaResponse {
            path: path.into_string(),
            url,
        }),
    )
}
