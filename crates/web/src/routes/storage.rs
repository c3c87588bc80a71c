//! Object storage endpoints backing signed uploads and public URLs.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use invoicing::storage::Bucket;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, WebError};
use crate::state::AppState;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Deserialize)]
pub struct SignatureQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Uploaded {
    pub path: String,
    pub public_url: String,
}

fn object_location(bucket: &str, path: &str) -> Result<(Bucket, String)> {
    let bucket: Bucket = bucket.parse()?;
    Ok((bucket, path.trim_start_matches('/').to_string()))
}

fn guess_content_type(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Accept the body of a signed upload.
pub async fn upload(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    Query(query): Query<SignatureQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Uploaded>> {
    let (bucket, key) = object_location(&bucket, &path)?;
    let (Some(expires), Some(signature)) = (query.expires, query.signature) else {
        return Err(WebError::BadRequest(
            "expires and signature query parameters are required".to_string(),
        ));
    };
    state
        .objects
        .verify_signed_upload(bucket, &key, expires, &signature, Utc::now())?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| guess_content_type(&key));

    state.objects.upload(bucket, &key, &body, &content_type).await?;
    info!(%bucket, key, bytes = body.len(), "Stored upload");

    Ok(Json(Uploaded {
        public_url: state.objects.public_url(bucket, &key),
        path: key,
    }))
}

/// Serve a stored object.
pub async fn download(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response> {
    let (bucket, key) = object_location(&bucket, &path)?;
    let bytes = state.objects.download(bucket, &key).await?;
    Ok(([(header::CONTENT_TYPE, guess_content_type(&key))], bytes).into_response())
}
