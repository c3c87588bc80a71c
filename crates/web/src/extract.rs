//! Request extractors whose rejections use the API error shape.

use axum::extract::FromRequest;

use crate::error::WebError;

/// `axum::Json`, but a malformed body is a 400 with `{"error": ...}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(WebError))]
pub struct JsonBody<T>(pub T);
