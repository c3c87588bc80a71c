//! Profile routes.

use axum::extract::State;
use axum::{Extension, Json};
use database::{User, UserUpdate};
use invoicing::accounts::ProfileUploadRequest;
use invoicing::storage::SignedUpload;

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::extract::JsonBody;
use crate::state::AppState;

pub async fn get(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<User>> {
    Ok(Json(state.accounts.profile(&user.id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    JsonBody(update): JsonBody<UserUpdate>,
) -> Result<Json<User>> {
    Ok(Json(state.accounts.update_profile(&user.id, update).await?))
}

/// Signed URL for an avatar or company logo upload.
pub async fn upload_url(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    JsonBody(request): JsonBody<ProfileUploadRequest>,
) -> Result<Json<SignedUpload>> {
    Ok(Json(state.accounts.profile_upload_url(&user.id, request).await?))
}
