//! Client routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use database::{Client, ClientUpdate};
use invoicing::clients::ClientRequest;

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::extract::JsonBody;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Client>>> {
    Ok(Json(state.clients.list(&user.id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    JsonBody(request): JsonBody<ClientRequest>,
) -> Result<(StatusCode, Json<Client>)> {
    let client = state.clients.create(&user.id, request).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Client>> {
    Ok(Json(state.clients.get(&user.id, &id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<ClientUpdate>,
) -> Result<Json<Client>> {
    Ok(Json(state.clients.update(&user.id, &id, update).await?))
}

/// Fails with 409 while the client still has invoices.
pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.clients.delete(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
