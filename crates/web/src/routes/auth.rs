//! Registration, email verification and login routes.

use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use chrono::Utc;
use database::User;
use invoicing::accounts::{LoginRequest, RegisterRequest};
use serde::{Deserialize, Serialize};

use crate::auth::{session_cookie, session_token, SESSION_COOKIE};
use crate::error::Result;
use crate::extract::JsonBody;
use crate::state::AppState;

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: User,
}

/// Create an account and send its verification email.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let user = state.accounts.register(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Account created. Please check your email to verify your account.",
            user,
        }),
    ))
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

/// Consume a verification link and send the browser to the confirmation page.
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Redirect> {
    state.accounts.verify_email(query.token.as_deref()).await?;
    Ok(Redirect::to("/auth/verified"))
}

#[derive(Template)]
#[template(path = "verified.html")]
pub struct VerifiedTemplate {}

/// Confirmation page shown after verification.
pub async fn verified_page() -> Result<Html<String>> {
    Ok(Html(VerifiedTemplate {}.render()?))
}

/// Open a session. The token is returned in the body and as a cookie.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Response> {
    let login = state.accounts.login(request).await?;
    let max_age = (login.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = session_cookie(&login.token, max_age);
    Ok(([(header::SET_COOKIE, cookie)], Json(login)).into_response())
}

/// Close the caller's session, if any.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    if let Some(token) = session_token(&headers) {
        state.accounts.logout(&token).await?;
    }
    let expired = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    Ok(([(header::SET_COOKIE, expired)], StatusCode::NO_CONTENT).into_response())
}
