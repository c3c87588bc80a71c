//! Session middleware.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use database::User;
use tracing::debug;

use crate::error::{Result, WebError};
use crate::state::AppState;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "invgen_session";

/// The authenticated caller, inserted by [`require_session`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Session token from `Authorization: Bearer` or the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty())
}

/// `Set-Cookie` value for a session.
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

/// Reject requests without a valid session and expose the caller to handlers.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let Some(token) = session_token(request.headers()) else {
        debug!("No session token provided");
        return Err(WebError::Unauthenticated);
    };

    let user = state.accounts.authenticate(&token).await?;
    debug!(user_id = %user.id, "Authenticated user");
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; invgen_session=abc123"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_session_cookie() {
        assert_eq!(
            session_cookie("abc", 60),
            "invgen_session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
        );
    }
}
