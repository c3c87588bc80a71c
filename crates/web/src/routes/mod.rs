//! Route handlers for the InvGen HTTP API.

pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod profile;
pub mod storage;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::require_session;
use crate::state::AppState;

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/logout", post(auth::logout))
        // Clients
        .route("/clients", get(clients::list).post(clients::create))
        .route(
            "/clients/:id",
            get(clients::get).put(clients::update).delete(clients::delete),
        )
        // Invoices
        .route("/invoices", get(invoices::list).post(invoices::create))
        .route("/invoices/next-number", get(invoices::next_number))
        .route(
            "/invoices/:id",
            get(invoices::get)
                .put(invoices::update)
                .delete(invoices::delete),
        )
        .route("/invoices/:id/pdf", get(invoices::pdf))
        .route("/invoices/:id/preview", get(invoices::preview))
        .route("/invoices/:id/upload-url", post(invoices::upload_url))
        .route("/invoices/:id/send", post(invoices::send))
        // Profile and dashboard
        .route("/profile", get(profile::get).put(profile::update))
        .route("/profile/signed-upload-url", post(profile::upload_url))
        .route("/stats", get(dashboard::stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(health::health))
        // Accounts
        .route("/register", post(auth::register))
        .route("/verify-email", get(auth::verify_email))
        .route("/auth/verified", get(auth::verified_page))
        .route("/login", post(auth::login))
        .route("/branding/themes", get(dashboard::themes))
        // Object storage
        .route(
            "/storage/:bucket/*path",
            get(storage::download)
                .put(storage::upload)
                .layer(DefaultBodyLimit::max(storage::MAX_UPLOAD_BYTES)),
        )
        .merge(protected)
        .with_state(state)
}
