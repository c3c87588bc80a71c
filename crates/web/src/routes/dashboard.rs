//! Dashboard routes.

use axum::extract::State;
use axum::{Extension, Json};
use database::InvoiceStats;
use invoicing::branding::{BrandTheme, THEMES};

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::state::AppState;

/// Invoice counts and totals for the caller.
pub async fn stats(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<InvoiceStats>> {
    Ok(Json(state.invoices.stats(&user.id).await?))
}

/// Selectable brand themes.
pub async fn themes() -> Json<Vec<BrandTheme>> {
    Json(THEMES.to_vec())
}
