//! Invoice routes: CRUD, rendering and sending.

use askama::Template;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use database::Invoice;
use invoicing::document::InvoiceDocument;
use invoicing::invoices::{CreateInvoiceRequest, InvoiceSummary, InvoiceView, UpdateInvoiceRequest};
use invoicing::storage::SignedUpload;
use invoicing::{SendReceipt, SendRequest};
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::extract::JsonBody;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<InvoiceSummary>>> {
    Ok(Json(state.invoices.list(&user.id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    JsonBody(request): JsonBody<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>)> {
    let invoice = state.invoices.create(&user.id, request).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextNumber {
    pub invoice_number: String,
}

/// Preview of the number the next invoice will get.
pub async fn next_number(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<NextNumber>> {
    let invoice_number = state.invoices.next_number(&user.id).await?;
    Ok(Json(NextNumber { invoice_number }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<InvoiceView>> {
    Ok(Json(state.invoices.view(&user.id, &id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateInvoiceRequest>,
) -> Result<Json<Invoice>> {
    Ok(Json(state.invoices.update(&user.id, &id, request).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.invoices.delete(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Download the rendered PDF.
pub async fn pdf(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response> {
    let (number, bytes) = state.invoices.render_pdf(&user, &id).await?;
    let disposition = format!("attachment; filename=\"invoice-{number}.pdf\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Printable HTML invoice.
#[derive(Template)]
#[template(path = "invoice_preview.html")]
pub struct InvoicePreviewTemplate {
    pub doc: InvoiceDocument,
}

pub async fn preview(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Html<String>> {
    let doc = state.invoices.document(&user, &id).await?;
    Ok(Html(InvoicePreviewTemplate { doc }.render()?))
}

/// Signed URL for uploading a client-rendered PDF before sending.
pub async fn upload_url(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<SignedUpload>> {
    Ok(Json(state.send.upload_url(&user, &id).await?))
}

/// Email the invoice to its client. An empty body renders the PDF server-side.
pub async fn send(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: Option<Json<SendRequest>>,
) -> Result<Json<SendReceipt>> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    Ok(Json(state.send.send(&user, &id, request).await?))
}
