//! HTTP handlers for certificates and the public verification endpoints

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use serde::Deserialize;
use shared::{Action, PaginatedResponse, Resource};
use uuid::Uuid;

use super::PageQuery;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::certificate::{
    Certificate, CertificateFilter, CertificateService, ExpiringCertificate, PublicCertificate,
    RevokeCertificateInput,
};
use crate::AppState;

fn certificate_service(state: AppState) -> CertificateService {
    CertificateService::new(state.db, state.config.certificates.clone())
}

// ============================================================================
// Authenticated access
// ============================================================================

/// List certificates
pub async fn list_certificates(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<CertificateFilter>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Certificate>>> {
    current_user.require(Resource::Certificate, Action::View)?;
    let certificates = certificate_service(state)
        .list_certificates(filter, page.pagination())
        .await?;
    Ok(Json(certificates))
}

/// Query parameters for the expiration alert list
#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

/// Valid certificates expiring within the window (default 30 days)
pub async fn list_expiring_certificates(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ExpiringQuery>,
) -> AppResult<Json<Vec<ExpiringCertificate>>> {
    current_user.require(Resource::Certificate, Action::View)?;
    let expiring = certificate_service(state)
        .list_expiring(query.days.unwrap_or(30))
        .await?;
    Ok(Json(expiring))
}

/// Get a certificate by ID
pub async fn get_certificate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(certificate_id): Path<Uuid>,
) -> AppResult<Json<Certificate>> {
    current_user.require(Resource::Certificate, Action::View)?;
    let certificate = certificate_service(state).get_certificate(certificate_id).await?;
    Ok(Json(certificate))
}

/// Printable HTML certificate
pub async fn get_certificate_document(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(certificate_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    current_user.require(Resource::Certificate, Action::Export)?;
    let html = certificate_service(state).render_document(certificate_id).await?;
    Ok(([(header::CACHE_CONTROL, "no-store")], Html(html)))
}

/// Revoke a certificate
pub async fn revoke_certificate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(certificate_id): Path<Uuid>,
    Json(input): Json<RevokeCertificateInput>,
) -> AppResult<Json<Certificate>> {
    current_user.require(Resource::Certificate, Action::Edit)?;
    let certificate = certificate_service(state)
        .revoke(certificate_id, current_user.id(), input)
        .await?;
    Ok(Json(certificate))
}

// ============================================================================
// Public verification (unauthenticated)
// ============================================================================

/// Verify a certificate by its code
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<PublicCertificate>> {
    let certificate = certificate_service(state).public_lookup(&code).await?;
    Ok(Json(certificate))
}

#[derive(Debug, Deserialize)]
pub struct PublicSearchQuery {
    pub document_number: String,
}

/// Certificates held by a document number
pub async fn search_public_certificates(
    State(state): State<AppState>,
    Query(query): Query<PublicSearchQuery>,
) -> AppResult<Json<Vec<PublicCertificate>>> {
    let certificates = certificate_service(state)
        .public_lookup_by_document(&query.document_number)
        .await?;
    Ok(Json(certificates))
}
