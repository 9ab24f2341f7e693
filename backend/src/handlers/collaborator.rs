//! HTTP handlers for collaborators, their documents and certificates

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, PaginatedResponse, Resource};
use uuid::Uuid;

use super::PageQuery;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::certificate::Certificate;
use crate::services::collaborator::{
    AddDocumentInput, Collaborator, CollaboratorDocument, CollaboratorFilter, CollaboratorService,
    CreateCollaboratorInput, UpdateCollaboratorInput,
};
use crate::services::CertificateService;
use crate::AppState;

// ============================================================================
// Collaborator CRUD
// ============================================================================

/// Register a collaborator
pub async fn create_collaborator(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCollaboratorInput>,
) -> AppResult<(StatusCode, Json<Collaborator>)> {
    current_user.require(Resource::Collaborator, Action::Create)?;
    let service = CollaboratorService::new(state.db);
    let collaborator = service.create_collaborator(input).await?;
    Ok((StatusCode::CREATED, Json(collaborator)))
}

/// List collaborators
pub async fn list_collaborators(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<CollaboratorFilter>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Collaborator>>> {
    current_user.require(Resource::Collaborator, Action::View)?;
    let service = CollaboratorService::new(state.db);
    let collaborators = service.list_collaborators(filter, page.pagination()).await?;
    Ok(Json(collaborators))
}

/// Get a collaborator by ID
pub async fn get_collaborator(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(collaborator_id): Path<Uuid>,
) -> AppResult<Json<Collaborator>> {
    current_user.require(Resource::Collaborator, Action::View)?;
    let service = CollaboratorService::new(state.db);
    let collaborator = service.get_collaborator(collaborator_id).await?;
    Ok(Json(collaborator))
}

/// Update a collaborator
pub async fn update_collaborator(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(collaborator_id): Path<Uuid>,
    Json(input): Json<UpdateCollaboratorInput>,
) -> AppResult<Json<Collaborator>> {
    current_user.require(Resource::Collaborator, Action::Edit)?;
    let service = CollaboratorService::new(state.db);
    let collaborator = service.update_collaborator(collaborator_id, input).await?;
    Ok(Json(collaborator))
}

/// Delete a collaborator
pub async fn delete_collaborator(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(collaborator_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Collaborator, Action::Delete)?;
    let service = CollaboratorService::new(state.db);
    service.delete_collaborator(collaborator_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Documents
// ============================================================================

/// Attach a supporting document
pub async fn add_document(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(collaborator_id): Path<Uuid>,
    Json(input): Json<AddDocumentInput>,
) -> AppResult<(StatusCode, Json<CollaboratorDocument>)> {
    current_user.require(Resource::Collaborator, Action::Edit)?;
    let service = CollaboratorService::new(state.db);
    let document = service
        .add_document(collaborator_id, current_user.id(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// List a collaborator's documents
pub async fn list_documents(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(collaborator_id): Path<Uuid>,
) -> AppResult<Json<Vec<CollaboratorDocument>>> {
    current_user.require(Resource::Collaborator, Action::View)?;
    let service = CollaboratorService::new(state.db);
    let documents = service.list_documents(collaborator_id).await?;
    Ok(Json(documents))
}

/// Remove a document
pub async fn delete_document(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((collaborator_id, document_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Collaborator, Action::Edit)?;
    let service = CollaboratorService::new(state.db);
    service.delete_document(collaborator_id, document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Certificates held by a collaborator
pub async fn list_collaborator_certificates(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(collaborator_id): Path<Uuid>,
) -> AppResult<Json<Vec<Certificate>>> {
    current_user.require(Resource::Certificate, Action::View)?;
    let service = CertificateService::new(state.db, state.config.certificates.clone());
    let certificates = service.list_for_collaborator(collaborator_id).await?;
    Ok(Json(certificates))
}
