//! HTTP handlers for trainings, enrollment, results and certificate issuance

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
use crate::services::certificate::{IssuanceReport, IssueCertificatesInput, IssuedCertificate};
use crate::services::training::{
    AddParticipantsInput, ChangeStatusInput, CreateTrainingInput, EnrollmentResult, Participant,
    RecordResultsInput, Training, TrainingFilter, TrainingService, UpdateTrainingInput,
};
use crate::services::CertificateService;
use crate::AppState;

// ============================================================================
// Training CRUD
// ============================================================================

/// Schedule a training
pub async fn create_training(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTrainingInput>,
) -> AppResult<(StatusCode, Json<Training>)> {
    current_user.require(Resource::Training, Action::Create)?;
    let service = TrainingService::new(state.db);
    let training = service.create_training(input).await?;
    Ok((StatusCode::CREATED, Json(training)))
}

/// List trainings
pub async fn list_trainings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TrainingFilter>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Training>>> {
    current_user.require(Resource::Training, Action::View)?;
    let service = TrainingService::new(state.db);
    let trainings = service.list_trainings(filter, page.pagination()).await?;
    Ok(Json(trainings))
}

/// Get a training by ID
pub async fn get_training(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(training_id): Path<Uuid>,
) -> AppResult<Json<Training>> {
    current_user.require(Resource::Training, Action::View)?;
    let service = TrainingService::new(state.db);
    let training = service.get_training(training_id).await?;
    Ok(Json(training))
}

/// Update a scheduled or running training
pub async fn update_training(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(training_id): Path<Uuid>,
    Json(input): Json<UpdateTrainingInput>,
) -> AppResult<Json<Training>> {
    current_user.require(Resource::Training, Action::Edit)?;
    let service = TrainingService::new(state.db);
    let training = service.update_training(training_id, input).await?;
    Ok(Json(training))
}

/// Delete a training
pub async fn delete_training(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(training_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Training, Action::Delete)?;
    let service = TrainingService::new(state.db);
    service.delete_training(training_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move a training through its lifecycle
pub async fn change_training_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(training_id): Path<Uuid>,
    Json(input): Json<ChangeStatusInput>,
) -> AppResult<Json<Training>> {
    current_user.require(Resource::Training, Action::Edit)?;
    let service = TrainingService::new(state.db);
    let training = service.change_status(training_id, input.status).await?;
    tracing::info!(
        training_id = %training_id,
        status = training.status.as_str(),
        user_id = %current_user.id(),
        "Training status changed"
    );
    Ok(Json(training))
}

// ============================================================================
// Participants & results
// ============================================================================

/// List enrolled participants with their results
pub async fn list_participants(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(training_id): Path<Uuid>,
) -> AppResult<Json<Vec<Participant>>> {
    current_user.require(Resource::Training, Action::View)?;
    let service = TrainingService::new(state.db);
    let participants = service.list_participants(training_id).await?;
    Ok(Json(participants))
}

/// Enroll collaborators
pub async fn add_participants(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(training_id): Path<Uuid>,
    Json(input): Json<AddParticipantsInput>,
) -> AppResult<Json<EnrollmentResult>> {
    current_user.require(Resource::Training, Action::Edit)?;
    let service = TrainingService::new(state.db);
    let result = service.add_participants(training_id, input).await?;
    Ok(Json(result))
}

/// Withdraw a participant
pub async fn remove_participant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((training_id, collaborator_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Training, Action::Edit)?;
    let service = TrainingService::new(state.db);
    service.remove_participant(training_id, collaborator_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record attendance and scores
pub async fn record_results(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(training_id): Path<Uuid>,
    Json(input): Json<RecordResultsInput>,
) -> AppResult<Json<Vec<Participant>>> {
    current_user.require(Resource::Training, Action::Edit)?;
    let service = TrainingService::new(state.db);
    let participants = service.record_results(training_id, input).await?;
    Ok(Json(participants))
}

// ============================================================================
// Certificate issuance
// ============================================================================

/// Issue certificates to every eligible participant
pub async fn issue_certificates(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(training_id): Path<Uuid>,
    input: Option<Json<IssueCertificatesInput>>,
) -> AppResult<Json<IssuanceReport>> {
    current_user.require(Resource::Certificate, Action::Issue)?;
    let input = input.map(|Json(i)| i).unwrap_or_default();
    let service = CertificateService::new(state.db, state.config.certificates.clone());
    let report = service
        .issue_for_training(training_id, current_user.id(), input)
        .await?;
    Ok(Json(report))
}

/// Issue the certificate of one participant
pub async fn issue_certificate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((training_id, collaborator_id)): Path<(Uuid, Uuid)>,
    input: Option<Json<IssueCertificatesInput>>,
) -> AppResult<(StatusCode, Json<IssuedCertificate>)> {
    current_user.require(Resource::Certificate, Action::Issue)?;
    let input = input.map(|Json(i)| i).unwrap_or_default();
    let service = CertificateService::new(state.db, state.config.certificates.clone());
    let issued = service
        .issue_single(training_id, collaborator_id, current_user.id(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}
