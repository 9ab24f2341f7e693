//! HTTP handlers for coaches

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
use crate::services::coach::{Coach, CoachFilter, CoachService, CreateCoachInput, UpdateCoachInput};
use crate::AppState;

/// Register a coach
pub async fn create_coach(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCoachInput>,
) -> AppResult<(StatusCode, Json<Coach>)> {
    current_user.require(Resource::Coach, Action::Create)?;
    let service = CoachService::new(state.db);
    let coach = service.create_coach(input).await?;
    Ok((StatusCode::CREATED, Json(coach)))
}

/// List coaches
pub async fn list_coaches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<CoachFilter>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Coach>>> {
    current_user.require(Resource::Coach, Action::View)?;
    let service = CoachService::new(state.db);
    let coaches = service.list_coaches(filter, page.pagination()).await?;
    Ok(Json(coaches))
}

/// Get a coach by ID
pub async fn get_coach(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(coach_id): Path<Uuid>,
) -> AppResult<Json<Coach>> {
    current_user.require(Resource::Coach, Action::View)?;
    let service = CoachService::new(state.db);
    let coach = service.get_coach(coach_id).await?;
    Ok(Json(coach))
}

/// Update a coach
pub async fn update_coach(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(coach_id): Path<Uuid>,
    Json(input): Json<UpdateCoachInput>,
) -> AppResult<Json<Coach>> {
    current_user.require(Resource::Coach, Action::Edit)?;
    let service = CoachService::new(state.db);
    let coach = service.update_coach(coach_id, input).await?;
    Ok(Json(coach))
}

/// Delete a coach
pub async fn delete_coach(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(coach_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Coach, Action::Delete)?;
    let service = CoachService::new(state.db);
    service.delete_coach(coach_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
