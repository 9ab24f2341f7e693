//! HTTP handlers for workplace safety inspections

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
use crate::services::inspection::{
    CreateInspectionInput, Inspection, InspectionFilter, InspectionService, UpdateInspectionInput,
};
use crate::AppState;

/// Record an inspection
pub async fn create_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateInspectionInput>,
) -> AppResult<(StatusCode, Json<Inspection>)> {
    current_user.require(Resource::Inspection, Action::Create)?;
    let service = InspectionService::new(state.db);
    let inspection = service.create_inspection(current_user.id(), input).await?;
    Ok((StatusCode::CREATED, Json(inspection)))
}

/// List inspections
pub async fn list_inspections(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<InspectionFilter>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Inspection>>> {
    current_user.require(Resource::Inspection, Action::View)?;
    let service = InspectionService::new(state.db);
    let inspections = service.list_inspections(filter, page.pagination()).await?;
    Ok(Json(inspections))
}

/// Get an inspection by ID
pub async fn get_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inspection_id): Path<Uuid>,
) -> AppResult<Json<Inspection>> {
    current_user.require(Resource::Inspection, Action::View)?;
    let service = InspectionService::new(state.db);
    let inspection = service.get_inspection(inspection_id).await?;
    Ok(Json(inspection))
}

/// Update an open inspection
pub async fn update_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inspection_id): Path<Uuid>,
    Json(input): Json<UpdateInspectionInput>,
) -> AppResult<Json<Inspection>> {
    current_user.require(Resource::Inspection, Action::Edit)?;
    let service = InspectionService::new(state.db);
    let inspection = service.update_inspection(inspection_id, input).await?;
    Ok(Json(inspection))
}

/// Mark the corrective action as done
pub async fn close_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inspection_id): Path<Uuid>,
) -> AppResult<Json<Inspection>> {
    current_user.require(Resource::Inspection, Action::Edit)?;
    let service = InspectionService::new(state.db);
    let inspection = service.close_inspection(inspection_id).await?;
    Ok(Json(inspection))
}

/// Delete an inspection
pub async fn delete_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inspection_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Inspection, Action::Delete)?;
    let service = InspectionService::new(state.db);
    service.delete_inspection(inspection_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
