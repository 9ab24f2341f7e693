//! HTTP handlers for EPP inspection records and spreadsheet import

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, PaginatedResponse, Resource};
use uuid::Uuid;

use super::PageQuery;
use crate::error::{AppError, AppResult};
use crate::import::ImportReport;
use crate::middleware::CurrentUser;
use crate::services::epp::{EppEquipment, EppFilter, EppInspection, EppService, ImportBatch};
use crate::AppState;

/// List EPP inspection records
pub async fn list_epp_inspections(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<EppFilter>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<EppInspection>>> {
    current_user.require(Resource::EppInspection, Action::View)?;
    let service = EppService::new(state.db);
    let records = service.list_inspections(filter, page.pagination()).await?;
    Ok(Json(records))
}

/// Active equipment catalog
pub async fn list_epp_equipment(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<EppEquipment>>> {
    current_user.require(Resource::EppInspection, Action::View)?;
    let service = EppService::new(state.db);
    let equipment = service.list_equipment().await?;
    Ok(Json(equipment))
}

/// Import history
pub async fn list_epp_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<ImportBatch>>> {
    current_user.require(Resource::EppInspection, Action::View)?;
    let service = EppService::new(state.db);
    let batches = service.list_batches(page.pagination()).await?;
    Ok(Json(batches))
}

/// Get an EPP inspection record
pub async fn get_epp_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inspection_id): Path<Uuid>,
) -> AppResult<Json<EppInspection>> {
    current_user.require(Resource::EppInspection, Action::View)?;
    let service = EppService::new(state.db);
    let record = service.get_inspection(inspection_id).await?;
    Ok(Json(record))
}

/// Delete an EPP inspection record
pub async fn delete_epp_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inspection_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::EppInspection, Action::Delete)?;
    let service = EppService::new(state.db);
    service.delete_inspection(inspection_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload an EPP sheet.
///
/// Multipart fields: `file` (required) and `dry_run` (`true` to validate only).
pub async fn import_epp_sheet(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<ImportReport>> {
    current_user.require(Resource::EppInspection, Action::Import)?;
    let limits = &state.config.import;

    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut dry_run = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, limits.max_upload_bytes))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Import("The file part has no file name".to_string()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| upload_error(e, limits.max_upload_bytes))?;
                upload = Some((file_name, bytes.to_vec()));
            }
            Some("dry_run") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| upload_error(e, limits.max_upload_bytes))?;
                dry_run = matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes");
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::Import("Missing 'file' part in the upload".to_string()))?;

    let service = EppService::new(state.db.clone());
    let report = service
        .import_sheet(current_user.id(), &file_name, bytes, dry_run, limits)
        .await?;
    Ok(Json(report))
}

/// The body limit surfaces as a multipart stream error
fn upload_error(error: MultipartError, max_upload_bytes: usize) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(max_upload_bytes)
    } else {
        AppError::Import(format!("Invalid multipart body: {}", error))
    }
}
