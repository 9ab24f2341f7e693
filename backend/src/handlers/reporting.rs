//! HTTP handlers for monthly reports and the dashboard

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use shared::{Action, Resource};
use uuid::Uuid;

use super::PageQuery;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reporting::{
    DashboardMetrics, GenerateReportInput, MonthlyReport, ReportCsvRow, ReportFilter,
    ReportingService, UpdateReportInput,
};
use crate::AppState;

/// Query parameters for the monthly report list
#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub format: Option<String>, // "json" or "csv"
}

/// Dashboard counters
pub async fn get_dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<DashboardMetrics>> {
    current_user.require(Resource::Report, Action::View)?;
    let service = ReportingService::new(state.db);
    let metrics = service.get_dashboard_metrics().await?;
    Ok(Json(metrics))
}

/// List monthly reports, as JSON or CSV
pub async fn list_monthly_reports(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ReportFilter>,
    Query(page): Query<PageQuery>,
    Query(query): Query<ReportListQuery>,
) -> AppResult<Response> {
    current_user.require(Resource::Report, Action::View)?;
    let service = ReportingService::new(state.db);
    let reports = service.list_reports(filter, page.pagination()).await?;

    if query.format.as_deref() == Some("csv") {
        current_user.require(Resource::Report, Action::Export)?;
        let rows: Vec<ReportCsvRow> = reports.data.iter().map(ReportCsvRow::from).collect();
        let csv = ReportingService::export_to_csv(&rows)?;
        return Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"monthly_reports.csv\""),
            ],
            csv,
        )
            .into_response());
    }

    Ok(Json(reports).into_response())
}

/// Compute (or recompute) a draft report
pub async fn generate_monthly_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<GenerateReportInput>,
) -> AppResult<Json<MonthlyReport>> {
    current_user.require(Resource::Report, Action::Create)?;
    let service = ReportingService::new(state.db);
    let report = service.generate(current_user.id(), input).await?;
    Ok(Json(report))
}

/// Get a monthly report
pub async fn get_monthly_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<MonthlyReport>> {
    current_user.require(Resource::Report, Action::View)?;
    let service = ReportingService::new(state.db);
    let report = service.get_report(report_id).await?;
    Ok(Json(report))
}

/// Update the notes of a draft report
pub async fn update_monthly_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(report_id): Path<Uuid>,
    Json(input): Json<UpdateReportInput>,
) -> AppResult<Json<MonthlyReport>> {
    current_user.require(Resource::Report, Action::Edit)?;
    let service = ReportingService::new(state.db);
    let report = service.update_notes(report_id, input).await?;
    Ok(Json(report))
}

/// Close a report
pub async fn close_monthly_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<MonthlyReport>> {
    current_user.require(Resource::Report, Action::Edit)?;
    let service = ReportingService::new(state.db);
    let report = service.close_report(report_id, current_user.id()).await?;
    Ok(Json(report))
}

/// Delete a draft report
pub async fn delete_monthly_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(report_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Report, Action::Delete)?;
    let service = ReportingService::new(state.db);
    service.delete_report(report_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
