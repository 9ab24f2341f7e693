//! Monthly regional reports and dashboard metrics

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{month_bounds, month_name_es, validate_year_month, MonthlyMetrics, Pagination, PaginatedResponse, ReportStatus};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{field_error, AppError, AppResult};

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Stored monthly report for a regional
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyReport {
    pub id: Uuid,
    pub regional_id: Uuid,
    pub regional_name: String,
    pub year: i32,
    pub month: i32,
    pub status: ReportStatus,
    pub trainings_completed: i64,
    pub participants_trained: i64,
    pub participants_approved: i64,
    pub training_hours: Decimal,
    pub certificates_issued: i64,
    pub inspections_performed: i64,
    pub inspections_non_compliant: i64,
    pub epp_items_inspected: i64,
    pub epp_items_requiring_replacement: i64,
    pub notes: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub generated_by: Option<Uuid>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<Uuid>,
}

impl MonthlyReport {
    pub fn metrics(&self) -> MonthlyMetrics {
        MonthlyMetrics {
            trainings_completed: self.trainings_completed,
            participants_trained: self.participants_trained,
            participants_approved: self.participants_approved,
            training_hours: self.training_hours,
            certificates_issued: self.certificates_issued,
            inspections_performed: self.inspections_performed,
            inspections_non_compliant: self.inspections_non_compliant,
            epp_items_inspected: self.epp_items_inspected,
            epp_items_requiring_replacement: self.epp_items_requiring_replacement,
        }
    }
}

/// One line of the CSV export
#[derive(Debug, Serialize)]
pub struct ReportCsvRow {
    pub regional: String,
    pub year: i32,
    pub month: String,
    pub status: &'static str,
    pub trainings_completed: i64,
    pub participants_trained: i64,
    pub participants_approved: i64,
    pub approval_rate: Option<Decimal>,
    pub training_hours: Decimal,
    pub certificates_issued: i64,
    pub inspections_performed: i64,
    pub inspections_non_compliant: i64,
    pub inspection_compliance_rate: Option<Decimal>,
    pub epp_items_inspected: i64,
    pub epp_items_requiring_replacement: i64,
}

impl From<&MonthlyReport> for ReportCsvRow {
    fn from(report: &MonthlyReport) -> Self {
        let metrics = report.metrics();
        Self {
            regional: report.regional_name.clone(),
            year: report.year,
            month: month_name_es(report.month as u32).to_string(),
            status: report.status.as_str(),
            trainings_completed: metrics.trainings_completed,
            participants_trained: metrics.participants_trained,
            participants_approved: metrics.participants_approved,
            approval_rate: metrics.approval_rate(),
            training_hours: metrics.training_hours,
            certificates_issued: metrics.certificates_issued,
            inspections_performed: metrics.inspections_performed,
            inspections_non_compliant: metrics.inspections_non_compliant,
            inspection_compliance_rate: metrics.inspection_compliance_rate(),
            epp_items_inspected: metrics.epp_items_inspected,
            epp_items_requiring_replacement: metrics.epp_items_requiring_replacement,
        }
    }
}

/// Dashboard metrics
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub active_collaborators: i64,
    pub trainings_this_month: i64,
    pub valid_certificates: i64,
    pub certificates_expiring_30_days: i64,
    pub open_corrective_actions: i64,
}

/// Request to compute a monthly report
#[derive(Debug, Deserialize)]
pub struct GenerateReportInput {
    pub regional_id: Uuid,
    pub year: i32,
    pub month: u32,
}

/// Notes update for a draft report
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReportInput {
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

/// Report filter parameters
#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub regional_id: Option<Uuid>,
    pub year: Option<i32>,
}

#[derive(FromRow)]
struct MetricsRow {
    trainings_completed: i64,
    participants_trained: i64,
    participants_approved: i64,
    training_hours: Decimal,
    certificates_issued: i64,
    inspections_performed: i64,
    inspections_non_compliant: i64,
    epp_items_inspected: i64,
    epp_items_requiring_replacement: i64,
}

impl From<MetricsRow> for MonthlyMetrics {
    fn from(row: MetricsRow) -> Self {
        Self {
            trainings_completed: row.trainings_completed,
            participants_trained: row.participants_trained,
            participants_approved: row.participants_approved,
            training_hours: row.training_hours,
            certificates_issued: row.certificates_issued,
            inspections_performed: row.inspections_performed,
            inspections_non_compliant: row.inspections_non_compliant,
            epp_items_inspected: row.epp_items_inspected,
            epp_items_requiring_replacement: row.epp_items_requiring_replacement,
        }
    }
}

const REPORT_SELECT: &str = r#"
    SELECT m.id, m.regional_id, r.name AS regional_name, m.year, m.month, m.status,
           m.trainings_completed, m.participants_trained, m.participants_approved,
           m.training_hours, m.certificates_issued, m.inspections_performed,
           m.inspections_non_compliant, m.epp_items_inspected,
           m.epp_items_requiring_replacement, m.notes, m.generated_at, m.generated_by,
           m.closed_at, m.closed_by
    FROM monthly_reports m
    JOIN regionals r ON r.id = m.regional_id
"#;

// Trainings and certificates are scoped by the training's city, EPP records
// by the collaborator's city.
const METRICS_QUERY: &str = r#"
    WITH scope AS (
        SELECT id FROM cities WHERE regional_id = $3
    ),
    month_trainings AS (
        SELECT t.id, l.hours, c.min_attendance_percent,
               COALESCE(l.min_score, c.min_score) AS min_score
        FROM trainings t
        JOIN course_levels l ON l.id = t.course_level_id
        JOIN courses c ON c.id = l.course_id
        WHERE t.deleted_at IS NULL
          AND t.status = 'completed'
          AND t.end_date BETWEEN $1 AND $2
          AND t.city_id IN (SELECT id FROM scope)
    ),
    results AS (
        SELECT mt.hours, mt.min_attendance_percent, mt.min_score,
               p.attendance_percent, p.score
        FROM month_trainings mt
        JOIN training_participants p ON p.training_id = mt.id
        WHERE p.attendance_percent IS NOT NULL
    )
    SELECT
        (SELECT COUNT(*) FROM month_trainings) AS trainings_completed,
        (SELECT COUNT(*) FROM results) AS participants_trained,
        (SELECT COUNT(*) FROM results
          WHERE attendance_percent >= min_attendance_percent
            AND score IS NOT NULL AND score >= min_score) AS participants_approved,
        (SELECT COALESCE(SUM(hours), 0) FROM results
          WHERE attendance_percent >= min_attendance_percent) AS training_hours,
        (SELECT COUNT(*) FROM certificates ce
          JOIN trainings t ON t.id = ce.training_id
          WHERE ce.issued_on BETWEEN $1 AND $2
            AND t.city_id IN (SELECT id FROM scope)) AS certificates_issued,
        (SELECT COUNT(*) FROM inspections i
          WHERE i.deleted_at IS NULL
            AND i.inspection_date BETWEEN $1 AND $2
            AND i.city_id IN (SELECT id FROM scope)) AS inspections_performed,
        (SELECT COUNT(*) FROM inspections i
          WHERE i.deleted_at IS NULL
            AND i.result = 'non_compliant'
            AND i.inspection_date BETWEEN $1 AND $2
            AND i.city_id IN (SELECT id FROM scope)) AS inspections_non_compliant,
        (SELECT COUNT(*) FROM epp_certification_inspections e
          JOIN collaborators co ON co.id = e.collaborator_id
          WHERE e.deleted_at IS NULL
            AND e.inspection_date BETWEEN $1 AND $2
            AND co.city_id IN (SELECT id FROM scope)) AS epp_items_inspected,
        (SELECT COUNT(*) FROM epp_certification_inspections e
          JOIN collaborators co ON co.id = e.collaborator_id
          WHERE e.deleted_at IS NULL
            AND e.requires_replacement
            AND e.inspection_date BETWEEN $1 AND $2
            AND co.city_id IN (SELECT id FROM scope)) AS epp_items_requiring_replacement
"#;

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Monthly reports
    // ========================================================================

    /// Compute the metrics for a regional and month and upsert the draft report
    pub async fn generate(&self, generated_by: Uuid, input: GenerateReportInput) -> AppResult<MonthlyReport> {
        validate_year_month(input.year, input.month).map_err(field_error("month"))?;
        let (first, last) = month_bounds(input.year, input.month)
            .ok_or_else(|| AppError::validation("month", "Invalid month", "Mes inválido"))?;

        let regional_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM regionals WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(input.regional_id)
        .fetch_one(&self.db)
        .await?;

        if !regional_exists {
            return Err(AppError::NotFound("Regional".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let existing: Option<ReportStatus> = sqlx::query_scalar(
            "SELECT status FROM monthly_reports WHERE regional_id = $1 AND year = $2 AND month = $3 FOR UPDATE",
        )
        .bind(input.regional_id)
        .bind(input.year)
        .bind(input.month as i32)
        .fetch_optional(&mut *tx)
        .await?;

        if existing == Some(ReportStatus::Closed) {
            return Err(AppError::InvalidStateTransition(format!(
                "The {} {} report is closed and cannot be regenerated",
                month_name_es(input.month),
                input.year
            )));
        }

        let metrics: MonthlyMetrics = sqlx::query_as::<_, MetricsRow>(METRICS_QUERY)
            .bind(first)
            .bind(last)
            .bind(input.regional_id)
            .fetch_one(&mut *tx)
            .await?
            .into();

        let report_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO monthly_reports (
                regional_id, year, month, status,
                trainings_completed, participants_trained, participants_approved, training_hours,
                certificates_issued, inspections_performed, inspections_non_compliant,
                epp_items_inspected, epp_items_requiring_replacement, generated_at, generated_by
            )
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), $13)
            ON CONFLICT (regional_id, year, month) DO UPDATE SET
                trainings_completed = EXCLUDED.trainings_completed,
                participants_trained = EXCLUDED.participants_trained,
                participants_approved = EXCLUDED.participants_approved,
                training_hours = EXCLUDED.training_hours,
                certificates_issued = EXCLUDED.certificates_issued,
                inspections_performed = EXCLUDED.inspections_performed,
                inspections_non_compliant = EXCLUDED.inspections_non_compliant,
                epp_items_inspected = EXCLUDED.epp_items_inspected,
                epp_items_requiring_replacement = EXCLUDED.epp_items_requiring_replacement,
                generated_at = NOW(),
                generated_by = EXCLUDED.generated_by
            WHERE monthly_reports.status = 'draft'
            RETURNING id
            "#,
        )
        .bind(input.regional_id)
        .bind(input.year)
        .bind(input.month as i32)
        .bind(metrics.trainings_completed)
        .bind(metrics.participants_trained)
        .bind(metrics.participants_approved)
        .bind(metrics.training_hours)
        .bind(metrics.certificates_issued)
        .bind(metrics.inspections_performed)
        .bind(metrics.inspections_non_compliant)
        .bind(metrics.epp_items_inspected)
        .bind(metrics.epp_items_requiring_replacement)
        .bind(generated_by)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::InvalidStateTransition("The report was closed while generating".to_string()))?;

        tx.commit().await?;

        tracing::info!(
            report_id = %report_id,
            regional_id = %input.regional_id,
            year = input.year,
            month = input.month,
            trainings_completed = metrics.trainings_completed,
            participants_trained = metrics.participants_trained,
            "Monthly report generated"
        );

        self.get_report(report_id).await
    }

    /// Get a report by ID
    pub async fn get_report(&self, report_id: Uuid) -> AppResult<MonthlyReport> {
        sqlx::query_as::<_, MonthlyReport>(&format!("{} WHERE m.id = $1", REPORT_SELECT))
            .bind(report_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Monthly report".to_string()))
    }

    /// List reports, newest period first
    pub async fn list_reports(
        &self,
        filter: ReportFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<MonthlyReport>> {
        let where_clause = r#"
            WHERE ($1::UUID IS NULL OR m.regional_id = $1)
              AND ($2::INTEGER IS NULL OR m.year = $2)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM monthly_reports m {}",
            where_clause
        ))
        .bind(filter.regional_id)
        .bind(filter.year)
        .fetch_one(&self.db)
        .await?;

        let reports = sqlx::query_as::<_, MonthlyReport>(&format!(
            "{} {} ORDER BY m.year DESC, m.month DESC, r.name ASC LIMIT $3 OFFSET $4",
            REPORT_SELECT, where_clause
        ))
        .bind(filter.regional_id)
        .bind(filter.year)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(reports, &pagination, total.max(0) as u64))
    }

    /// Update the notes of a draft report
    pub async fn update_notes(&self, report_id: Uuid, input: UpdateReportInput) -> AppResult<MonthlyReport> {
        input.validate()?;
        self.ensure_draft(report_id).await?;

        sqlx::query("UPDATE monthly_reports SET notes = $2 WHERE id = $1 AND status = 'draft'")
            .bind(report_id)
            .bind(input.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()))
            .execute(&self.db)
            .await?;

        self.get_report(report_id).await
    }

    /// Close a draft report; closed reports are frozen
    pub async fn close_report(&self, report_id: Uuid, closed_by: Uuid) -> AppResult<MonthlyReport> {
        self.ensure_draft(report_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE monthly_reports
            SET status = 'closed', closed_at = NOW(), closed_by = $2
            WHERE id = $1 AND status = 'draft'
            "#,
        )
        .bind(report_id)
        .bind(closed_by)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidStateTransition("The report is already closed".to_string()));
        }

        tracing::info!(report_id = %report_id, closed_by = %closed_by, "Monthly report closed");

        self.get_report(report_id).await
    }

    /// Delete a draft report
    pub async fn delete_report(&self, report_id: Uuid) -> AppResult<()> {
        self.ensure_draft(report_id).await?;

        sqlx::query("DELETE FROM monthly_reports WHERE id = $1 AND status = 'draft'")
            .bind(report_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn ensure_draft(&self, report_id: Uuid) -> AppResult<()> {
        let status: ReportStatus = sqlx::query_scalar("SELECT status FROM monthly_reports WHERE id = $1")
            .bind(report_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Monthly report".to_string()))?;

        if status == ReportStatus::Closed {
            return Err(AppError::InvalidStateTransition(
                "Closed reports cannot be modified".to_string(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    /// Get dashboard metrics
    pub async fn get_dashboard_metrics(&self) -> AppResult<DashboardMetrics> {
        let today = Utc::now().date_naive();
        let (month_start, month_end) = month_bounds(today.year(), today.month())
            .ok_or_else(|| AppError::Internal("Invalid current month".to_string()))?;

        let active_collaborators: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM collaborators WHERE is_active = true AND deleted_at IS NULL",
        )
        .fetch_one(&self.db)
        .await?;

        let trainings_this_month: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM trainings
            WHERE deleted_at IS NULL
              AND status <> 'cancelled'
              AND start_date <= $2 AND end_date >= $1
            "#,
        )
        .bind(month_start)
        .bind(month_end)
        .fetch_one(&self.db)
        .await?;

        let certificate_counts: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE expires_on IS NULL OR expires_on >= $1) AS valid,
                COUNT(*) FILTER (WHERE expires_on BETWEEN $1 AND $1 + 30) AS expiring
            FROM certificates
            WHERE status = 'valid'
            "#,
        )
        .bind(today)
        .fetch_one(&self.db)
        .await?;

        let open_corrective_actions: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM inspections
            WHERE deleted_at IS NULL
              AND closed_at IS NULL
              AND result <> 'compliant'
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(DashboardMetrics {
            active_collaborators,
            trainings_this_month,
            valid_certificates: certificate_counts.0,
            certificates_expiring_30_days: certificate_counts.1,
            open_corrective_actions,
        })
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: ReportStatus) -> MonthlyReport {
        MonthlyReport {
            id: Uuid::new_v4(),
            regional_id: Uuid::new_v4(),
            regional_name: "Lima Norte".to_string(),
            year: 2024,
            month: 3,
            status,
            trainings_completed: 4,
            participants_trained: 40,
            participants_approved: 30,
            training_hours: Decimal::new(3200, 1),
            certificates_issued: 30,
            inspections_performed: 10,
            inspections_non_compliant: 1,
            epp_items_inspected: 120,
            epp_items_requiring_replacement: 6,
            notes: None,
            generated_at: Utc::now(),
            generated_by: None,
            closed_at: None,
            closed_by: None,
        }
    }

    #[test]
    fn test_csv_row_carries_rates_and_month_name() {
        let row = ReportCsvRow::from(&report(ReportStatus::Closed));
        assert_eq!(row.month, "Marzo");
        assert_eq!(row.status, "closed");
        assert_eq!(row.approval_rate, Some(Decimal::from(75)));
        assert_eq!(row.inspection_compliance_rate, Some(Decimal::from(90)));
    }

    #[test]
    fn test_csv_export_has_header_and_rows() {
        let rows = vec![
            ReportCsvRow::from(&report(ReportStatus::Draft)),
            ReportCsvRow::from(&report(ReportStatus::Closed)),
        ];
        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("regional,year,month,status,trainings_completed"));
        assert!(lines[1].starts_with("Lima Norte,2024,Marzo,draft,4,40,30,"));
    }
}
