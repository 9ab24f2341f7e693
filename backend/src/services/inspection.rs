//! Workplace inspection service

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{InspectionResult, InspectionType, Pagination, PaginatedResponse};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Inspection service
#[derive(Clone)]
pub struct InspectionService {
    db: PgPool,
}

/// Inspection record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Inspection {
    pub id: Uuid,
    pub inspection_type: InspectionType,
    pub city_id: Uuid,
    pub city_name: String,
    pub area: String,
    pub inspection_date: NaiveDate,
    pub inspector_name: String,
    pub result: InspectionResult,
    pub findings: Option<String>,
    pub corrective_action: Option<String>,
    pub corrective_action_due: Option<NaiveDate>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording an inspection
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInspectionInput {
    pub inspection_type: InspectionType,
    pub city_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Area must be 1-200 characters"))]
    pub area: String,
    pub inspection_date: NaiveDate,
    #[validate(length(min = 1, max = 200, message = "Inspector name must be 1-200 characters"))]
    pub inspector_name: String,
    pub result: InspectionResult,
    pub findings: Option<String>,
    pub corrective_action: Option<String>,
    pub corrective_action_due: Option<NaiveDate>,
}

/// Input for updating an inspection
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInspectionInput {
    pub inspection_type: Option<InspectionType>,
    #[validate(length(min = 1, max = 200, message = "Area must be 1-200 characters"))]
    pub area: Option<String>,
    pub inspection_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 200, message = "Inspector name must be 1-200 characters"))]
    pub inspector_name: Option<String>,
    pub result: Option<InspectionResult>,
    pub findings: Option<String>,
    pub corrective_action: Option<String>,
    pub corrective_action_due: Option<NaiveDate>,
}

/// Filters for listing inspections
#[derive(Debug, Default, Deserialize)]
pub struct InspectionFilter {
    pub city_id: Option<Uuid>,
    pub regional_id: Option<Uuid>,
    pub inspection_type: Option<InspectionType>,
    pub result: Option<InspectionResult>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Only findings whose corrective action is still open
    pub open_only: Option<bool>,
}

const INSPECTION_SELECT: &str = r#"
    SELECT i.id, i.inspection_type, i.city_id, ci.name AS city_name, i.area, i.inspection_date,
           i.inspector_name, i.result, i.findings, i.corrective_action, i.corrective_action_due,
           i.closed_at, i.created_by, i.created_at, i.updated_at
    FROM inspections i
    JOIN cities ci ON ci.id = i.city_id
"#;

/// Check the corrective-action rules for an inspection outcome
pub fn validate_inspection_outcome(
    result: InspectionResult,
    corrective_action: Option<&str>,
    inspection_date: NaiveDate,
    corrective_action_due: Option<NaiveDate>,
    today: NaiveDate,
) -> AppResult<()> {
    if inspection_date > today {
        return Err(AppError::validation(
            "inspection_date",
            "Inspection date cannot be in the future",
            "La fecha de inspección no puede ser futura",
        ));
    }

    let has_action = corrective_action.map_or(false, |a| !a.trim().is_empty());
    if result.requires_corrective_action() && !has_action {
        return Err(AppError::validation(
            "corrective_action",
            "Observed or non-compliant inspections require a corrective action",
            "Las inspecciones observadas o no conformes requieren una acción correctiva",
        ));
    }

    if matches!(corrective_action_due, Some(due) if due < inspection_date) {
        return Err(AppError::validation(
            "corrective_action_due",
            "Corrective action due date cannot be before the inspection",
            "El plazo de la acción correctiva no puede ser anterior a la inspección",
        ));
    }

    Ok(())
}

impl InspectionService {
    /// Create a new InspectionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record an inspection
    pub async fn create_inspection(
        &self,
        created_by: Uuid,
        input: CreateInspectionInput,
    ) -> AppResult<Inspection> {
        input.validate()?;
        validate_inspection_outcome(
            input.result,
            input.corrective_action.as_deref(),
            input.inspection_date,
            input.corrective_action_due,
            Utc::now().date_naive(),
        )?;

        let city_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM cities WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(input.city_id)
        .fetch_one(&self.db)
        .await?;
        if !city_exists {
            return Err(AppError::NotFound("City".to_string()));
        }

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO inspections (
                inspection_type, city_id, area, inspection_date, inspector_name, result,
                findings, corrective_action, corrective_action_due, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(input.inspection_type)
        .bind(input.city_id)
        .bind(input.area.trim())
        .bind(input.inspection_date)
        .bind(input.inspector_name.trim())
        .bind(input.result)
        .bind(&input.findings)
        .bind(&input.corrective_action)
        .bind(input.corrective_action_due)
        .bind(created_by)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(inspection_id = %id, result = input.result.as_str(), "Inspection recorded");
        self.get_inspection(id).await
    }

    /// Get an inspection by ID
    pub async fn get_inspection(&self, inspection_id: Uuid) -> AppResult<Inspection> {
        sqlx::query_as::<_, Inspection>(&format!(
            "{} WHERE i.id = $1 AND i.deleted_at IS NULL",
            INSPECTION_SELECT
        ))
        .bind(inspection_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inspection".to_string()))
    }

    /// List inspections with filters
    pub async fn list_inspections(
        &self,
        filter: InspectionFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Inspection>> {
        let where_clause = r#"
            WHERE i.deleted_at IS NULL
              AND ($1::UUID IS NULL OR i.city_id = $1)
              AND ($2::UUID IS NULL OR ci.regional_id = $2)
              AND ($3::VARCHAR IS NULL OR i.inspection_type = $3)
              AND ($4::VARCHAR IS NULL OR i.result = $4)
              AND ($5::DATE IS NULL OR i.inspection_date >= $5)
              AND ($6::DATE IS NULL OR i.inspection_date <= $6)
              AND (NOT $7 OR (i.result <> 'compliant' AND i.closed_at IS NULL))
        "#;
        let open_only = filter.open_only.unwrap_or(false);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM inspections i JOIN cities ci ON ci.id = i.city_id {}",
            where_clause
        ))
        .bind(filter.city_id)
        .bind(filter.regional_id)
        .bind(filter.inspection_type)
        .bind(filter.result)
        .bind(filter.from)
        .bind(filter.to)
        .bind(open_only)
        .fetch_one(&self.db)
        .await?;

        let inspections = sqlx::query_as::<_, Inspection>(&format!(
            "{} {} ORDER BY i.inspection_date DESC, i.created_at DESC LIMIT $8 OFFSET $9",
            INSPECTION_SELECT, where_clause
        ))
        .bind(filter.city_id)
        .bind(filter.regional_id)
        .bind(filter.inspection_type)
        .bind(filter.result)
        .bind(filter.from)
        .bind(filter.to)
        .bind(open_only)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(inspections, &pagination, total.max(0) as u64))
    }

    /// Update an inspection whose corrective action is still open
    pub async fn update_inspection(
        &self,
        inspection_id: Uuid,
        input: UpdateInspectionInput,
    ) -> AppResult<Inspection> {
        input.validate()?;

        let current = self.get_inspection(inspection_id).await?;
        if current.closed_at.is_some() {
            return Err(AppError::InvalidStateTransition(
                "A closed inspection cannot be edited".to_string(),
            ));
        }

        let result = input.result.unwrap_or(current.result);
        let corrective_action = input
            .corrective_action
            .as_deref()
            .or(current.corrective_action.as_deref());
        let inspection_date = input.inspection_date.unwrap_or(current.inspection_date);
        validate_inspection_outcome(
            result,
            corrective_action,
            inspection_date,
            input.corrective_action_due.or(current.corrective_action_due),
            Utc::now().date_naive(),
        )?;

        sqlx::query(
            r#"
            UPDATE inspections SET
                inspection_type = COALESCE($2, inspection_type),
                area = COALESCE($3, area),
                inspection_date = COALESCE($4, inspection_date),
                inspector_name = COALESCE($5, inspector_name),
                result = COALESCE($6, result),
                findings = COALESCE($7, findings),
                corrective_action = COALESCE($8, corrective_action),
                corrective_action_due = COALESCE($9, corrective_action_due),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(inspection_id)
        .bind(input.inspection_type)
        .bind(input.area.as_deref().map(str::trim))
        .bind(input.inspection_date)
        .bind(input.inspector_name.as_deref().map(str::trim))
        .bind(input.result)
        .bind(&input.findings)
        .bind(&input.corrective_action)
        .bind(input.corrective_action_due)
        .execute(&self.db)
        .await?;

        self.get_inspection(inspection_id).await
    }

    /// Close the corrective action of an observed or non-compliant inspection
    pub async fn close_inspection(&self, inspection_id: Uuid) -> AppResult<Inspection> {
        let current = self.get_inspection(inspection_id).await?;

        if !current.result.requires_corrective_action() {
            return Err(AppError::InvalidStateTransition(
                "A compliant inspection has no corrective action to close".to_string(),
            ));
        }
        if current.closed_at.is_some() {
            return Err(AppError::InvalidStateTransition(
                "Inspection is already closed".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE inspections SET closed_at = NOW(), updated_at = NOW() WHERE id = $1 AND closed_at IS NULL",
        )
        .bind(inspection_id)
        .execute(&self.db)
        .await?;

        tracing::info!(inspection_id = %inspection_id, "Corrective action closed");
        self.get_inspection(inspection_id).await
    }

    /// Soft-delete an inspection
    pub async fn delete_inspection(&self, inspection_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE inspections SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(inspection_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Inspection".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_non_compliant_requires_action() {
        let today = date(2024, 6, 1);
        assert!(validate_inspection_outcome(
            InspectionResult::NonCompliant,
            None,
            today,
            None,
            today
        )
        .is_err());
        assert!(validate_inspection_outcome(
            InspectionResult::Observed,
            Some("   "),
            today,
            None,
            today
        )
        .is_err());
        assert!(validate_inspection_outcome(
            InspectionResult::Observed,
            Some("Replace extinguisher"),
            today,
            Some(date(2024, 6, 15)),
            today
        )
        .is_ok());
    }

    #[test]
    fn test_compliant_needs_no_action() {
        let today = date(2024, 6, 1);
        assert!(
            validate_inspection_outcome(InspectionResult::Compliant, None, today, None, today)
                .is_ok()
        );
    }

    #[test]
    fn test_future_date_and_early_due_date_rejected() {
        let today = date(2024, 6, 1);
        assert!(validate_inspection_outcome(
            InspectionResult::Compliant,
            None,
            date(2024, 6, 2),
            None,
            today
        )
        .is_err());
        assert!(validate_inspection_outcome(
            InspectionResult::Observed,
            Some("Fix"),
            today,
            Some(date(2024, 5, 1)),
            today
        )
        .is_err());
    }
}
