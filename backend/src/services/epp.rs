//! EPP (personal protective equipment) inspection service and bulk import

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{EppCondition, Pagination, PaginatedResponse};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::error::{AppError, AppResult};
use crate::import::{self, EquipmentRef, ImportReport, NewEppRecord};

/// EPP inspection service
#[derive(Clone)]
pub struct EppService {
    db: PgPool,
}

/// Equipment catalog entry
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EppEquipment {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

/// EPP inspection record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EppInspection {
    pub id: Uuid,
    pub collaborator_id: Uuid,
    pub document_number: String,
    pub collaborator_name: String,
    pub equipment_id: Uuid,
    pub equipment_code: String,
    pub equipment_name: String,
    pub inspection_date: NaiveDate,
    pub condition: EppCondition,
    pub requires_replacement: bool,
    pub inspector_name: Option<String>,
    pub observations: Option<String>,
    pub import_batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Import batch record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImportBatch {
    pub id: Uuid,
    pub file_name: String,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_by_name: Option<String>,
    pub total_rows: i32,
    pub imported_rows: i32,
    pub failed_rows: i32,
    pub created_records: i32,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing EPP inspections
#[derive(Debug, Default, Deserialize)]
pub struct EppFilter {
    pub collaborator_id: Option<Uuid>,
    pub equipment_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub requires_replacement: Option<bool>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const EPP_SELECT: &str = r#"
    SELECT e.id, e.collaborator_id, co.document_number,
           (co.last_name || ', ' || co.first_name) AS collaborator_name,
           e.equipment_id, q.code AS equipment_code, q.name AS equipment_name,
           e.inspection_date, e.condition, e.requires_replacement, e.inspector_name,
           e.observations, e.import_batch_id, e.created_at
    FROM epp_certification_inspections e
    JOIN collaborators co ON co.id = e.collaborator_id
    JOIN epp_equipment q ON q.id = e.equipment_id
"#;

impl EppService {
    /// Create a new EppService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Catalog and records
    // ========================================================================

    /// Active equipment catalog
    pub async fn list_equipment(&self) -> AppResult<Vec<EppEquipment>> {
        let equipment = sqlx::query_as::<_, EppEquipment>(
            "SELECT id, code, name, is_active FROM epp_equipment WHERE is_active = true ORDER BY name ASC",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(equipment)
    }

    /// Get an EPP inspection by ID
    pub async fn get_inspection(&self, inspection_id: Uuid) -> AppResult<EppInspection> {
        sqlx::query_as::<_, EppInspection>(&format!(
            "{} WHERE e.id = $1 AND e.deleted_at IS NULL",
            EPP_SELECT
        ))
        .bind(inspection_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("EPP inspection".to_string()))
    }

    /// List EPP inspections with filters
    pub async fn list_inspections(
        &self,
        filter: EppFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<EppInspection>> {
        let where_clause = r#"
            WHERE e.deleted_at IS NULL
              AND ($1::UUID IS NULL OR e.collaborator_id = $1)
              AND ($2::UUID IS NULL OR e.equipment_id = $2)
              AND ($3::UUID IS NULL OR e.import_batch_id = $3)
              AND ($4::BOOLEAN IS NULL OR e.requires_replacement = $4)
              AND ($5::DATE IS NULL OR e.inspection_date >= $5)
              AND ($6::DATE IS NULL OR e.inspection_date <= $6)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM epp_certification_inspections e {}",
            where_clause
        ))
        .bind(filter.collaborator_id)
        .bind(filter.equipment_id)
        .bind(filter.batch_id)
        .bind(filter.requires_replacement)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let records = sqlx::query_as::<_, EppInspection>(&format!(
            "{} {} ORDER BY e.inspection_date DESC, co.last_name ASC, q.name ASC LIMIT $7 OFFSET $8",
            EPP_SELECT, where_clause
        ))
        .bind(filter.collaborator_id)
        .bind(filter.equipment_id)
        .bind(filter.batch_id)
        .bind(filter.requires_replacement)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(records, &pagination, total.max(0) as u64))
    }

    /// Soft-delete an EPP inspection
    pub async fn delete_inspection(&self, inspection_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE epp_certification_inspections SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(inspection_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("EPP inspection".to_string()));
        }

        Ok(())
    }

    /// List import batches, newest first
    pub async fn list_batches(&self, pagination: Pagination) -> AppResult<PaginatedResponse<ImportBatch>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM epp_import_batches")
            .fetch_one(&self.db)
            .await?;

        let batches = sqlx::query_as::<_, ImportBatch>(
            r#"
            SELECT b.id, b.file_name, b.uploaded_by, u.full_name AS uploaded_by_name,
                   b.total_rows, b.imported_rows, b.failed_rows, b.created_records, b.created_at
            FROM epp_import_batches b
            LEFT JOIN users u ON u.id = b.uploaded_by
            ORDER BY b.created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(batches, &pagination, total.max(0) as u64))
    }

    // ========================================================================
    // Bulk import
    // ========================================================================

    /// Import an EPP inspection sheet.
    ///
    /// Rows with problems are reported and skipped; the valid rows are
    /// created in a single transaction unless `dry_run` is set.
    pub async fn import_sheet(
        &self,
        uploaded_by: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
        dry_run: bool,
        limits: &ImportConfig,
    ) -> AppResult<ImportReport> {
        let sheet = import::read_sheet(file_name, bytes, limits.max_rows)?;

        let equipment = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, code FROM epp_equipment WHERE is_active = true",
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(id, code)| EquipmentRef { id, code })
        .collect::<Vec<_>>();

        let columns = import::map_headers(&sheet.headers, &equipment)?;

        let documents = import::epp::document_numbers(&sheet, &columns);
        let collaborators: HashMap<String, Uuid> = sqlx::query_as::<_, (String, Uuid)>(
            r#"
            SELECT UPPER(document_number), id FROM collaborators
            WHERE UPPER(document_number) = ANY($1) AND deleted_at IS NULL
            "#,
        )
        .bind(&documents)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        let plan = import::plan_import(&sheet, &columns, &collaborators, Utc::now().date_naive());

        for error in &plan.errors {
            tracing::warn!(
                file_name = %file_name,
                row = error.row,
                problems = %error.messages.join("; "),
                "EPP import row rejected"
            );
        }

        if dry_run || plan.valid_rows.is_empty() {
            let report = ImportReport::from_plan(plan, None, dry_run);
            tracing::info!(
                file_name = %file_name,
                dry_run,
                total_rows = report.total_rows,
                valid_rows = report.imported_rows,
                failed_rows = report.failed_rows,
                "EPP import validated without writing"
            );
            return Ok(report);
        }

        let records = plan.records();
        let mut tx = self.db.begin().await?;

        let batch_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO epp_import_batches (
                file_name, uploaded_by, total_rows, imported_rows, failed_rows, created_records
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(file_name)
        .bind(uploaded_by)
        .bind(plan.total_rows as i32)
        .bind(plan.valid_rows.len() as i32)
        .bind(plan.errors.len() as i32)
        .bind(records.len() as i32)
        .fetch_one(&mut *tx)
        .await?;

        for chunk in records.chunks(insert_chunk_rows(limits.insert_chunk_size)) {
            insert_records(&mut tx, batch_id, chunk).await?;
        }

        tx.commit().await?;

        let report = ImportReport::from_plan(plan, Some(batch_id), false);
        tracing::info!(
            batch_id = %batch_id,
            file_name = %file_name,
            total_rows = report.total_rows,
            imported_rows = report.imported_rows,
            failed_rows = report.failed_rows,
            created_records = report.created_records,
            "EPP import completed"
        );
        Ok(report)
    }
}

/// Postgres caps a statement at 65535 bind parameters
const MAX_BIND_PARAMETERS: usize = 65535;
const BINDS_PER_RECORD: usize = 8;

/// Rows per multi-row INSERT, kept within the bind parameter cap
pub fn insert_chunk_rows(configured: usize) -> usize {
    configured.clamp(1, MAX_BIND_PARAMETERS / BINDS_PER_RECORD)
}

async fn insert_records(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    batch_id: Uuid,
    records: &[NewEppRecord],
) -> AppResult<()> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"INSERT INTO epp_certification_inspections (
            collaborator_id, equipment_id, inspection_date, condition, requires_replacement,
            inspector_name, observations, import_batch_id
        ) "#,
    );

    builder.push_values(records, |mut row, record| {
        row.push_bind(record.collaborator_id)
            .push_bind(record.equipment_id)
            .push_bind(record.inspection_date)
            .push_bind(record.condition)
            .push_bind(record.requires_replacement)
            .push_bind(record.inspector_name.clone())
            .push_bind(record.observations.clone())
            .push_bind(batch_id);
    });

    builder.build().execute(&mut **tx).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_chunk_rows_stays_within_bind_cap() {
        assert_eq!(insert_chunk_rows(500), 500);
        assert_eq!(insert_chunk_rows(0), 1);
        assert_eq!(insert_chunk_rows(10_000), 8191);
        assert!(insert_chunk_rows(usize::MAX) * BINDS_PER_RECORD <= MAX_BIND_PARAMETERS);
    }
}
