//! Coach (trainer) service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Pagination, PaginatedResponse};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{field_error, AppError, AppResult};

/// Coach service for managing trainers
#[derive(Clone)]
pub struct CoachService {
    db: PgPool,
}

/// Coach record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Coach {
    pub id: Uuid,
    pub document_number: String,
    pub full_name: String,
    pub specialty: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub signature_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a coach
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCoachInput {
    #[validate(length(min = 6, max = 20, message = "Document number must be 6-20 characters"))]
    pub document_number: String,
    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    pub full_name: String,
    #[validate(length(max = 200))]
    pub specialty: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(url(message = "Signature must be a valid URL"))]
    pub signature_url: Option<String>,
}

/// Input for updating a coach
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCoachInput {
    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    pub full_name: Option<String>,
    #[validate(length(max = 200))]
    pub specialty: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(url(message = "Signature must be a valid URL"))]
    pub signature_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Filters for listing coaches
#[derive(Debug, Default, Deserialize)]
pub struct CoachFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

const COACH_COLUMNS: &str = r#"
    id, document_number, full_name, specialty, email, phone, signature_url,
    is_active, created_at, updated_at
"#;

impl CoachService {
    /// Create a new CoachService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a coach
    pub async fn create_coach(&self, input: CreateCoachInput) -> AppResult<Coach> {
        input.validate()?;
        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(field_error("phone"))?;
        }

        let coach = sqlx::query_as::<_, Coach>(&format!(
            r#"
            INSERT INTO coaches (document_number, full_name, specialty, email, phone, signature_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            COACH_COLUMNS
        ))
        .bind(input.document_number.trim().to_uppercase())
        .bind(input.full_name.trim())
        .bind(&input.specialty)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.signature_url)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(coach_id = %coach.id, "Coach created");
        Ok(coach)
    }

    /// Get a coach by ID
    pub async fn get_coach(&self, coach_id: Uuid) -> AppResult<Coach> {
        sqlx::query_as::<_, Coach>(&format!(
            "SELECT {} FROM coaches WHERE id = $1 AND deleted_at IS NULL",
            COACH_COLUMNS
        ))
        .bind(coach_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Coach".to_string()))
    }

    /// List coaches, searching by name or document number
    pub async fn list_coaches(
        &self,
        filter: CoachFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Coach>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let where_clause = r#"
            WHERE deleted_at IS NULL
              AND ($1::BOOLEAN IS NULL OR is_active = $1)
              AND ($2::VARCHAR IS NULL OR full_name ILIKE $2 OR document_number ILIKE $2)
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM coaches {}", where_clause))
                .bind(filter.is_active)
                .bind(&search)
                .fetch_one(&self.db)
                .await?;

        let coaches = sqlx::query_as::<_, Coach>(&format!(
            "SELECT {} FROM coaches {} ORDER BY full_name ASC LIMIT $3 OFFSET $4",
            COACH_COLUMNS, where_clause
        ))
        .bind(filter.is_active)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(coaches, &pagination, total.max(0) as u64))
    }

    /// Update a coach
    pub async fn update_coach(&self, coach_id: Uuid, input: UpdateCoachInput) -> AppResult<Coach> {
        input.validate()?;
        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(field_error("phone"))?;
        }

        sqlx::query_as::<_, Coach>(&format!(
            r#"
            UPDATE coaches SET
                full_name = COALESCE($2, full_name),
                specialty = COALESCE($3, specialty),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                signature_url = COALESCE($6, signature_url),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            COACH_COLUMNS
        ))
        .bind(coach_id)
        .bind(input.full_name.as_deref().map(str::trim))
        .bind(&input.specialty)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.signature_url)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Coach".to_string()))
    }

    /// Soft-delete a coach that is not assigned to an open training
    pub async fn delete_coach(&self, coach_id: Uuid) -> AppResult<()> {
        let _ = self.get_coach(coach_id).await?;

        let open_trainings: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM trainings
            WHERE coach_id = $1
              AND deleted_at IS NULL
              AND status IN ('scheduled', 'in_progress')
            "#,
        )
        .bind(coach_id)
        .fetch_one(&self.db)
        .await?;

        if open_trainings > 0 {
            return Err(AppError::conflict(
                "coach",
                "Coach is assigned to scheduled or in-progress trainings",
                "El instructor tiene capacitaciones programadas o en curso",
            ));
        }

        sqlx::query("UPDATE coaches SET deleted_at = NOW() WHERE id = $1")
            .bind(coach_id)
            .execute(&self.db)
            .await?;

        tracing::info!(coach_id = %coach_id, "Coach deleted");
        Ok(())
    }
}
