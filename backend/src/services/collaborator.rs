//! Collaborator service: worker records and their supporting documents

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    is_known_document_type, validate_document_number, DocumentKind, Pagination,
    PaginatedResponse,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{field_error, AppError, AppResult};

/// Collaborator service
#[derive(Clone)]
pub struct CollaboratorService {
    db: PgPool,
}

/// Collaborator record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Collaborator {
    pub id: Uuid,
    pub document_type: DocumentKind,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub position: Option<String>,
    pub area: Option<String>,
    pub company: Option<String>,
    pub city_id: Option<Uuid>,
    pub city_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Supporting document on a collaborator's file
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CollaboratorDocument {
    pub id: Uuid,
    pub collaborator_id: Uuid,
    pub document_type: String,
    pub file_url: String,
    pub issued_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

/// Input for creating a collaborator
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCollaboratorInput {
    pub document_type: DocumentKind,
    pub document_number: String,
    #[validate(length(min = 1, max = 120, message = "First name must be 1-120 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 120, message = "Last name must be 1-120 characters"))]
    pub last_name: String,
    #[validate(length(max = 120))]
    pub position: Option<String>,
    #[validate(length(max = 120))]
    pub area: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    pub city_id: Option<Uuid>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hire_date: Option<NaiveDate>,
}

/// Input for updating a collaborator
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCollaboratorInput {
    #[validate(length(min = 1, max = 120, message = "First name must be 1-120 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 120, message = "Last name must be 1-120 characters"))]
    pub last_name: Option<String>,
    #[validate(length(max = 120))]
    pub position: Option<String>,
    #[validate(length(max = 120))]
    pub area: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    pub city_id: Option<Uuid>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

/// Input for attaching a supporting document
#[derive(Debug, Deserialize, Validate)]
pub struct AddDocumentInput {
    pub document_type: String,
    #[validate(url(message = "File URL must be a valid URL"))]
    pub file_url: String,
    pub issued_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
}

/// Filters for listing collaborators
#[derive(Debug, Default, Deserialize)]
pub struct CollaboratorFilter {
    pub search: Option<String>,
    pub city_id: Option<Uuid>,
    pub regional_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

const COLLABORATOR_SELECT: &str = r#"
    SELECT co.id, co.document_type, co.document_number, co.first_name, co.last_name,
           co.position, co.area, co.company, co.city_id, ci.name AS city_name,
           co.email, co.phone, co.hire_date, co.is_active, co.created_at, co.updated_at
    FROM collaborators co
    LEFT JOIN cities ci ON ci.id = co.city_id
"#;

const DOCUMENT_COLUMNS: &str =
    "id, collaborator_id, document_type, file_url, issued_on, expires_on, uploaded_by, uploaded_at";

/// Normalized storage form of a document number
pub fn normalize_document_number(number: &str) -> String {
    number.trim().to_uppercase()
}

impl CollaboratorService {
    /// Create a new CollaboratorService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Collaborators
    // ========================================================================

    /// Register a collaborator
    pub async fn create_collaborator(&self, input: CreateCollaboratorInput) -> AppResult<Collaborator> {
        input.validate()?;

        let document_number = normalize_document_number(&input.document_number);
        validate_document_number(input.document_type, &document_number)
            .map_err(field_error("document_number"))?;
        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(field_error("phone"))?;
        }

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO collaborators (
                document_type, document_number, first_name, last_name, position, area,
                company, city_id, email, phone, hire_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(input.document_type)
        .bind(&document_number)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(&input.position)
        .bind(&input.area)
        .bind(&input.company)
        .bind(input.city_id)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.hire_date)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(collaborator_id = %id, "Collaborator created");
        self.get_collaborator(id).await
    }

    /// Get a collaborator by ID
    pub async fn get_collaborator(&self, collaborator_id: Uuid) -> AppResult<Collaborator> {
        sqlx::query_as::<_, Collaborator>(&format!(
            "{} WHERE co.id = $1 AND co.deleted_at IS NULL",
            COLLABORATOR_SELECT
        ))
        .bind(collaborator_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Collaborator".to_string()))
    }

    /// List collaborators with search and filters
    pub async fn list_collaborators(
        &self,
        filter: CollaboratorFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Collaborator>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let where_clause = r#"
            WHERE co.deleted_at IS NULL
              AND ($1::VARCHAR IS NULL
                   OR co.document_number ILIKE $1
                   OR co.first_name ILIKE $1
                   OR co.last_name ILIKE $1
                   OR (co.first_name || ' ' || co.last_name) ILIKE $1)
              AND ($2::UUID IS NULL OR co.city_id = $2)
              AND ($3::UUID IS NULL OR ci.regional_id = $3)
              AND ($4::BOOLEAN IS NULL OR co.is_active = $4)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*) FROM collaborators co
               LEFT JOIN cities ci ON ci.id = co.city_id {}"#,
            where_clause
        ))
        .bind(&search)
        .bind(filter.city_id)
        .bind(filter.regional_id)
        .bind(filter.is_active)
        .fetch_one(&self.db)
        .await?;

        let collaborators = sqlx::query_as::<_, Collaborator>(&format!(
            "{} {} ORDER BY co.last_name ASC, co.first_name ASC LIMIT $5 OFFSET $6",
            COLLABORATOR_SELECT, where_clause
        ))
        .bind(&search)
        .bind(filter.city_id)
        .bind(filter.regional_id)
        .bind(filter.is_active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            collaborators,
            &pagination,
            total.max(0) as u64,
        ))
    }

    /// Update a collaborator
    pub async fn update_collaborator(
        &self,
        collaborator_id: Uuid,
        input: UpdateCollaboratorInput,
    ) -> AppResult<Collaborator> {
        input.validate()?;
        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(field_error("phone"))?;
        }

        let result = sqlx::query(
            r#"
            UPDATE collaborators SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                position = COALESCE($4, position),
                area = COALESCE($5, area),
                company = COALESCE($6, company),
                city_id = COALESCE($7, city_id),
                email = COALESCE($8, email),
                phone = COALESCE($9, phone),
                hire_date = COALESCE($10, hire_date),
                is_active = COALESCE($11, is_active),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(collaborator_id)
        .bind(input.first_name.as_deref().map(str::trim))
        .bind(input.last_name.as_deref().map(str::trim))
        .bind(&input.position)
        .bind(&input.area)
        .bind(&input.company)
        .bind(input.city_id)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.hire_date)
        .bind(input.is_active)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Collaborator".to_string()));
        }

        self.get_collaborator(collaborator_id).await
    }

    /// Soft-delete a collaborator
    pub async fn delete_collaborator(&self, collaborator_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE collaborators SET deleted_at = NOW(), is_active = false
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(collaborator_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Collaborator".to_string()));
        }

        tracing::info!(collaborator_id = %collaborator_id, "Collaborator deleted");
        Ok(())
    }

    // ========================================================================
    // Supporting documents
    // ========================================================================

    /// Attach a supporting document
    pub async fn add_document(
        &self,
        collaborator_id: Uuid,
        uploaded_by: Uuid,
        input: AddDocumentInput,
    ) -> AppResult<CollaboratorDocument> {
        input.validate()?;

        let document_type = input.document_type.trim().to_lowercase();
        if !is_known_document_type(&document_type) {
            return Err(AppError::Validation {
                field: "document_type".to_string(),
                message: format!("Unknown document type: {}", document_type),
                message_es: format!("Tipo de documento desconocido: {}", document_type),
            });
        }
        if matches!(input.expires_on, Some(expiry) if expiry < input.issued_on) {
            return Err(AppError::validation(
                "expires_on",
                "Expiry date cannot be before the issue date",
                "La fecha de vencimiento no puede ser anterior a la de emisión",
            ));
        }

        // Validate collaborator exists
        let _ = self.get_collaborator(collaborator_id).await?;

        let document = sqlx::query_as::<_, CollaboratorDocument>(&format!(
            r#"
            INSERT INTO collaborator_documents (
                collaborator_id, document_type, file_url, issued_on, expires_on, uploaded_by
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(collaborator_id)
        .bind(&document_type)
        .bind(&input.file_url)
        .bind(input.issued_on)
        .bind(input.expires_on)
        .bind(uploaded_by)
        .fetch_one(&self.db)
        .await?;

        Ok(document)
    }

    /// List a collaborator's supporting documents, newest first
    pub async fn list_documents(&self, collaborator_id: Uuid) -> AppResult<Vec<CollaboratorDocument>> {
        let _ = self.get_collaborator(collaborator_id).await?;

        let documents = sqlx::query_as::<_, CollaboratorDocument>(&format!(
            r#"
            SELECT {} FROM collaborator_documents
            WHERE collaborator_id = $1
            ORDER BY document_type ASC, issued_on DESC
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(collaborator_id)
        .fetch_all(&self.db)
        .await?;

        Ok(documents)
    }

    /// Remove a supporting document
    pub async fn delete_document(&self, collaborator_id: Uuid, document_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "DELETE FROM collaborator_documents WHERE id = $1 AND collaborator_id = $2",
        )
        .bind(document_id)
        .bind(collaborator_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Document".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_document_number() {
        assert_eq!(normalize_document_number("  ab123456 "), "AB123456");
        assert_eq!(normalize_document_number("12345678"), "12345678");
    }
}
