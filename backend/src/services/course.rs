//! Course and course level service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{is_known_document_type, Pagination, PaginatedResponse};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{field_error, AppError, AppResult};

/// Course service for managing courses and their levels
#[derive(Clone)]
pub struct CourseService {
    db: PgPool,
}

/// Course record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub validity_months: Option<i32>,
    pub min_score: Decimal,
    pub min_attendance_percent: Decimal,
    pub required_document_types: Vec<String>,
    pub level_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course level record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CourseLevel {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub level_order: i32,
    pub hours: Decimal,
    pub min_score: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course with its levels
#[derive(Debug, Clone, Serialize)]
pub struct CourseWithLevels {
    #[serde(flatten)]
    pub course: Course,
    pub levels: Vec<CourseLevel>,
}

/// Input for creating a course
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseInput {
    #[validate(length(min = 2, max = 30, message = "Code must be 2-30 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 120, message = "Validity must be 1-120 months"))]
    pub validity_months: Option<i32>,
    pub min_score: Option<Decimal>,
    pub min_attendance_percent: Option<Decimal>,
    #[serde(default)]
    pub required_document_types: Vec<String>,
}

/// Input for updating a course
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 120, message = "Validity must be 1-120 months"))]
    pub validity_months: Option<i32>,
    /// Clears the validity period so certificates never expire
    #[serde(default)]
    pub clear_validity: bool,
    pub min_score: Option<Decimal>,
    pub min_attendance_percent: Option<Decimal>,
    pub required_document_types: Option<Vec<String>>,
}

/// Input for creating a course level
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLevelInput {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    #[validate(range(min = 1, message = "Level order must be positive"))]
    pub level_order: i32,
    pub hours: Decimal,
    pub min_score: Option<Decimal>,
}

/// Input for updating a course level
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLevelInput {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "Level order must be positive"))]
    pub level_order: Option<i32>,
    pub hours: Option<Decimal>,
    pub min_score: Option<Decimal>,
}

/// Filters for listing courses
#[derive(Debug, Default, Deserialize)]
pub struct CourseFilter {
    pub search: Option<String>,
}

const COURSE_SELECT: &str = r#"
    SELECT c.id, c.code, c.name, c.description, c.validity_months, c.min_score,
           c.min_attendance_percent, c.required_document_types,
           (SELECT COUNT(*) FROM course_levels l WHERE l.course_id = c.id AND l.deleted_at IS NULL) AS level_count,
           c.created_at, c.updated_at
    FROM courses c
"#;

const LEVEL_COLUMNS: &str =
    "id, course_id, name, level_order, hours, min_score, created_at, updated_at";

/// Check course thresholds and required document types
fn validate_course_rules(
    min_score: Option<Decimal>,
    min_attendance_percent: Option<Decimal>,
    required_document_types: Option<&[String]>,
) -> AppResult<()> {
    if let Some(score) = min_score {
        shared::validate_score(score).map_err(field_error("min_score"))?;
    }
    if let Some(percent) = min_attendance_percent {
        shared::validate_percent(percent).map_err(field_error("min_attendance_percent"))?;
    }
    if let Some(types) = required_document_types {
        if let Some(unknown) = types.iter().find(|t| !is_known_document_type(t)) {
            return Err(AppError::Validation {
                field: "required_document_types".to_string(),
                message: format!("Unknown document type: {}", unknown),
                message_es: format!("Tipo de documento desconocido: {}", unknown),
            });
        }
    }
    Ok(())
}

fn validate_level_rules(hours: Option<Decimal>, min_score: Option<Decimal>) -> AppResult<()> {
    if let Some(hours) = hours {
        shared::validate_hours(hours).map_err(field_error("hours"))?;
    }
    if let Some(score) = min_score {
        shared::validate_score(score).map_err(field_error("min_score"))?;
    }
    Ok(())
}

fn dedup_document_types(types: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(types.len());
    for t in types {
        let t = t.trim().to_lowercase();
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

impl CourseService {
    /// Create a new CourseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Courses
    // ========================================================================

    /// Create a course
    pub async fn create_course(&self, input: CreateCourseInput) -> AppResult<Course> {
        input.validate()?;
        let document_types = dedup_document_types(&input.required_document_types);
        validate_course_rules(
            input.min_score,
            input.min_attendance_percent,
            Some(&document_types),
        )?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO courses (code, name, description, validity_months, min_score,
                                 min_attendance_percent, required_document_types)
            VALUES ($1, $2, $3, $4, COALESCE($5, 14), COALESCE($6, 80), $7)
            RETURNING id
            "#,
        )
        .bind(input.code.trim().to_uppercase())
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.validity_months)
        .bind(input.min_score)
        .bind(input.min_attendance_percent)
        .bind(&document_types)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(course_id = %id, "Course created");
        self.get_course(id).await
    }

    /// Get a course by ID
    pub async fn get_course(&self, course_id: Uuid) -> AppResult<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "{} WHERE c.id = $1 AND c.deleted_at IS NULL",
            COURSE_SELECT
        ))
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course".to_string()))
    }

    /// Get a course together with its levels
    pub async fn get_course_with_levels(&self, course_id: Uuid) -> AppResult<CourseWithLevels> {
        let course = self.get_course(course_id).await?;
        let levels = self.list_levels(course_id).await?;
        Ok(CourseWithLevels { course, levels })
    }

    /// List courses
    pub async fn list_courses(
        &self,
        filter: CourseFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Course>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let where_clause = r#"
            WHERE c.deleted_at IS NULL
              AND ($1::VARCHAR IS NULL OR c.name ILIKE $1 OR c.code ILIKE $1)
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM courses c {}", where_clause))
                .bind(&search)
                .fetch_one(&self.db)
                .await?;

        let courses = sqlx::query_as::<_, Course>(&format!(
            "{} {} ORDER BY c.name ASC LIMIT $2 OFFSET $3",
            COURSE_SELECT, where_clause
        ))
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(courses, &pagination, total.max(0) as u64))
    }

    /// Update a course
    pub async fn update_course(&self, course_id: Uuid, input: UpdateCourseInput) -> AppResult<Course> {
        input.validate()?;
        let document_types = input
            .required_document_types
            .as_deref()
            .map(dedup_document_types);
        validate_course_rules(
            input.min_score,
            input.min_attendance_percent,
            document_types.as_deref(),
        )?;

        let result = sqlx::query(
            r#"
            UPDATE courses SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                validity_months = CASE WHEN $4 THEN NULL ELSE COALESCE($5, validity_months) END,
                min_score = COALESCE($6, min_score),
                min_attendance_percent = COALESCE($7, min_attendance_percent),
                required_document_types = COALESCE($8, required_document_types),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(course_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.clear_validity)
        .bind(input.validity_months)
        .bind(input.min_score)
        .bind(input.min_attendance_percent)
        .bind(&document_types)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Course".to_string()));
        }

        self.get_course(course_id).await
    }

    /// Soft-delete a course together with its levels
    pub async fn delete_course(&self, course_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE courses SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Course".to_string()));
        }

        let levels = sqlx::query(
            "UPDATE course_levels SET deleted_at = NOW() WHERE course_id = $1 AND deleted_at IS NULL",
        )
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            course_id = %course_id,
            levels_deleted = levels.rows_affected(),
            "Course deleted"
        );
        Ok(())
    }

    // ========================================================================
    // Course levels
    // ========================================================================

    /// Add a level to a course
    pub async fn create_level(&self, course_id: Uuid, input: CreateLevelInput) -> AppResult<CourseLevel> {
        input.validate()?;
        validate_level_rules(Some(input.hours), input.min_score)?;

        // Validate course exists
        let _ = self.get_course(course_id).await?;

        let level = sqlx::query_as::<_, CourseLevel>(&format!(
            r#"
            INSERT INTO course_levels (course_id, name, level_order, hours, min_score)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            LEVEL_COLUMNS
        ))
        .bind(course_id)
        .bind(input.name.trim())
        .bind(input.level_order)
        .bind(input.hours)
        .bind(input.min_score)
        .fetch_one(&self.db)
        .await?;

        Ok(level)
    }

    /// List the levels of a course in order
    pub async fn list_levels(&self, course_id: Uuid) -> AppResult<Vec<CourseLevel>> {
        let levels = sqlx::query_as::<_, CourseLevel>(&format!(
            r#"
            SELECT {} FROM course_levels
            WHERE course_id = $1 AND deleted_at IS NULL
            ORDER BY level_order ASC
            "#,
            LEVEL_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;

        Ok(levels)
    }

    /// Get a level of a course
    pub async fn get_level(&self, course_id: Uuid, level_id: Uuid) -> AppResult<CourseLevel> {
        sqlx::query_as::<_, CourseLevel>(&format!(
            r#"
            SELECT {} FROM course_levels
            WHERE id = $1 AND course_id = $2 AND deleted_at IS NULL
            "#,
            LEVEL_COLUMNS
        ))
        .bind(level_id)
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course level".to_string()))
    }

    /// Update a level
    pub async fn update_level(
        &self,
        course_id: Uuid,
        level_id: Uuid,
        input: UpdateLevelInput,
    ) -> AppResult<CourseLevel> {
        input.validate()?;
        validate_level_rules(input.hours, input.min_score)?;

        sqlx::query_as::<_, CourseLevel>(&format!(
            r#"
            UPDATE course_levels SET
                name = COALESCE($3, name),
                level_order = COALESCE($4, level_order),
                hours = COALESCE($5, hours),
                min_score = COALESCE($6, min_score),
                updated_at = NOW()
            WHERE id = $1 AND course_id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            LEVEL_COLUMNS
        ))
        .bind(level_id)
        .bind(course_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.level_order)
        .bind(input.hours)
        .bind(input.min_score)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course level".to_string()))
    }

    /// Soft-delete a level that has no open trainings
    pub async fn delete_level(&self, course_id: Uuid, level_id: Uuid) -> AppResult<()> {
        let _ = self.get_level(course_id, level_id).await?;

        let open_trainings: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM trainings
            WHERE course_level_id = $1
              AND deleted_at IS NULL
              AND status IN ('scheduled', 'in_progress')
            "#,
        )
        .bind(level_id)
        .fetch_one(&self.db)
        .await?;

        if open_trainings > 0 {
            return Err(AppError::conflict(
                "course_level",
                "Level has scheduled or in-progress trainings",
                "El nivel tiene capacitaciones programadas o en curso",
            ));
        }

        sqlx::query("UPDATE course_levels SET deleted_at = NOW() WHERE id = $1")
            .bind(level_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_rules_reject_out_of_range_thresholds() {
        assert!(validate_course_rules(Some(Decimal::from(21)), None, None).is_err());
        assert!(validate_course_rules(None, Some(Decimal::from(101)), None).is_err());
        assert!(validate_course_rules(Some(Decimal::from(14)), Some(Decimal::from(80)), None).is_ok());
    }

    #[test]
    fn test_course_rules_reject_unknown_document_type() {
        let types = vec!["medical_exam".to_string(), "birth_certificate".to_string()];
        match validate_course_rules(None, None, Some(&types)) {
            Err(AppError::Validation { field, message, .. }) => {
                assert_eq!(field, "required_document_types");
                assert!(message.contains("birth_certificate"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_document_types_are_deduplicated() {
        let types = vec![
            "Medical_Exam".to_string(),
            " medical_exam ".to_string(),
            "sctr_policy".to_string(),
        ];
        assert_eq!(
            dedup_document_types(&types),
            vec!["medical_exam".to_string(), "sctr_policy".to_string()]
        );
    }

    #[test]
    fn test_level_rules() {
        assert!(validate_level_rules(Some(Decimal::ZERO), None).is_err());
        assert!(validate_level_rules(Some(Decimal::from(8)), Some(Decimal::from(15))).is_ok());
    }
}
