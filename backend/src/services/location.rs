//! Location service for regionals and cities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Location service for managing regionals and their cities
#[derive(Clone)]
pub struct LocationService {
    db: PgPool,
}

/// Regional record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Regional {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub city_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// City record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct City {
    pub id: Uuid,
    pub regional_id: Uuid,
    pub regional_name: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating a regional
#[derive(Debug, Deserialize, Validate)]
pub struct RegionalInput {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    #[validate(length(max = 20, message = "Code must be at most 20 characters"))]
    pub code: Option<String>,
}

/// Input for creating a city
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCityInput {
    pub regional_id: Uuid,
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
}

/// Input for updating a city
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCityInput {
    pub regional_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: Option<String>,
}

const REGIONAL_SELECT: &str = r#"
    SELECT r.id, r.name, r.code,
           (SELECT COUNT(*) FROM cities c WHERE c.regional_id = r.id AND c.deleted_at IS NULL) AS city_count,
           r.created_at, r.updated_at
    FROM regionals r
"#;

const CITY_SELECT: &str = r#"
    SELECT c.id, c.regional_id, r.name AS regional_name, c.name, c.created_at, c.updated_at
    FROM cities c
    JOIN regionals r ON r.id = c.regional_id
"#;

impl LocationService {
    /// Create a new LocationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Regionals
    // ========================================================================

    /// Create a new regional
    pub async fn create_regional(&self, input: RegionalInput) -> AppResult<Regional> {
        input.validate()?;

        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO regionals (name, code) VALUES ($1, $2) RETURNING id",
        )
        .bind(input.name.trim())
        .bind(input.code.as_deref().map(str::trim))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(regional_id = %id, "Regional created");
        self.get_regional(id).await
    }

    /// Get a regional by ID
    pub async fn get_regional(&self, regional_id: Uuid) -> AppResult<Regional> {
        sqlx::query_as::<_, Regional>(&format!(
            "{} WHERE r.id = $1 AND r.deleted_at IS NULL",
            REGIONAL_SELECT
        ))
        .bind(regional_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Regional".to_string()))
    }

    /// List all live regionals
    pub async fn list_regionals(&self) -> AppResult<Vec<Regional>> {
        let regionals = sqlx::query_as::<_, Regional>(&format!(
            "{} WHERE r.deleted_at IS NULL ORDER BY r.name ASC",
            REGIONAL_SELECT
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(regionals)
    }

    /// Update a regional
    pub async fn update_regional(
        &self,
        regional_id: Uuid,
        input: RegionalInput,
    ) -> AppResult<Regional> {
        input.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE regionals SET name = $2, code = $3, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(regional_id)
        .bind(input.name.trim())
        .bind(input.code.as_deref().map(str::trim))
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Regional".to_string()));
        }

        self.get_regional(regional_id).await
    }

    /// Soft-delete a regional. Regionals that still have cities cannot be deleted.
    pub async fn delete_regional(&self, regional_id: Uuid) -> AppResult<()> {
        let regional = self.get_regional(regional_id).await?;

        if regional.city_count > 0 {
            return Err(AppError::conflict(
                "regional",
                "Regional still has cities assigned",
                "La regional aún tiene ciudades asignadas",
            ));
        }

        sqlx::query("UPDATE regionals SET deleted_at = NOW() WHERE id = $1")
            .bind(regional_id)
            .execute(&self.db)
            .await?;

        tracing::info!(regional_id = %regional_id, "Regional deleted");
        Ok(())
    }

    // ========================================================================
    // Cities
    // ========================================================================

    /// Create a new city
    pub async fn create_city(&self, input: CreateCityInput) -> AppResult<City> {
        input.validate()?;

        // Validate regional exists
        let _ = self.get_regional(input.regional_id).await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO cities (regional_id, name) VALUES ($1, $2) RETURNING id",
        )
        .bind(input.regional_id)
        .bind(input.name.trim())
        .fetch_one(&self.db)
        .await?;

        self.get_city(id).await
    }

    /// Get a city by ID
    pub async fn get_city(&self, city_id: Uuid) -> AppResult<City> {
        sqlx::query_as::<_, City>(&format!(
            "{} WHERE c.id = $1 AND c.deleted_at IS NULL",
            CITY_SELECT
        ))
        .bind(city_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("City".to_string()))
    }

    /// List cities, optionally restricted to one regional
    pub async fn list_cities(&self, regional_id: Option<Uuid>) -> AppResult<Vec<City>> {
        let cities = sqlx::query_as::<_, City>(&format!(
            r#"{}
            WHERE c.deleted_at IS NULL
              AND ($1::UUID IS NULL OR c.regional_id = $1)
            ORDER BY r.name ASC, c.name ASC"#,
            CITY_SELECT
        ))
        .bind(regional_id)
        .fetch_all(&self.db)
        .await?;

        Ok(cities)
    }

    /// Update a city
    pub async fn update_city(&self, city_id: Uuid, input: UpdateCityInput) -> AppResult<City> {
        input.validate()?;

        if let Some(regional_id) = input.regional_id {
            let _ = self.get_regional(regional_id).await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE cities SET
                regional_id = COALESCE($2, regional_id),
                name = COALESCE($3, name),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(city_id)
        .bind(input.regional_id)
        .bind(input.name.as_deref().map(str::trim))
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("City".to_string()));
        }

        self.get_city(city_id).await
    }

    /// Soft-delete a city
    pub async fn delete_city(&self, city_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE cities SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(city_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("City".to_string()));
        }

        Ok(())
    }
}
