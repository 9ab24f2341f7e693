//! User administration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{permissions_for_role, Pagination, PaginatedResponse, UserRole};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{field_error, AppError, AppResult};
use crate::services::auth::hash_password;

/// User administration service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// User record (never carries the password hash)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current user profile with resolved permissions
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub permissions: Vec<String>,
}

/// Input for creating a user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    pub full_name: String,
    pub role: UserRole,
}

/// Input for updating a user
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// Filters for listing users
#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

const USER_COLUMNS: &str =
    "id, email, full_name, role, is_active, last_login_at, created_at, updated_at";

impl UserService {
    /// Create a new UserService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a user account
    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<User> {
        input.validate()?;
        shared::validate_password(&input.password).map_err(field_error("password"))?;

        let password_hash = hash_password(&input.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, full_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(input.email.trim())
        .bind(&password_hash)
        .bind(input.full_name.trim())
        .bind(input.role)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User created");
        Ok(user)
    }

    /// Get a user by ID
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Profile of the authenticated user
    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<UserProfile> {
        let user = self.get_user(user_id).await?;
        let permissions = permissions_for_role(user.role);
        Ok(UserProfile { user, permissions })
    }

    /// List users with optional filters
    pub async fn list_users(
        &self,
        filter: UserFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<User>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let where_clause = r#"
            WHERE ($1::VARCHAR IS NULL OR role = $1)
              AND ($2::BOOLEAN IS NULL OR is_active = $2)
              AND ($3::VARCHAR IS NULL OR email ILIKE $3 OR full_name ILIKE $3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {}", where_clause))
            .bind(filter.role)
            .bind(filter.is_active)
            .bind(&search)
            .fetch_one(&self.db)
            .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users {} ORDER BY full_name ASC LIMIT $4 OFFSET $5",
            USER_COLUMNS, where_clause
        ))
        .bind(filter.role)
        .bind(filter.is_active)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(users, &pagination, total.max(0) as u64))
    }

    /// Update a user. A new password, when given, replaces the stored hash
    /// and revokes every outstanding refresh token.
    pub async fn update_user(
        &self,
        acting_user_id: Uuid,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> AppResult<User> {
        input.validate()?;

        if acting_user_id == user_id && input.is_active == Some(false) {
            return Err(AppError::validation(
                "is_active",
                "You cannot deactivate your own account",
                "No puede desactivar su propia cuenta",
            ));
        }

        let password_hash = match input.password.as_deref() {
            Some(password) => {
                shared::validate_password(password).map_err(field_error("password"))?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                full_name = COALESCE($2, full_name),
                role = COALESCE($3, role),
                is_active = COALESCE($4, is_active),
                password_hash = COALESCE($5, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(input.full_name.as_deref().map(str::trim))
        .bind(input.role)
        .bind(input.is_active)
        .bind(&password_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if password_hash.is_some() || input.is_active == Some(false) {
            sqlx::query(
                "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(user_id = %user_id, updated_by = %acting_user_id, "User updated");
        Ok(user)
    }
}
