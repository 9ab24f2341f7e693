//! HTTP handlers for user administration

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, PaginatedResponse, Resource};
use uuid::Uuid;

use super::PageQuery;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::user::{CreateUserInput, UpdateUserInput, User, UserFilter, UserService};
use crate::AppState;

/// Create a user account
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    current_user.require(Resource::User, Action::Create)?;
    let service = UserService::new(state.db);
    let user = service.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// List users
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<UserFilter>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<User>>> {
    current_user.require(Resource::User, Action::View)?;
    let service = UserService::new(state.db);
    let users = service.list_users(filter, page.pagination()).await?;
    Ok(Json(users))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    current_user.require(Resource::User, Action::View)?;
    let service = UserService::new(state.db);
    let user = service.get_user(user_id).await?;
    Ok(Json(user))
}

/// Update a user account
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<User>> {
    current_user.require(Resource::User, Action::Edit)?;
    let service = UserService::new(state.db);
    let user = service.update_user(current_user.id(), user_id, input).await?;
    Ok(Json(user))
}
