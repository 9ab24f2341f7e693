//! HTTP handlers for courses and their levels

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
use crate::services::course::{
    Course, CourseFilter, CourseLevel, CourseService, CourseWithLevels, CreateCourseInput,
    CreateLevelInput, UpdateCourseInput, UpdateLevelInput,
};
use crate::AppState;

// ============================================================================
// Courses
// ============================================================================

/// Create a course
pub async fn create_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCourseInput>,
) -> AppResult<(StatusCode, Json<Course>)> {
    current_user.require(Resource::Course, Action::Create)?;
    let service = CourseService::new(state.db);
    let course = service.create_course(input).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// List courses
pub async fn list_courses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<CourseFilter>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Course>>> {
    current_user.require(Resource::Course, Action::View)?;
    let service = CourseService::new(state.db);
    let courses = service.list_courses(filter, page.pagination()).await?;
    Ok(Json(courses))
}

/// Get a course with its levels
pub async fn get_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<CourseWithLevels>> {
    current_user.require(Resource::Course, Action::View)?;
    let service = CourseService::new(state.db);
    let course = service.get_course_with_levels(course_id).await?;
    Ok(Json(course))
}

/// Update a course
pub async fn update_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
    Json(input): Json<UpdateCourseInput>,
) -> AppResult<Json<Course>> {
    current_user.require(Resource::Course, Action::Edit)?;
    let service = CourseService::new(state.db);
    let course = service.update_course(course_id, input).await?;
    Ok(Json(course))
}

/// Delete a course and its levels
pub async fn delete_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Course, Action::Delete)?;
    let service = CourseService::new(state.db);
    service.delete_course(course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Levels
// ============================================================================

/// Add a level to a course
pub async fn create_level(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
    Json(input): Json<CreateLevelInput>,
) -> AppResult<(StatusCode, Json<CourseLevel>)> {
    current_user.require(Resource::Course, Action::Create)?;
    let service = CourseService::new(state.db);
    let level = service.create_level(course_id, input).await?;
    Ok((StatusCode::CREATED, Json(level)))
}

/// List the levels of a course
pub async fn list_levels(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<Vec<CourseLevel>>> {
    current_user.require(Resource::Course, Action::View)?;
    let service = CourseService::new(state.db);
    let levels = service.list_levels(course_id).await?;
    Ok(Json(levels))
}

/// Get one level
pub async fn get_level(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((course_id, level_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<CourseLevel>> {
    current_user.require(Resource::Course, Action::View)?;
    let service = CourseService::new(state.db);
    let level = service.get_level(course_id, level_id).await?;
    Ok(Json(level))
}

/// Update a level
pub async fn update_level(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((course_id, level_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateLevelInput>,
) -> AppResult<Json<CourseLevel>> {
    current_user.require(Resource::Course, Action::Edit)?;
    let service = CourseService::new(state.db);
    let level = service.update_level(course_id, level_id, input).await?;
    Ok(Json(level))
}

/// Delete a level
pub async fn delete_level(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((course_id, level_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Course, Action::Delete)?;
    let service = CourseService::new(state.db);
    service.delete_level(course_id, level_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
