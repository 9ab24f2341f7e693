//! HTTP handlers for regionals and cities

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::location::{
    City, CreateCityInput, LocationService, Regional, RegionalInput, UpdateCityInput,
};
use crate::AppState;

// ============================================================================
// Regionals
// ============================================================================

/// Create a regional
pub async fn create_regional(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RegionalInput>,
) -> AppResult<(StatusCode, Json<Regional>)> {
    current_user.require(Resource::Location, Action::Create)?;
    let service = LocationService::new(state.db);
    let regional = service.create_regional(input).await?;
    Ok((StatusCode::CREATED, Json(regional)))
}

/// List regionals
pub async fn list_regionals(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Regional>>> {
    current_user.require(Resource::Location, Action::View)?;
    let service = LocationService::new(state.db);
    let regionals = service.list_regionals().await?;
    Ok(Json(regionals))
}

/// Get a regional by ID
pub async fn get_regional(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(regional_id): Path<Uuid>,
) -> AppResult<Json<Regional>> {
    current_user.require(Resource::Location, Action::View)?;
    let service = LocationService::new(state.db);
    let regional = service.get_regional(regional_id).await?;
    Ok(Json(regional))
}

/// Update a regional
pub async fn update_regional(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(regional_id): Path<Uuid>,
    Json(input): Json<RegionalInput>,
) -> AppResult<Json<Regional>> {
    current_user.require(Resource::Location, Action::Edit)?;
    let service = LocationService::new(state.db);
    let regional = service.update_regional(regional_id, input).await?;
    Ok(Json(regional))
}

/// Delete a regional without cities
pub async fn delete_regional(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(regional_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Location, Action::Delete)?;
    let service = LocationService::new(state.db);
    service.delete_regional(regional_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Cities
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListCitiesQuery {
    pub regional_id: Option<Uuid>,
}

/// Create a city
pub async fn create_city(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCityInput>,
) -> AppResult<(StatusCode, Json<City>)> {
    current_user.require(Resource::Location, Action::Create)?;
    let service = LocationService::new(state.db);
    let city = service.create_city(input).await?;
    Ok((StatusCode::CREATED, Json(city)))
}

/// List cities, optionally for one regional
pub async fn list_cities(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListCitiesQuery>,
) -> AppResult<Json<Vec<City>>> {
    current_user.require(Resource::Location, Action::View)?;
    let service = LocationService::new(state.db);
    let cities = service.list_cities(query.regional_id).await?;
    Ok(Json(cities))
}

/// Get a city by ID
pub async fn get_city(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(city_id): Path<Uuid>,
) -> AppResult<Json<City>> {
    current_user.require(Resource::Location, Action::View)?;
    let service = LocationService::new(state.db);
    let city = service.get_city(city_id).await?;
    Ok(Json(city))
}

/// Update a city
pub async fn update_city(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(city_id): Path<Uuid>,
    Json(input): Json<UpdateCityInput>,
) -> AppResult<Json<City>> {
    current_user.require(Resource::Location, Action::Edit)?;
    let service = LocationService::new(state.db);
    let city = service.update_city(city_id, input).await?;
    Ok(Json(city))
}

/// Delete a city
pub async fn delete_city(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(city_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require(Resource::Location, Action::Delete)?;
    let service = LocationService::new(state.db);
    service.delete_city(city_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
