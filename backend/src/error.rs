//! Error handling for the SST Training Management Platform
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::IneligibilityReason;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_es: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Collaborator is not eligible for certification")]
    NotEligible { reasons: Vec<IneligibilityReason> },

    // Upload errors
    #[error("Import error: {0}")]
    Import(String),

    #[error("Uploaded file exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Field-level validation error with messages in both languages
    pub fn validation(field: &str, message: &str, message_es: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_es: message_es.to_string(),
        }
    }

    /// Conflict on a resource with messages in both languages
    pub fn conflict(resource: &str, message: &str, message_es: &str) -> Self {
        AppError::Conflict {
            resource: resource.to_string(),
            message: message.to_string(),
            message_es: message_es.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => {
                    let constraint = db_err.constraint().unwrap_or("record").to_string();
                    return AppError::DuplicateEntry(constraint);
                }
                // foreign_key_violation
                Some("23503") => {
                    let constraint = db_err.constraint().unwrap_or("reference").to_string();
                    return AppError::Conflict {
                        resource: constraint,
                        message: "The record is referenced by or references missing data"
                            .to_string(),
                        message_es: "El registro está referenciado o referencia datos inexistentes"
                            .to_string(),
                    };
                }
                _ => {}
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<&str> = field_errors.keys().copied().collect();
        fields.sort_unstable();

        match fields.first() {
            Some(field) => {
                let message = field_errors
                    .get(field)
                    .and_then(|errs| errs.first())
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                AppError::Validation {
                    field: field.to_string(),
                    message_es: format!("Valor inválido para {}", field),
                    message,
                }
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: &str, message_en: impl Into<String>, message_es: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_es: message_es.into(),
            field: None,
            details: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "INVALID_CREDENTIALS",
                    "Invalid email or password",
                    "Correo o contraseña incorrectos",
                ),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                    "No tiene permiso para realizar esta acción",
                ),
            ),
            AppError::Unauthorized { message, message_es } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone(), message_es.clone()),
            ),
            AppError::Validation {
                field,
                message,
                message_es,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_es.clone())
                    .with_field(field),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "VALIDATION_ERROR",
                    msg.clone(),
                    format!("Datos inválidos: {}", msg),
                ),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                    format!("Ya existe un registro con este {}", field),
                )
                .with_field(field),
            ),
            AppError::Conflict {
                resource,
                message,
                message_es,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", message.clone(), message_es.clone())
                    .with_field(resource),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("No se encontró {}", resource),
                ),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INVALID_STATE_TRANSITION",
                    msg.clone(),
                    format!("No se puede cambiar el estado: {}", msg),
                ),
            ),
            AppError::NotEligible { reasons } => {
                let mut detail = ErrorDetail::new(
                    "NOT_ELIGIBLE",
                    reasons
                        .iter()
                        .map(|r| r.message_en())
                        .collect::<Vec<_>>()
                        .join("; "),
                    reasons
                        .iter()
                        .map(|r| r.message_es())
                        .collect::<Vec<_>>()
                        .join("; "),
                );
                detail.details = serde_json::to_value(reasons).ok();
                (StatusCode::UNPROCESSABLE_ENTITY, detail)
            }
            AppError::Import(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "IMPORT_ERROR",
                    msg.clone(),
                    format!("Error al importar el archivo: {}", msg),
                ),
            ),
            AppError::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorDetail::new(
                    "PAYLOAD_TOO_LARGE",
                    format!("Uploaded file exceeds {} bytes", limit),
                    format!("El archivo supera el límite de {} bytes", limit),
                ),
            ),
            AppError::Template(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "TEMPLATE_ERROR",
                    "The document could not be rendered",
                    "No se pudo generar el documento",
                ),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "CONFIGURATION_ERROR",
                    format!("Configuration error: {}", msg),
                    format!("Error de configuración: {}", msg),
                ),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "DATABASE_ERROR",
                    "A database error occurred",
                    "Ocurrió un error en la base de datos",
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "Ocurrió un error interno del servidor",
                ),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred",
                    "Ocurrió un error interno del servidor",
                ),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

/// Map a shared-crate validation failure onto a field error
pub fn field_error(field: &str) -> impl Fn(&'static str) -> AppError + '_ {
    move |message| AppError::Validation {
        field: field.to_string(),
        message: message.to_string(),
        message_es: format!("Valor inválido para {}", field),
    }
}
