//! Authentication middleware
//!
//! JWT authentication and role-based access control middleware

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::{permission_key, Action, Resource, UserRole};

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::services::auth::decode_access_token;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    pub role: UserRole,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = permission_key(resource, action);
        self.permissions.contains(&permission)
    }

    /// Permission guard for use in handlers
    pub fn require(&self, resource: Resource, action: Action) -> AppResult<()> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                permission = %permission_key(resource, action),
                "Permission denied"
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// Authentication middleware that validates JWT tokens from the
/// Authorization header against the configured secret
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    let claims = match decode_access_token(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => {
            return unauthorized_response(&msg);
        }
    };

    let user_id = match uuid::Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    let role = match UserRole::parse(&claims.role) {
        Ok(role) => role,
        Err(_) => return unauthorized_response("Invalid role in token"),
    };

    // Create AuthUser and insert into request extensions
    let auth_user = AuthUser {
        user_id,
        role,
        permissions: claims.permissions,
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message, "No autorizado"),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

impl CurrentUser {
    pub fn require(&self, resource: Resource, action: Action) -> AppResult<()> {
        self.0.require(resource, action)
    }

    pub fn id(&self) -> uuid::Uuid {
        self.0.user_id
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail::new(
                        "UNAUTHORIZED",
                        "Authentication required",
                        "Debe iniciar sesión",
                    ),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::permissions_for_role;

    fn user(role: UserRole) -> AuthUser {
        AuthUser {
            user_id: uuid::Uuid::new_v4(),
            role,
            permissions: permissions_for_role(role),
        }
    }

    #[test]
    fn test_require_allows_granted_permission() {
        let coordinator = user(UserRole::Coordinator);
        assert!(coordinator
            .require(Resource::Certificate, Action::Issue)
            .is_ok());
    }

    #[test]
    fn test_require_rejects_missing_permission() {
        let viewer = user(UserRole::Viewer);
        assert!(matches!(
            viewer.require(Resource::Training, Action::Create),
            Err(AppError::InsufficientPermissions)
        ));
    }
}
