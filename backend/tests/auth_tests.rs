//! Authentication and authorization tests
//!
//! Property-based and unit tests for:
//! - Role permission enforcement
//! - Access token decoding
//! - Password and refresh token hashing
//! - Peruvian contact validations

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use proptest::prelude::*;
use shared::{
    permission_key, permissions_for_role, validate_email, validate_password, validate_phone, Action,
    Resource, UserRole,
};
use sst_training_backend::error::AppError;
use sst_training_backend::middleware::AuthUser;
use sst_training_backend::services::auth::{decode_access_token, hash_password, hash_token, Claims};
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

fn role_strategy() -> impl Strategy<Value = UserRole> {
    prop_oneof![
        Just(UserRole::Admin),
        Just(UserRole::Coordinator),
        Just(UserRole::Inspector),
        Just(UserRole::Viewer),
    ]
}

fn resource_strategy() -> impl Strategy<Value = Resource> {
    prop::sample::select(Resource::ALL.to_vec())
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop::sample::select(Action::ALL.to_vec())
}

/// Peruvian mobile numbers: 9 digits starting with 9, optionally +51
fn peru_mobile_strategy() -> impl Strategy<Value = String> {
    prop_oneof!["9[0-9]{8}", "\\+51 9[0-9]{8}", "9[0-9]{2} [0-9]{3} [0-9]{3}",]
}

fn auth_user(role: UserRole) -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role,
        permissions: permissions_for_role(role),
    }
}

// ============================================================================
// Role permissions
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Access decisions match the permissions assigned to the user's role
    #[test]
    fn prop_access_matches_role_permissions(
        role in role_strategy(),
        resource in resource_strategy(),
        action in action_strategy(),
    ) {
        let user = auth_user(role);
        let granted = permissions_for_role(role).contains(&permission_key(resource, action));

        prop_assert_eq!(user.has_permission(resource, action), granted);
        match user.require(resource, action) {
            Ok(()) => prop_assert!(granted),
            Err(AppError::InsufficientPermissions) => prop_assert!(!granted),
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Admins can do everything
    #[test]
    fn prop_admin_has_everything(resource in resource_strategy(), action in action_strategy()) {
        prop_assert!(auth_user(UserRole::Admin).has_permission(resource, action));
    }

    /// Viewers can only view, and never user accounts
    #[test]
    fn prop_viewer_is_read_only(resource in resource_strategy(), action in action_strategy()) {
        let allowed = auth_user(UserRole::Viewer).has_permission(resource, action);
        prop_assert_eq!(allowed, action == Action::View && resource != Resource::User);
    }
}

#[test]
fn test_role_specific_grants() {
    let coordinator = auth_user(UserRole::Coordinator);
    assert!(coordinator.has_permission(Resource::Certificate, Action::Issue));
    assert!(!coordinator.has_permission(Resource::EppInspection, Action::Import));
    assert!(!coordinator.has_permission(Resource::User, Action::View));

    let inspector = auth_user(UserRole::Inspector);
    assert!(inspector.has_permission(Resource::EppInspection, Action::Import));
    assert!(inspector.has_permission(Resource::Inspection, Action::Create));
    assert!(!inspector.has_permission(Resource::Certificate, Action::Issue));
}

// ============================================================================
// Tokens & passwords
// ============================================================================

fn sign(claims: &Claims, secret: &str) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

fn claims(exp_offset_secs: i64) -> Claims {
    let now = Utc::now().timestamp();
    Claims {
        sub: Uuid::new_v4().to_string(),
        role: "coordinator".to_string(),
        permissions: permissions_for_role(UserRole::Coordinator),
        exp: now + exp_offset_secs,
        iat: now,
    }
}

#[test]
fn test_access_token_round_trip() {
    let original = claims(3600);
    let token = sign(&original, "jwt-secret");
    let decoded = decode_access_token(&token, "jwt-secret").unwrap();
    assert_eq!(decoded.sub, original.sub);
    assert_eq!(decoded.permissions, original.permissions);
}

#[test]
fn test_access_token_rejects_wrong_secret_and_expiry() {
    let token = sign(&claims(3600), "jwt-secret");
    assert!(decode_access_token(&token, "other-secret").is_err());

    let expired = sign(&claims(-3600), "jwt-secret");
    assert!(decode_access_token(&expired, "jwt-secret").is_err());
}

#[test]
fn test_password_hash_verifies() {
    let hashed = hash_password("capacitacion-2024").unwrap();
    assert!(bcrypt::verify("capacitacion-2024", &hashed).unwrap());
    assert!(!bcrypt::verify("otra-clave", &hashed).unwrap());
}

#[test]
fn test_refresh_token_hash_is_stable() {
    assert_eq!(hash_token("abc"), hash_token("abc"));
    assert_ne!(hash_token("abc"), hash_token("abd"));
    assert!(!hash_token("abc").contains('='));
}

// ============================================================================
// Contact validation
// ============================================================================

proptest! {
    #[test]
    fn prop_valid_peru_mobiles(phone in peru_mobile_strategy()) {
        prop_assert!(validate_phone(&phone).is_ok(), "{} should be valid", phone);
    }

    #[test]
    fn prop_short_passwords_rejected(password in "[a-zA-Z0-9]{0,7}") {
        prop_assert!(validate_password(&password).is_err());
    }
}

#[test]
fn test_email_validation() {
    assert!(validate_email("rosa.quispe@empresa.com.pe").is_ok());
    assert!(validate_email("rosa@empresa").is_err());
    assert!(validate_email("@empresa.com").is_err());
}

#[tokio::test]
#[ignore] // Requires database connection and SST_ configuration
async fn test_bootstrap_admin_only_on_empty_database() {
    let config = sst_training_backend::Config::load().expect("configuration must load");
    let pool = sqlx::PgPool::connect(&config.database.url).await.unwrap();
    let admin = sst_training_backend::config::BootstrapAdminConfig {
        email: "admin@example.com".to_string(),
        password: "change-me-now".to_string(),
        full_name: "Administrador".to_string(),
    };

    let service = sst_training_backend::services::AuthService::new(pool, &config);
    service.bootstrap_admin(&admin).await.unwrap();
    let created_again = service.bootstrap_admin(&admin).await.unwrap();
    assert!(!created_again, "a second bootstrap must never create another admin");
}
