//! Route definitions for the SST Training Management Platform

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Auth routes (login/refresh public, profile protected)
        .nest("/auth", auth_routes(state.clone()))
        // Public certificate verification (unauthenticated - for QR code scanning)
        .nest("/public", public_routes())
        .nest("/users", user_routes(state.clone()))
        .nest("/regionals", regional_routes(state.clone()))
        .nest("/cities", city_routes(state.clone()))
        .nest("/coaches", coach_routes(state.clone()))
        .nest("/courses", course_routes(state.clone()))
        .nest("/collaborators", collaborator_routes(state.clone()))
        .nest("/trainings", training_routes(state.clone()))
        .nest("/certificates", certificate_routes(state.clone()))
        .nest("/inspections", inspection_routes(state.clone()))
        .nest("/epp-inspections", epp_routes(state.clone()))
        .nest("/reports", report_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .merge(protected)
}

/// Public verification routes
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/certificates", get(handlers::search_public_certificates))
        .route("/certificates/:code", get(handlers::verify_certificate))
}

/// User administration routes (protected)
fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/:user_id", get(handlers::get_user).put(handlers::update_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Regional routes (protected)
fn regional_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_regionals).post(handlers::create_regional))
        .route(
            "/:regional_id",
            get(handlers::get_regional)
                .put(handlers::update_regional)
                .delete(handlers::delete_regional),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// City routes (protected)
fn city_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_cities).post(handlers::create_city))
        .route(
            "/:city_id",
            get(handlers::get_city)
                .put(handlers::update_city)
                .delete(handlers::delete_city),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Coach routes (protected)
fn coach_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_coaches).post(handlers::create_coach))
        .route(
            "/:coach_id",
            get(handlers::get_coach)
                .put(handlers::update_coach)
                .delete(handlers::delete_coach),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Course and level routes (protected)
fn course_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_courses).post(handlers::create_course))
        .route(
            "/:course_id",
            get(handlers::get_course)
                .put(handlers::update_course)
                .delete(handlers::delete_course),
        )
        .route(
            "/:course_id/levels",
            get(handlers::list_levels).post(handlers::create_level),
        )
        .route(
            "/:course_id/levels/:level_id",
            get(handlers::get_level)
                .put(handlers::update_level)
                .delete(handlers::delete_level),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Collaborator routes (protected)
fn collaborator_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_collaborators).post(handlers::create_collaborator),
        )
        .route(
            "/:collaborator_id",
            get(handlers::get_collaborator)
                .put(handlers::update_collaborator)
                .delete(handlers::delete_collaborator),
        )
        .route(
            "/:collaborator_id/documents",
            get(handlers::list_documents).post(handlers::add_document),
        )
        .route(
            "/:collaborator_id/documents/:document_id",
            delete(handlers::delete_document),
        )
        .route(
            "/:collaborator_id/certificates",
            get(handlers::list_collaborator_certificates),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Training routes (protected)
fn training_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_trainings).post(handlers::create_training))
        .route(
            "/:training_id",
            get(handlers::get_training)
                .put(handlers::update_training)
                .delete(handlers::delete_training),
        )
        .route("/:training_id/status", post(handlers::change_training_status))
        .route(
            "/:training_id/participants",
            get(handlers::list_participants).post(handlers::add_participants),
        )
        .route(
            "/:training_id/participants/:collaborator_id",
            delete(handlers::remove_participant),
        )
        .route("/:training_id/results", put(handlers::record_results))
        .route("/:training_id/certificates", post(handlers::issue_certificates))
        .route(
            "/:training_id/certificates/:collaborator_id",
            post(handlers::issue_certificate),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Certificate routes (protected)
fn certificate_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_certificates))
        .route("/expiring", get(handlers::list_expiring_certificates))
        .route("/:certificate_id", get(handlers::get_certificate))
        .route("/:certificate_id/document", get(handlers::get_certificate_document))
        .route("/:certificate_id/revoke", post(handlers::revoke_certificate))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Inspection routes (protected)
fn inspection_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_inspections).post(handlers::create_inspection),
        )
        .route(
            "/:inspection_id",
            get(handlers::get_inspection)
                .put(handlers::update_inspection)
                .delete(handlers::delete_inspection),
        )
        .route("/:inspection_id/close", post(handlers::close_inspection))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// EPP inspection routes (protected)
fn epp_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_epp_inspections))
        .route("/equipment", get(handlers::list_epp_equipment))
        .route("/batches", get(handlers::list_epp_batches))
        .route("/import", post(handlers::import_epp_sheet))
        .route(
            "/:inspection_id",
            get(handlers::get_epp_inspection).delete(handlers::delete_epp_inspection),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Report routes (protected)
fn report_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/monthly", get(handlers::list_monthly_reports))
        .route("/monthly/generate", post(handlers::generate_monthly_report))
        .route(
            "/monthly/:report_id",
            get(handlers::get_monthly_report)
                .put(handlers::update_monthly_report)
                .delete(handlers::delete_monthly_report),
        )
        .route("/monthly/:report_id/close", post(handlers::close_monthly_report))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
