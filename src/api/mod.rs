pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::{
        BranchService, ClusterService, CrudService, FamilyService, PersonService, ReportService,
        ServiceContext,
    },
};
use handlers::resources;
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .route("/setup", get(handlers::root::setup_status).post(handlers::root::setup))

        // Auth routes
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/password-reset", post(handlers::auth::request_password_reset))
        .route(
            "/auth/me",
            get(handlers::auth::me).route_layer(axum::middleware::from_fn_with_state(
                app_state.clone(),
                middleware::auth::require_auth,
            )),
        )

        // API routes
        .nest("/api", api_routes(app_state.clone()))

        // Add state to the router
        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    let staff = Router::new()
        .nest("/people", person_routes())
        .nest("/families", resource_routes::<FamilyService>())
        .nest("/clusters", cluster_routes())
        .nest("/reports", resource_routes::<ReportService>())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_staff,
        ));

    let admin = Router::new()
        .nest("/branches", resource_routes::<BranchService>())
        .nest("/admin", admin_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ));

    staff.merge(admin)
}

/// The list/get/create/update/delete/bulk/export surface of one collection.
fn resource_routes<S: CrudService>() -> Router<AppState> {
    Router::new()
        .route("/", get(resources::list::<S>).post(resources::create::<S>))
        .route("/bulk-delete", post(resources::bulk_delete::<S>))
        .route("/export", post(resources::export::<S>))
        .route(
            "/:id",
            get(resources::get::<S>)
                .put(resources::update::<S>)
                .delete(resources::delete::<S>),
        )
}

fn person_routes() -> Router<AppState> {
    resource_routes::<PersonService>()
        .route("/import/preview", post(handlers::people::import_preview))
        .route("/import", post(handlers::people::import))
}

fn cluster_routes() -> Router<AppState> {
    resource_routes::<ClusterService>()
        .route("/:id/attendance", get(handlers::clusters::attendance))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/password-resets", get(handlers::admin::list_password_resets))
        .route("/password-resets/:id/approve", post(handlers::admin::approve_password_reset))
        .route("/password-resets/:id/reject", post(handlers::admin::reject_password_reset))
        .route("/locked-accounts", get(handlers::admin::list_locked_accounts))
        .route("/locked-accounts/:id/unlock", post(handlers::admin::unlock_account))
        .route("/audit-logs", get(handlers::admin::list_audit_logs))
        .route("/audit-logs/export", post(handlers::admin::export_audit_logs))
}
