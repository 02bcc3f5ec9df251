//! API routes

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{auth_middleware, AppState};
use crate::handlers::{health, invitations, reports};
use crate::openapi::create_openapi_routes;

/// CORS layer; an empty origin list allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// Create the API router
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let state = Arc::new(state);

    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/detailed", get(health::health_detailed))
        .with_state(state.clone());

    // Invitation routes
    let invitation_routes = Router::new()
        .route(
            "/",
            get(invitations::list_invitations).post(invitations::send_invitation),
        )
        .route("/stats", get(invitations::get_stats))
        .route(
            "/activities",
            get(invitations::list_activities).delete(invitations::clear_activities),
        )
        .route("/target/:kind/:id", get(invitations::list_for_target))
        .route("/token/:token", get(invitations::get_by_token))
        .route("/token/:token/accept", post(invitations::accept_by_token))
        .route("/:id", get(invitations::get_invitation))
        .route("/:id/activities", get(invitations::get_invitation_activities))
        .route("/:id/accept", post(invitations::accept_invitation))
        .route("/:id/reject", post(invitations::reject_invitation))
        .route("/:id/cancel", post(invitations::cancel_invitation))
        .route("/:id/resend", post(invitations::resend_invitation));

    // Report routes
    let report_routes = Router::new()
        .route("/", post(reports::compute_report))
        .route("/drilldown", post(reports::drill_down))
        .route("/export/tasks", post(reports::export_tasks))
        .route("/export/teams", post(reports::export_teams));

    // API v1 routes with authentication
    let api_v1 = Router::new()
        .nest("/invitations", invitation_routes)
        .nest("/reports", report_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    // OpenAPI documentation routes
    let openapi_routes = create_openapi_routes();

    // Combine all routes
    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .merge(openapi_routes)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}
