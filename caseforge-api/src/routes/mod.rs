// caseforge-api/src/routes/mod.rs
// ============================================================================
// Module: Routes
// Description: Assembles the `/v1` router from each resource's handlers.
// Purpose: One function, router(), returning the fully wired axum Router.
// Dependencies: axum, tower-http
// ============================================================================

mod branches;
mod cases;
mod export;
mod feed;
mod jobs;
mod reasoning;
mod upload_intent;
mod witness_statements;

use axum::Router;
use axum::routing::get;
use axum::routing::post;
use tower_http::cors::AllowOrigin;
use tower_http::cors::CorsLayer;

use crate::state::SharedState;

/// Builds the `/v1` router, with CORS restricted to `allowed_origins`.
#[must_use]
pub fn router(state: SharedState, allowed_origins: &[String]) -> Router {
    let cors = build_cors_layer(allowed_origins);

    let v1 = Router::new()
        .route("/cases", post(cases::create_case).get(cases::list_cases))
        .route("/cases/{id}", get(cases::get_case))
        .route("/cases/{id}/snapshot", get(cases::get_snapshot))
        .route("/cases/{id}/timeline", get(cases::get_timeline))
        .route("/cases/{id}/upload-intent", post(upload_intent::create_upload_intent))
        .route("/cases/{id}/jobs", post(jobs::create_job))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/cases/{id}/witness-statements", post(witness_statements::create_witness_statement))
        .route("/cases/{id}/branches", post(branches::create_branch))
        .route("/cases/{id}/reasoning", post(reasoning::create_reasoning_job))
        .route("/cases/{id}/export", post(export::create_export_job))
        .route("/cases/{id}/feed", get(feed::stream_feed));

    Router::new().nest("/v1", v1).layer(cors).with_state(state)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new();
    }
    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
