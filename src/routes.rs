// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::RateLimit,
    handlers::{admin, assessments, drafts, questions},
    state::AppState,
    utils::jwt::admin_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (catalog, drafts, assessments, admin).
/// * Rate limits the resume lookup per client IP when configured.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origin = HeaderValue::from_str(&state.config.client_origin()).ok();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origin))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let catalog_routes = Router::new()
        .route("/questions", get(questions::get_questions))
        .route("/languages", get(questions::list_languages));

    let resume_routes = Router::new().route("/resume/{token}", get(drafts::resume_draft));
    let resume_routes = match state.config.resume_rate_limit {
        Some(limit) => with_rate_limit(resume_routes, limit),
        None => resume_routes,
    };

    let draft_routes = Router::new()
        .route("/", post(drafts::create_draft))
        .route("/{id}/progress", put(drafts::save_progress))
        .merge(resume_routes);

    let assessment_routes = Router::new()
        .route("/", post(assessments::submit_assessment))
        .route("/{id}", get(assessments::get_assessment));

    let user_routes =
        Router::new().route("/{user_id}/assessments", get(assessments::list_user_assessments));

    let admin_routes = Router::new()
        .route("/drafts", get(admin::list_drafts))
        .route("/drafts/cleanup", post(admin::cleanup_drafts))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            admin_middleware,
        ));

    Router::new()
        .nest("/api", catalog_routes)
        .nest("/api/drafts", draft_routes)
        .nest("/api/assessments", assessment_routes)
        .nest("/api/users", user_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn with_rate_limit(router: Router<AppState>, limit: RateLimit) -> Router<AppState> {
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(limit.per_second)
        .burst_size(limit.burst_size)
        .finish();

    match governor_conf {
        Some(conf) => router.layer(GovernorLayer::new(Arc::new(conf))),
        None => {
            tracing::warn!(?limit, "Ignoring invalid resume rate limit");
            router
        }
    }
}
