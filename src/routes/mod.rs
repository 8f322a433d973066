pub mod admin;
pub mod attempts;
pub mod candidates;
pub mod catalog;
pub mod health;
pub mod identity;
pub mod openapi;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::middleware::{auth::require_hr_or_admin, rate_limit};
use crate::AppState;

/// Every API route with its rate limits and admin auth applied.
pub fn api_router(state: AppState, public_rps: u32, admin_rps: u32) -> Router {
    let public_api = Router::new()
        .route("/api/positions", get(catalog::list_positions))
        .route("/api/tests", get(catalog::list_tests))
        .route("/api/tests/:id/eligibility", get(attempts::check_eligibility))
        .route("/api/tests/:id/start", post(attempts::start_attempt))
        .route("/api/tests/:id/resume", post(attempts::resume_attempt))
        .route("/api/tests/:id/page-leave", post(attempts::report_page_leave))
        .route("/api/attempts/:id", get(attempts::get_attempt))
        .route("/api/attempts/:id/questions", get(attempts::get_questions))
        .route("/api/attempts/:id/answer", patch(attempts::save_answer))
        .route("/api/attempts/:id/submit", post(attempts::submit_answers))
        .route("/api/candidates/telegram-auth", post(candidates::telegram_auth))
        .route(
            "/api/candidates/:id",
            get(candidates::get_candidate).patch(candidates::update_candidate),
        )
        .route("/api/candidates/:id/cv", post(candidates::upload_cv))
        .route("/api/candidates/:id/results", get(candidates::list_results))
        .route("/api/openapi.json", get(openapi::openapi_json))
        .layer(from_fn_with_state(
            rate_limit::new_rps_state(public_rps),
            rate_limit::rps_middleware,
        ));

    let admin_api = Router::new()
        .route("/api/admin/tests", post(admin::create_test))
        .route(
            "/api/admin/tests/:id",
            get(admin::get_test).patch(admin::update_test),
        )
        .route("/api/admin/tests/:id/questions", post(admin::add_question))
        .route("/api/admin/positions", post(admin::create_position))
        .route("/api/admin/candidates/:id/block", post(admin::block_candidate))
        .route("/api/admin/candidates/:id/unblock", post(admin::unblock_candidate))
        .route("/api/admin/notifications", post(admin::broadcast))
        .layer(from_fn_with_state(state.clone(), require_hr_or_admin))
        .layer(from_fn_with_state(
            rate_limit::new_rps_state(admin_rps),
            rate_limit::rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(public_api)
        .merge(admin_api)
        .with_state(state)
}
