use axum::response::Json;
use utoipa::OpenApi;

use crate::{dto, models, routes, services};

/// Public screening API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Screening Backend",
        description = "Candidate screening tests: catalog, attempts, scoring and CV intake"
    ),
    paths(
        routes::health::health,
        routes::catalog::list_positions,
        routes::catalog::list_tests,
        routes::attempts::check_eligibility,
        routes::attempts::start_attempt,
        routes::attempts::resume_attempt,
        routes::attempts::report_page_leave,
        routes::attempts::get_attempt,
        routes::attempts::get_questions,
        routes::attempts::save_answer,
        routes::attempts::submit_answers,
        routes::candidates::telegram_auth,
        routes::candidates::get_candidate,
        routes::candidates::update_candidate,
        routes::candidates::upload_cv,
        routes::candidates::list_results,
    ),
    components(
        schemas(
            models::test_definition::TestMode,
            models::test_result::AttemptState,
            services::eligibility::EligibilityDecision,
            services::eligibility::EligibilityReason,
            services::scoring::AnswerEntry,
            services::scoring::SkipReason,
            services::scoring::SkippedAnswer,
            services::candidate_service::PageLeaveOutcome,
            dto::attempt_dto::PositionResponse,
            dto::attempt_dto::CatalogTestResponse,
            dto::attempt_dto::StartAttemptRequest,
            dto::attempt_dto::ResumeAttemptRequest,
            dto::attempt_dto::PageLeaveRequest,
            dto::attempt_dto::AttemptSessionResponse,
            dto::attempt_dto::OptionView,
            dto::attempt_dto::QuestionView,
            dto::attempt_dto::AttemptQuestionsResponse,
            dto::attempt_dto::SaveAnswerRequest,
            dto::attempt_dto::SaveAnswerResponse,
            dto::attempt_dto::SubmitAnswersRequest,
            dto::attempt_dto::SubmitResultResponse,
            dto::attempt_dto::AttemptStatusResponse,
            dto::candidate_dto::TelegramAuthRequest,
            dto::candidate_dto::TelegramAuthResponse,
            dto::candidate_dto::CandidateResponse,
            dto::candidate_dto::UpdateProfileRequest,
            dto::candidate_dto::CvResponse,
            dto::candidate_dto::ResultHistoryItem,
        )
    ),
    tags(
        (name = "screening", description = "Candidate-facing endpoints")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
