use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::attempt_dto::{
        AttemptQuestionsResponse, AttemptSessionResponse, AttemptStatusResponse, EligibilityParams,
        PageLeaveRequest, QuestionView, ResumeAttemptRequest, SaveAnswerRequest, SaveAnswerResponse,
        StartAttemptRequest, SubmitAnswersRequest, SubmitResultResponse,
    },
    error::Result,
    models::test_result::AttemptMode,
    routes::identity::{resolve_candidate, verified_identity},
    services::{candidate_service::PageLeaveOutcome, eligibility::EligibilityDecision},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/tests/{id}/eligibility",
    params(
        ("id" = Uuid, Path, description = "Test ID"),
        EligibilityParams
    ),
    responses(
        (status = 200, description = "Eligibility decision", body = EligibilityDecision),
        (status = 404, description = "Candidate or test not found")
    )
)]
#[axum::debug_handler]
pub async fn check_eligibility(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    headers: HeaderMap,
    Query(params): Query<EligibilityParams>,
) -> Result<Json<EligibilityDecision>> {
    let candidate = resolve_candidate(&state, &headers, params.candidate_id, params.telegram_id).await?;
    let decision = state
        .attempt_service
        .check_eligibility(candidate.id, test_id, AttemptMode::from_trial_flag(params.trial))
        .await?;
    Ok(Json(decision))
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/start",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    request_body = StartAttemptRequest,
    responses(
        (status = 201, description = "New attempt started", body = AttemptSessionResponse),
        (status = 200, description = "Open attempt resumed", body = AttemptSessionResponse),
        (status = 403, description = "Candidate is not eligible"),
        (status = 404, description = "Candidate or test not found"),
        (status = 409, description = "An attempt in the other mode is open, or the test has no questions")
    )
)]
#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let candidate = resolve_candidate(&state, &headers, payload.candidate_id, payload.telegram_id).await?;
    let session = state
        .attempt_service
        .start_or_resume(candidate.id, test_id, AttemptMode::from_trial_flag(payload.trial))
        .await?;
    let status = if session.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(AttemptSessionResponse::from(session))))
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/resume",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    request_body = ResumeAttemptRequest,
    responses(
        (status = 200, description = "Open attempt", body = AttemptSessionResponse),
        (status = 409, description = "No open attempt")
    )
)]
#[axum::debug_handler]
pub async fn resume_attempt(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ResumeAttemptRequest>,
) -> Result<Json<AttemptSessionResponse>> {
    let candidate = resolve_candidate(&state, &headers, payload.candidate_id, payload.telegram_id).await?;
    let session = state.attempt_service.resume(candidate.id, test_id).await?;
    Ok(Json(AttemptSessionResponse::from(session)))
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/page-leave",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    request_body = PageLeaveRequest,
    responses(
        (status = 200, description = "Report recorded", body = PageLeaveOutcome)
    )
)]
#[axum::debug_handler]
pub async fn report_page_leave(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<PageLeaveRequest>,
) -> Result<Json<PageLeaveOutcome>> {
    payload.validate()?;
    let candidate = resolve_candidate(&state, &headers, payload.candidate_id, payload.telegram_id).await?;
    let outcome = state
        .candidate_service
        .report_page_leave(candidate.id, test_id, payload.leave_count)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/attempts/{id}",
    params(
        ("id" = Uuid, Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Attempt status", body = AttemptStatusResponse),
        (status = 404, description = "Attempt not found")
    )
)]
#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<AttemptStatusResponse>> {
    let status = state.attempt_service.attempt_status(attempt_id).await?;
    Ok(Json(AttemptStatusResponse::from(status)))
}

#[utoipa::path(
    get,
    path = "/api/attempts/{id}/questions",
    params(
        ("id" = Uuid, Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Frozen question pool", body = AttemptQuestionsResponse),
        (status = 404, description = "Attempt not found")
    )
)]
#[axum::debug_handler]
pub async fn get_questions(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<AttemptQuestionsResponse>> {
    let pool = state.attempt_service.question_pool(attempt_id).await?;
    let show_answers = pool.show_answers;
    Ok(Json(AttemptQuestionsResponse {
        attempt_id: pool.result.id,
        is_completed: pool.result.is_completed,
        show_answers,
        questions: pool
            .questions
            .into_iter()
            .map(|q| QuestionView::from_question(q, show_answers))
            .collect(),
    }))
}

#[utoipa::path(
    patch,
    path = "/api/attempts/{id}/answer",
    params(
        ("id" = Uuid, Path, description = "Attempt ID")
    ),
    request_body = SaveAnswerRequest,
    responses(
        (status = 200, description = "Answer processed", body = SaveAnswerResponse),
        (status = 409, description = "Attempt already completed or expired")
    )
)]
#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Json<SaveAnswerResponse>> {
    payload.validate()?;
    let saved = state.attempt_service.save_answer(attempt_id, (&payload).into()).await?;
    Ok(Json(SaveAnswerResponse::new(payload.question_id, saved)))
}

#[utoipa::path(
    post,
    path = "/api/attempts/{id}/submit",
    params(
        ("id" = Uuid, Path, description = "Attempt ID")
    ),
    request_body = SubmitAnswersRequest,
    responses(
        (status = 200, description = "Attempt scored", body = SubmitResultResponse),
        (status = 403, description = "Submitter does not own the attempt"),
        (status = 409, description = "Attempt already completed")
    )
)]
#[axum::debug_handler]
pub async fn submit_answers(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<Json<SubmitResultResponse>> {
    payload.validate()?;
    let submitter = match verified_identity(&state, &headers)? {
        Some(identity) => Some(identity.id),
        None => payload.telegram_id,
    };
    let outcome = state
        .attempt_service
        .submit(attempt_id, &payload.answers, payload.time_taken_seconds, submitter)
        .await?;
    let test = state.test_service.get_test(outcome.result.test_id).await?;
    Ok(Json(SubmitResultResponse::new(outcome, test.passing_score_percent)))
}
