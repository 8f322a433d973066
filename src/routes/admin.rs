use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        admin_dto::{
            BlockCandidateRequest, BroadcastRequest, CreatePositionRequest, CreateQuestionRequest,
            CreateTestRequest, UpdateTestRequest,
        },
        candidate_dto::CandidateResponse,
    },
    error::Result,
    middleware::auth::Claims,
    services::{notification_service::BroadcastSummary, test_service::TestDetail},
    AppState,
};

#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let test = state.test_service.create_test(payload.into()).await?;
    tracing::info!(test_id = %test.id, by = %claims.sub, "Test created");
    Ok((StatusCode::CREATED, Json(test)))
}

#[axum::debug_handler]
pub async fn get_test(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<TestDetail>> {
    Ok(Json(state.test_service.test_detail(id).await?))
}

#[axum::debug_handler]
pub async fn update_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTestRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let test = state.test_service.update_test(id, payload.into()).await?;
    Ok(Json(test))
}

#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state.test_service.add_question(test_id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[axum::debug_handler]
pub async fn create_position(
    State(state): State<AppState>,
    Json(payload): Json<CreatePositionRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let position = state.test_service.create_position(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(position)))
}

#[axum::debug_handler]
pub async fn block_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<BlockCandidateRequest>,
) -> Result<Json<CandidateResponse>> {
    payload.validate()?;
    tracing::info!(candidate_id = %id, by = %claims.sub, "Blocking candidate");
    let candidate = state.candidate_service.block(id, payload.reason).await?;
    Ok(Json(CandidateResponse::from(candidate)))
}

#[axum::debug_handler]
pub async fn unblock_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CandidateResponse>> {
    let candidate = state.candidate_service.unblock(id).await?;
    Ok(Json(CandidateResponse::from(candidate)))
}

#[axum::debug_handler]
pub async fn broadcast(
    State(state): State<AppState>,
    Json(payload): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<BroadcastSummary>)> {
    payload.validate()?;
    let summary = state
        .notification_service
        .broadcast(payload.kind, &payload.title, &payload.message, payload.candidate_ids)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(summary)))
}
