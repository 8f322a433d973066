use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::candidate_dto::{
        CandidateResponse, CvResponse, ResultHistoryItem, TelegramAuthRequest, TelegramAuthResponse,
        UpdateProfileRequest,
    },
    error::{Error, Result},
    routes::identity::verified_identity,
    services::candidate_service::{CandidateRef, CandidateResolver, TelegramProfile},
    AppState,
};

const CV_FIELDS: [&str; 2] = ["cv", "file"];

#[utoipa::path(
    post,
    path = "/api/candidates/telegram-auth",
    request_body = TelegramAuthRequest,
    responses(
        (status = 201, description = "Candidate created", body = TelegramAuthResponse),
        (status = 200, description = "Existing candidate", body = TelegramAuthResponse),
        (status = 401, description = "Init data signature is invalid")
    )
)]
#[axum::debug_handler]
pub async fn telegram_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TelegramAuthRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let profile = match verified_identity(&state, &headers)? {
        Some(identity) => TelegramProfile {
            telegram_id: identity.id,
            first_name: identity.first_name,
            last_name: identity.last_name,
        },
        None => TelegramProfile {
            telegram_id: payload
                .telegram_id
                .ok_or_else(|| Error::BadRequest("telegram_id is required".to_string()))?,
            first_name: payload.first_name,
            last_name: payload.last_name,
        },
    };

    let (candidate, created) = state.candidate_service.telegram_auth(profile).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(TelegramAuthResponse {
            candidate: CandidateResponse::from(candidate),
            created,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/candidates/{id}",
    params(
        ("id" = Uuid, Path, description = "Candidate ID")
    ),
    responses(
        (status = 200, description = "Candidate profile", body = CandidateResponse),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn get_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CandidateResponse>> {
    let candidate = state.candidate_service.resolve(CandidateRef::Id(id)).await?;
    Ok(Json(CandidateResponse::from(candidate)))
}

#[utoipa::path(
    patch,
    path = "/api/candidates/{id}",
    params(
        ("id" = Uuid, Path, description = "Candidate ID")
    ),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = CandidateResponse),
        (status = 400, description = "Invalid payload or closed position"),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn update_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<CandidateResponse>> {
    payload.validate()?;
    let candidate = state.candidate_service.update_profile(id, payload.into()).await?;
    Ok(Json(CandidateResponse::from(candidate)))
}

#[utoipa::path(
    post,
    path = "/api/candidates/{id}/cv",
    params(
        ("id" = Uuid, Path, description = "Candidate ID")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "CV file in the `cv` field"),
    responses(
        (status = 201, description = "CV stored", body = CvResponse),
        (status = 400, description = "Missing or disallowed file")
    )
)]
#[axum::debug_handler]
pub async fn upload_cv(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    while let Some(field) = multipart.next_field().await? {
        if !field.name().is_some_and(|n| CV_FIELDS.contains(&n)) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("cv.bin").to_string();
        let data = field.bytes().await?;
        let cv = state.candidate_service.upload_cv(id, &file_name, &data).await?;
        return Ok((StatusCode::CREATED, Json(CvResponse::from(cv))));
    }
    Err(Error::BadRequest("Multipart field 'cv' is required".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/candidates/{id}/results",
    params(
        ("id" = Uuid, Path, description = "Candidate ID")
    ),
    responses(
        (status = 200, description = "Completed attempts", body = [ResultHistoryItem]),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ResultHistoryItem>>> {
    let results = state.attempt_service.results_for_candidate(id).await?;
    Ok(Json(results.into_iter().map(ResultHistoryItem::from).collect()))
}
