use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};

use crate::{
    dto::attempt_dto::{CatalogParams, CatalogTestResponse, PositionResponse},
    error::{Error, Result},
    routes::identity::{resolve_candidate, INIT_DATA_HEADER},
    services::test_service::CatalogQuery,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/positions",
    responses(
        (status = 200, description = "Open positions", body = [PositionResponse])
    )
)]
#[axum::debug_handler]
pub async fn list_positions(State(state): State<AppState>) -> Result<Json<Vec<PositionResponse>>> {
    let positions = state.test_service.open_positions().await?;
    Ok(Json(
        positions
            .into_iter()
            .map(|p| PositionResponse {
                id: p.id,
                name: p.name,
                description: p.description,
            })
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/tests",
    params(CatalogParams),
    responses(
        (status = 200, description = "Tests the candidate can take", body = [CatalogTestResponse])
    )
)]
#[axum::debug_handler]
pub async fn list_tests(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CatalogParams>,
) -> Result<Json<Vec<CatalogTestResponse>>> {
    let wants_candidate = params.candidate_id.is_some()
        || params.telegram_id.is_some()
        || headers.contains_key(INIT_DATA_HEADER);
    let candidate = if wants_candidate {
        // an unregistered visitor still sees the catalog
        match resolve_candidate(&state, &headers, params.candidate_id, params.telegram_id).await {
            Ok(candidate) => Some(candidate),
            Err(Error::NotFound(_) | Error::BadRequest(_)) => None,
            Err(e) => return Err(e),
        }
    } else {
        None
    };

    let entries = state
        .test_service
        .catalog(CatalogQuery {
            position_id: params.position_id,
            channel: params.mode,
            candidate,
        })
        .await?;
    Ok(Json(entries.into_iter().map(CatalogTestResponse::from).collect()))
}
