use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;

const STAFF_ROLES: [&str; 2] = ["admin", "hr"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

impl Claims {
    pub fn is_staff(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| STAFF_ROLES.iter().any(|s| s.eq_ignore_ascii_case(r)))
    }
}

fn reject(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

/// Decodes the bearer token, or the rejection to send back.
fn bearer_claims(headers: &HeaderMap, secret: &str) -> std::result::Result<Claims, Response> {
    let Some(auth_header) = headers.get(AUTHORIZATION) else {
        return Err(reject(StatusCode::UNAUTHORIZED, "missing_authorization"));
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err(reject(StatusCode::UNAUTHORIZED, "bad_authorization"));
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(reject(StatusCode::UNAUTHORIZED, "unsupported_scheme"));
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| reject(StatusCode::UNAUTHORIZED, "invalid_token"))
}

pub async fn require_hr_or_admin(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claims = match bearer_claims(req.headers(), &state.jwt_secret) {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if !claims.is_staff() {
        tracing::warn!(sub = %claims.sub, role = ?claims.role, "Admin route refused");
        return reject(StatusCode::FORBIDDEN, "forbidden");
    }
    req.extensions_mut().insert(claims);
    next.run(req).await
}
