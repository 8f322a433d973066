use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::candidate::Candidate;
use crate::services::candidate_service::{CandidateRef, CandidateResolver};
use crate::utils::telegram_auth::{verify_init_data, TelegramIdentity};
use crate::AppState;

pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// The Telegram user vouched for by signed WebApp init data.
///
/// The header is ignored when no bot token is configured. A header that
/// fails verification is rejected rather than ignored.
pub fn verified_identity(state: &AppState, headers: &HeaderMap) -> Result<Option<TelegramIdentity>> {
    let (Some(raw), Some(token)) = (headers.get(INIT_DATA_HEADER), state.bot_token.as_deref()) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .map_err(|_| Error::Unauthorized("invalid_init_data".to_string()))?;
    match verify_init_data(raw, token) {
        Some(identity) => Ok(Some(identity)),
        None => {
            tracing::warn!("Rejected Telegram init data with a bad signature");
            Err(Error::Unauthorized("invalid_init_data".to_string()))
        }
    }
}

/// Verified init data wins over the Telegram id in the body, which wins
/// over the candidate id.
pub fn candidate_ref(
    identity: Option<&TelegramIdentity>,
    candidate_id: Option<Uuid>,
    telegram_id: Option<i64>,
) -> Result<CandidateRef> {
    if let Some(identity) = identity {
        return Ok(CandidateRef::Telegram(identity.id));
    }
    match (telegram_id, candidate_id) {
        (Some(tg), _) => Ok(CandidateRef::Telegram(tg)),
        (None, Some(id)) => Ok(CandidateRef::Id(id)),
        (None, None) => Err(Error::BadRequest("candidate_id or telegram_id is required".to_string())),
    }
}

pub async fn resolve_candidate(
    state: &AppState,
    headers: &HeaderMap,
    candidate_id: Option<Uuid>,
    telegram_id: Option<i64>,
) -> Result<Candidate> {
    let identity = verified_identity(state, headers)?;
    let reference = candidate_ref(identity.as_ref(), candidate_id, telegram_id)?;
    state.candidate_service.resolve(reference).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_data_takes_precedence() {
        let identity = TelegramIdentity {
            id: 77,
            first_name: String::new(),
            last_name: String::new(),
            username: None,
        };
        let id = Uuid::new_v4();
        assert_eq!(candidate_ref(Some(&identity), Some(id), Some(5)).unwrap(), CandidateRef::Telegram(77));
        assert_eq!(candidate_ref(None, Some(id), Some(5)).unwrap(), CandidateRef::Telegram(5));
        assert_eq!(candidate_ref(None, Some(id), None).unwrap(), CandidateRef::Id(id));
        assert!(matches!(candidate_ref(None, None, None), Err(Error::BadRequest(_))));
    }
}
