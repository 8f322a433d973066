use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per (result, question). `is_correct` is captured when the
/// answer is written and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserAnswer {
    pub result_id: Uuid,
    pub question_id: i64,
    pub selected_option_id: i64,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}
