use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cv {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub file_path: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCv {
    pub candidate_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub file_path: String,
}
