use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::candidate::{Candidate, ProfilePatch};
use crate::models::cv::Cv;
use crate::services::attempt_service::ResultSummary;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct TelegramAuthRequest {
    /// Ignored when verified WebApp init data is present.
    pub telegram_id: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CandidateResponse {
    pub id: Uuid,
    pub telegram_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub position_id: Option<Uuid>,
    pub is_blocked: bool,
    pub blocked_reason: Option<String>,
    pub notification_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Candidate> for CandidateResponse {
    fn from(c: Candidate) -> Self {
        Self {
            id: c.id,
            telegram_id: c.telegram_id,
            first_name: c.first_name,
            last_name: c.last_name,
            phone: c.phone,
            email: c.email,
            position_id: c.position_id,
            is_blocked: c.is_blocked,
            blocked_reason: c.blocked_reason,
            notification_enabled: c.notification_enabled,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TelegramAuthResponse {
    pub candidate: CandidateResponse,
    pub created: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 255))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub last_name: Option<String>,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub position_id: Option<Uuid>,
    pub notification_enabled: Option<bool>,
}

impl From<UpdateProfileRequest> for ProfilePatch {
    fn from(req: UpdateProfileRequest) -> Self {
        ProfilePatch {
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            email: req.email,
            position_id: req.position_id,
            notification_enabled: req.notification_enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CvResponse {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Cv> for CvResponse {
    fn from(cv: Cv) -> Self {
        Self {
            id: cv.id,
            candidate_id: cv.candidate_id,
            file_name: cv.file_name,
            file_size: cv.file_size,
            uploaded_at: cv.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResultHistoryItem {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub test_title: String,
    pub attempt_number: i32,
    pub is_trial: bool,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub score_percent: i32,
    pub is_passed: bool,
    pub completion_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<ResultSummary> for ResultHistoryItem {
    fn from(s: ResultSummary) -> Self {
        Self {
            attempt_id: s.result.id,
            test_id: s.result.test_id,
            test_title: s.test_title,
            attempt_number: s.result.attempt_number,
            is_trial: s.result.is_trial,
            correct_answers: s.result.correct_answers,
            total_questions: s.result.total_questions,
            score_percent: s.result.score_percent,
            is_passed: s.is_passed,
            completion_reason: s.result.completion_reason,
            completed_at: s.result.completed_at,
        }
    }
}
