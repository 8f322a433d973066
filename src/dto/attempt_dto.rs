use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::Question;
use crate::models::test_definition::TestMode;
use crate::models::test_result::AttemptState;
use crate::services::attempt_service::{AttemptSession, AttemptStatus, SavedAnswer, SubmissionOutcome};
use crate::services::scoring::{AnswerEntry, SkipReason, SkippedAnswer};
use crate::services::test_service::CatalogEntry;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PositionResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct CatalogParams {
    pub position_id: Option<Uuid>,
    /// Delivery channel asking for the list.
    pub mode: Option<TestMode>,
    pub candidate_id: Option<Uuid>,
    pub telegram_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogTestResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: i32,
    pub passing_score_percent: i32,
    pub max_attempts: i32,
    pub attempts_used: i64,
    pub question_count: usize,
    pub trial_available: bool,
    pub test_mode: String,
}

impl From<CatalogEntry> for CatalogTestResponse {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            id: entry.test.id,
            title: entry.test.title,
            description: entry.test.description,
            time_limit_minutes: entry.test.time_limit_minutes,
            passing_score_percent: entry.test.passing_score_percent,
            max_attempts: entry.test.max_attempts,
            attempts_used: entry.attempts_used,
            question_count: entry.question_count,
            trial_available: entry.trial_available,
            test_mode: entry.test.test_mode,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct EligibilityParams {
    pub candidate_id: Option<Uuid>,
    pub telegram_id: Option<i64>,
    pub trial: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct StartAttemptRequest {
    pub candidate_id: Option<Uuid>,
    pub telegram_id: Option<i64>,
    #[serde(default)]
    pub trial: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ResumeAttemptRequest {
    pub candidate_id: Option<Uuid>,
    pub telegram_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PageLeaveRequest {
    pub candidate_id: Option<Uuid>,
    pub telegram_id: Option<i64>,
    /// Cumulative count reported by the client.
    #[validate(range(min = 0))]
    pub leave_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptSessionResponse {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub candidate_id: Uuid,
    pub attempt_number: i32,
    pub is_trial: bool,
    pub resumed: bool,
    pub total_questions: i32,
    pub started_at: DateTime<Utc>,
    pub time_remaining_seconds: i64,
}

impl From<AttemptSession> for AttemptSessionResponse {
    fn from(session: AttemptSession) -> Self {
        Self {
            attempt_id: session.result.id,
            test_id: session.result.test_id,
            candidate_id: session.result.candidate_id,
            attempt_number: session.result.attempt_number,
            is_trial: session.result.is_trial,
            resumed: session.resumed,
            total_questions: session.result.total_questions,
            started_at: session.result.started_at,
            time_remaining_seconds: session.time_remaining_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OptionView {
    pub id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionView {
    pub id: i64,
    pub text: String,
    pub options: Vec<OptionView>,
}

impl QuestionView {
    pub fn from_question(question: Question, show_answers: bool) -> Self {
        Self {
            id: question.id,
            text: question.text,
            options: question
                .options
                .into_iter()
                .map(|o| OptionView {
                    id: o.id,
                    text: o.text,
                    is_correct: show_answers.then_some(o.is_correct),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptQuestionsResponse {
    pub attempt_id: Uuid,
    pub is_completed: bool,
    pub show_answers: bool,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SaveAnswerRequest {
    #[validate(range(min = 1))]
    pub question_id: i64,
    #[validate(range(min = 1))]
    pub option_id: i64,
}

impl From<&SaveAnswerRequest> for AnswerEntry {
    fn from(req: &SaveAnswerRequest) -> Self {
        AnswerEntry {
            question_id: req.question_id,
            option_id: req.option_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveAnswerResponse {
    pub saved: bool,
    pub question_id: i64,
    /// Present only for tests that reveal answers immediately.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<SkipReason>,
}

impl SaveAnswerResponse {
    pub fn new(question_id: i64, saved: SavedAnswer) -> Self {
        let applied = saved.answers.applied.first();
        Self {
            saved: applied.is_some(),
            question_id,
            is_correct: applied.filter(|_| saved.show_answers).map(|a| a.is_correct),
            skipped_reason: saved.answers.skipped.first().map(|s| s.reason),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitAnswersRequest {
    #[serde(default)]
    pub answers: Vec<AnswerEntry>,
    #[validate(range(min = 0))]
    pub time_taken_seconds: Option<i64>,
    /// Telegram account submitting, when the bot relays the submission.
    pub telegram_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResultResponse {
    pub attempt_id: Uuid,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub score_percent: i32,
    pub passing_score_percent: i32,
    pub is_passed: bool,
    /// Prompts the client to ask for a CV.
    pub requires_cv: bool,
    pub time_taken_seconds: i32,
    pub completion_reason: Option<String>,
    pub skipped: Vec<SkippedAnswer>,
}

impl SubmitResultResponse {
    pub fn new(outcome: SubmissionOutcome, passing_score_percent: i32) -> Self {
        Self {
            attempt_id: outcome.result.id,
            correct_answers: outcome.result.correct_answers,
            total_questions: outcome.result.total_questions,
            score_percent: outcome.result.score_percent,
            passing_score_percent,
            is_passed: outcome.is_passed,
            requires_cv: outcome.is_passed,
            time_taken_seconds: outcome.result.time_taken_seconds,
            completion_reason: outcome.result.completion_reason,
            skipped: outcome.answers.skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptStatusResponse {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub test_title: String,
    pub attempt_number: i32,
    pub is_trial: bool,
    pub state: AttemptState,
    pub is_completed: bool,
    pub answered: usize,
    pub total_questions: i32,
    pub correct_answers: Option<i32>,
    pub score_percent: Option<i32>,
    pub is_passed: Option<bool>,
    pub completion_reason: Option<String>,
    pub time_remaining_seconds: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<AttemptStatus> for AttemptStatusResponse {
    fn from(status: AttemptStatus) -> Self {
        let is_passed = status.is_passed();
        let done = status.result.is_completed;
        Self {
            attempt_id: status.result.id,
            test_id: status.result.test_id,
            test_title: status.test_title,
            attempt_number: status.result.attempt_number,
            is_trial: status.result.is_trial,
            state: status.result.state(),
            is_completed: done,
            answered: status.answered,
            total_questions: status.result.total_questions,
            correct_answers: done.then_some(status.result.correct_answers),
            score_percent: done.then_some(status.result.score_percent),
            is_passed,
            completion_reason: status.result.completion_reason,
            time_remaining_seconds: status.time_remaining_seconds,
            started_at: status.result.started_at,
            completed_at: status.result.completed_at,
        }
    }
}
