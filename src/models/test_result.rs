use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// One attempt of a candidate at a test.
///
/// Created open (`is_completed = false`) and closed exactly once, either
/// on submission or when its time limit is found to have elapsed. The
/// question set is frozen in `question_ids` at creation and
/// `total_questions` is its length.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestResult {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub test_id: Uuid,
    pub attempt_number: i32,
    pub is_trial: bool,
    pub question_ids: Vec<i64>,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub score_percent: i32,
    pub time_taken_seconds: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub completion_reason: Option<String>,
}

impl TestResult {
    pub fn state(&self) -> AttemptState {
        if self.is_completed {
            AttemptState::Completed
        } else {
            AttemptState::InProgress
        }
    }

    pub fn mode(&self) -> AttemptMode {
        if self.is_trial {
            AttemptMode::Trial
        } else {
            AttemptMode::Regular
        }
    }

    /// Derived from the stored score and the test's current threshold.
    pub fn is_passed(&self, passing_score_percent: i32) -> bool {
        self.is_completed && self.score_percent >= passing_score_percent
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptMode {
    Regular,
    Trial,
}

impl AttemptMode {
    pub fn from_trial_flag(trial: bool) -> Self {
        if trial {
            AttemptMode::Trial
        } else {
            AttemptMode::Regular
        }
    }

    pub fn is_trial(&self) -> bool {
        matches!(self, AttemptMode::Trial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Submitted,
    Expired,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::Submitted => "submitted",
            CompletionReason::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTestResult {
    pub candidate_id: Uuid,
    pub test_id: Uuid,
    pub attempt_number: i32,
    pub is_trial: bool,
    pub question_ids: Vec<i64>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub completed_at: DateTime<Utc>,
    pub correct_answers: i32,
    pub score_percent: i32,
    pub time_taken_seconds: i32,
    pub reason: CompletionReason,
}

/// Counts the eligibility gate needs for one (candidate, test) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounts {
    pub total: i64,
    pub completed_regular: i64,
    pub completed_trial: i64,
    pub best_completed_score: Option<i32>,
}

impl ResultCounts {
    pub fn completed_in(&self, mode: AttemptMode) -> i64 {
        match mode {
            AttemptMode::Regular => self.completed_regular,
            AttemptMode::Trial => self.completed_trial,
        }
    }
}
