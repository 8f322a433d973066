use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::candidate::NewPosition;
use crate::models::question::{NewAnswerOption, NewQuestion};
use crate::models::test_definition::{NewTestDefinition, TestMode, TestPatch};
use crate::services::notification_service::BroadcastKind;

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> i32 {
    3
}

fn default_max_trial_attempts() -> i32 {
    1
}

fn default_trial_question_count() -> i32 {
    10
}

fn default_test_mode() -> TestMode {
    TestMode::Both
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTestRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub time_limit_minutes: i32,
    #[validate(range(min = 0, max = 100))]
    pub passing_score_percent: i32,
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: i32,
    #[serde(default = "default_max_trial_attempts")]
    #[validate(range(min = 0))]
    pub max_trial_attempts: i32,
    #[serde(default = "default_trial_question_count")]
    pub trial_question_count: i32,
    /// 0 presents the whole pool.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub random_question_count: i32,
    #[serde(default)]
    pub show_answers_immediately: bool,
    #[serde(default = "default_true")]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
    #[serde(default = "default_test_mode")]
    pub test_mode: TestMode,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub position_ids: Vec<Uuid>,
}

impl From<CreateTestRequest> for NewTestDefinition {
    fn from(req: CreateTestRequest) -> Self {
        NewTestDefinition {
            title: req.title,
            description: req.description,
            time_limit_minutes: req.time_limit_minutes,
            passing_score_percent: req.passing_score_percent,
            max_attempts: req.max_attempts,
            max_trial_attempts: req.max_trial_attempts,
            trial_question_count: req.trial_question_count,
            random_question_count: req.random_question_count,
            show_answers_immediately: req.show_answers_immediately,
            shuffle_questions: req.shuffle_questions,
            shuffle_options: req.shuffle_options,
            test_mode: req.test_mode,
            is_active: req.is_active,
            position_ids: req.position_ids,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateTestRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score_percent: Option<i32>,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,
    #[validate(range(min = 0))]
    pub max_trial_attempts: Option<i32>,
    pub trial_question_count: Option<i32>,
    #[validate(range(min = 0))]
    pub random_question_count: Option<i32>,
    pub show_answers_immediately: Option<bool>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_options: Option<bool>,
    pub test_mode: Option<TestMode>,
    pub is_active: Option<bool>,
}

impl From<UpdateTestRequest> for TestPatch {
    fn from(req: UpdateTestRequest) -> Self {
        TestPatch {
            title: req.title,
            description: req.description,
            time_limit_minutes: req.time_limit_minutes,
            passing_score_percent: req.passing_score_percent,
            max_attempts: req.max_attempts,
            max_trial_attempts: req.max_trial_attempts,
            trial_question_count: req.trial_question_count,
            random_question_count: req.random_question_count,
            show_answers_immediately: req.show_answers_immediately,
            shuffle_questions: req.shuffle_questions,
            shuffle_options: req.shuffle_options,
            test_mode: req.test_mode,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOptionRequest {
    #[validate(length(min = 1))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1))]
    pub text: String,
    #[serde(default)]
    pub order: i32,
    #[validate(length(min = 2), nested)]
    pub options: Vec<CreateOptionRequest>,
}

impl From<CreateQuestionRequest> for NewQuestion {
    fn from(req: CreateQuestionRequest) -> Self {
        NewQuestion {
            text: req.text,
            order: req.order,
            options: req
                .options
                .into_iter()
                .map(|o| NewAnswerOption {
                    text: o.text,
                    is_correct: o.is_correct,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePositionRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_open: bool,
}

impl From<CreatePositionRequest> for NewPosition {
    fn from(req: CreatePositionRequest) -> Self {
        NewPosition {
            name: req.name,
            description: req.description,
            is_open: req.is_open,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct BlockCandidateRequest {
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct BroadcastRequest {
    pub kind: BroadcastKind,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 4096))]
    pub message: String,
    /// Omit to reach every notifiable candidate.
    pub candidate_ids: Option<Vec<Uuid>>,
}
