use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestDefinition {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: i32,
    pub passing_score_percent: i32,
    pub max_attempts: i32,
    pub max_trial_attempts: i32,
    pub trial_question_count: i32,
    /// 0 = present the whole pool.
    pub random_question_count: i32,
    pub show_answers_immediately: bool,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub test_mode: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestDefinition {
    pub fn time_limit_seconds(&self) -> i64 {
        i64::from(self.time_limit_minutes.max(0)) * 60
    }

    pub fn is_passing(&self, score_percent: i32) -> bool {
        score_percent >= self.passing_score_percent
    }

    pub fn mode(&self) -> TestMode {
        TestMode::parse(&self.test_mode).unwrap_or(TestMode::Both)
    }
}

/// Where a test may be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    Webapp,
    Telegram,
    Both,
}

impl TestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::Webapp => "webapp",
            TestMode::Telegram => "telegram",
            TestMode::Both => "both",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "webapp" => Some(TestMode::Webapp),
            "telegram" => Some(TestMode::Telegram),
            "both" => Some(TestMode::Both),
            _ => None,
        }
    }

    /// A `both` test is offered on every channel.
    pub fn offered_on(&self, channel: TestMode) -> bool {
        *self == TestMode::Both || channel == TestMode::Both || *self == channel
    }
}

#[derive(Debug, Clone)]
pub struct NewTestDefinition {
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: i32,
    pub passing_score_percent: i32,
    pub max_attempts: i32,
    pub max_trial_attempts: i32,
    pub trial_question_count: i32,
    pub random_question_count: i32,
    pub show_answers_immediately: bool,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub test_mode: TestMode,
    pub is_active: bool,
    pub position_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TestPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_limit_minutes: Option<i32>,
    pub passing_score_percent: Option<i32>,
    pub max_attempts: Option<i32>,
    pub max_trial_attempts: Option<i32>,
    pub trial_question_count: Option<i32>,
    pub random_question_count: Option<i32>,
    pub show_answers_immediately: Option<bool>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_options: Option<bool>,
    pub test_mode: Option<TestMode>,
    pub is_active: Option<bool>,
}

impl TestPatch {
    pub fn apply(&self, test: &mut TestDefinition) {
        if let Some(v) = &self.title {
            test.title = v.clone();
        }
        if let Some(v) = &self.description {
            test.description = Some(v.clone());
        }
        if let Some(v) = self.time_limit_minutes {
            test.time_limit_minutes = v;
        }
        if let Some(v) = self.passing_score_percent {
            test.passing_score_percent = v;
        }
        if let Some(v) = self.max_attempts {
            test.max_attempts = v;
        }
        if let Some(v) = self.max_trial_attempts {
            test.max_trial_attempts = v;
        }
        if let Some(v) = self.trial_question_count {
            test.trial_question_count = v;
        }
        if let Some(v) = self.random_question_count {
            test.random_question_count = v;
        }
        if let Some(v) = self.show_answers_immediately {
            test.show_answers_immediately = v;
        }
        if let Some(v) = self.shuffle_questions {
            test.shuffle_questions = v;
        }
        if let Some(v) = self.shuffle_options {
            test.shuffle_options = v;
        }
        if let Some(v) = self.test_mode {
            test.test_mode = v.as_str().to_string();
        }
        if let Some(v) = self.is_active {
            test.is_active = v;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    pub active_only: bool,
    pub position_id: Option<Uuid>,
}
