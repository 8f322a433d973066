use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::candidate::{BlockInfo, Candidate, NewCandidate, NewPosition, Position, ProfilePatch};
use crate::models::cv::{Cv, NewCv};
use crate::models::question::{NewQuestion, Question};
use crate::models::test_definition::{NewTestDefinition, TestDefinition, TestFilter, TestPatch};
use crate::models::test_result::{Completion, NewTestResult, ResultCounts, TestResult};
use crate::models::user_answer::UserAnswer;
use crate::models::webhook_log::{DeliveryOutcome, WebhookLog};

/// Persistence seam for the screening core.
///
/// Implementations must make `upsert_answer` a no-op returning `false`
/// when the parent result is already completed, and `complete_result`
/// must only close a result that is still open.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScreeningStore: Send + Sync {
    async fn insert_test(&self, new: NewTestDefinition) -> Result<TestDefinition>;
    async fn update_test(&self, id: Uuid, patch: TestPatch) -> Result<TestDefinition>;
    async fn find_test(&self, id: Uuid) -> Result<Option<TestDefinition>>;
    async fn list_tests(&self, filter: TestFilter) -> Result<Vec<TestDefinition>>;
    async fn insert_question(&self, test_id: Uuid, new: NewQuestion) -> Result<Question>;
    /// All questions of a test in canonical `(order, id)` order.
    async fn questions_for_test(&self, test_id: Uuid) -> Result<Vec<Question>>;

    async fn insert_position(&self, new: NewPosition) -> Result<Position>;
    async fn find_position(&self, id: Uuid) -> Result<Option<Position>>;
    async fn list_open_positions(&self) -> Result<Vec<Position>>;

    async fn insert_candidate(&self, new: NewCandidate) -> Result<Candidate>;
    async fn find_candidate(&self, id: Uuid) -> Result<Option<Candidate>>;
    async fn find_candidate_by_telegram(&self, telegram_id: i64) -> Result<Option<Candidate>>;
    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<Candidate>;
    /// `None` clears the block.
    async fn set_block(&self, id: Uuid, block: Option<BlockInfo>) -> Result<Candidate>;
    async fn record_trial_taken(&self, candidate_id: Uuid, test_id: Uuid) -> Result<()>;
    /// Candidates with a Telegram id and notifications enabled; all of them when `ids` is `None`.
    async fn notifiable_candidates(&self, ids: Option<Vec<Uuid>>) -> Result<Vec<Candidate>>;

    async fn insert_cv(&self, new: NewCv) -> Result<Cv>;
    async fn has_cv(&self, candidate_id: Uuid) -> Result<bool>;

    async fn result_counts(&self, candidate_id: Uuid, test_id: Uuid) -> Result<ResultCounts>;
    async fn latest_open_result(&self, candidate_id: Uuid, test_id: Uuid) -> Result<Option<TestResult>>;
    async fn insert_result(&self, new: NewTestResult) -> Result<TestResult>;
    async fn find_result(&self, id: Uuid) -> Result<Option<TestResult>>;
    async fn completed_results_for_candidate(&self, candidate_id: Uuid) -> Result<Vec<TestResult>>;
    /// Open results whose test time limit has elapsed at `cutoff`.
    async fn stale_open_results(&self, cutoff: DateTime<Utc>) -> Result<Vec<TestResult>>;
    async fn complete_result(&self, id: Uuid, completion: Completion) -> Result<TestResult>;

    /// Returns `false` when nothing was written because the result is closed.
    async fn upsert_answer(&self, answer: UserAnswer) -> Result<bool>;
    async fn answers_for_result(&self, result_id: Uuid) -> Result<Vec<UserAnswer>>;

    async fn enqueue_event(&self, event_type: &str, payload: JsonValue, target_url: &str) -> Result<WebhookLog>;
    /// Claims the oldest due event, marking it as being delivered. Events
    /// left in delivery since before `lease_expired_before` are claimable
    /// again.
    async fn claim_pending_event(
        &self,
        now: DateTime<Utc>,
        lease_expired_before: DateTime<Utc>,
    ) -> Result<Option<WebhookLog>>;
    async fn record_delivery(&self, id: Uuid, outcome: DeliveryOutcome) -> Result<WebhookLog>;
}
