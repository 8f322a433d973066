use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::ScreeningStore;
use crate::error::{Error, Result};
use crate::models::candidate::Candidate;
use crate::models::question::Question;
use crate::models::test_definition::TestDefinition;
use crate::models::test_result::{AttemptMode, Completion, CompletionReason, NewTestResult, TestResult};
use crate::models::user_answer::UserAnswer;
use crate::services::eligibility::{self, EligibilityContext, EligibilityDecision};
use crate::services::question_pool::QuestionPoolSelector;
use crate::services::scoring::{self, AggregateOutcome, AnswerEntry};
use crate::utils::keyed_lock::KeyedLocks;
use crate::utils::time::Clock;

/// Payload handed to observers when an attempt closes.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptCompleted {
    pub result: TestResult,
    pub test_title: String,
    pub passing_score_percent: i32,
    pub is_passed: bool,
    pub candidate_name: String,
    pub candidate_telegram_id: Option<i64>,
}

/// Receives attempt outcomes for notification and audit. Failures are
/// logged by the caller and never affect scoring.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptObserver: Send + Sync {
    async fn attempt_completed(&self, event: AttemptCompleted) -> Result<()>;
    async fn candidate_blocked(&self, candidate: Candidate, reason: String) -> Result<()>;
}

pub struct NoopObserver;

#[async_trait]
impl AttemptObserver for NoopObserver {
    async fn attempt_completed(&self, _event: AttemptCompleted) -> Result<()> {
        Ok(())
    }

    async fn candidate_blocked(&self, _candidate: Candidate, _reason: String) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AttemptPolicy {
    pub bot_telegram_id: Option<i64>,
    /// Extra seconds past the time limit in which a submission still counts.
    pub submit_grace_seconds: i64,
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self {
            bot_telegram_id: None,
            submit_grace_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptSession {
    pub result: TestResult,
    pub resumed: bool,
    pub time_remaining_seconds: i64,
}

pub struct AttemptQuestions {
    pub result: TestResult,
    pub show_answers: bool,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptStatus {
    pub result: TestResult,
    pub test_title: String,
    pub passing_score_percent: i32,
    pub answered: usize,
    /// `None` once the attempt is closed.
    pub time_remaining_seconds: Option<i64>,
}

impl AttemptStatus {
    pub fn is_passed(&self) -> Option<bool> {
        self.result
            .is_completed
            .then(|| self.result.is_passed(self.passing_score_percent))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub result: TestResult,
    pub is_passed: bool,
    pub answers: AggregateOutcome,
    /// Set when the submission came too late and its batch was ignored.
    pub expired: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedAnswer {
    pub answers: AggregateOutcome,
    /// Whether the caller may reveal correctness right away.
    pub show_answers: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary {
    pub result: TestResult,
    pub test_title: String,
    pub is_passed: bool,
}

/// The attempt ledger: opens, resumes, scores and closes attempts.
#[derive(Clone)]
pub struct AttemptService {
    store: Arc<dyn ScreeningStore>,
    selector: QuestionPoolSelector,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks<(Uuid, Uuid)>>,
    observer: Arc<dyn AttemptObserver>,
    policy: AttemptPolicy,
}

impl AttemptService {
    pub fn new(
        store: Arc<dyn ScreeningStore>,
        selector: QuestionPoolSelector,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn AttemptObserver>,
        policy: AttemptPolicy,
    ) -> Self {
        Self {
            store,
            selector,
            clock,
            locks: Arc::new(KeyedLocks::new()),
            observer,
            policy,
        }
    }

    async fn load_candidate(&self, id: Uuid) -> Result<Candidate> {
        self.store
            .find_candidate(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", id)))
    }

    async fn load_test(&self, id: Uuid) -> Result<TestDefinition> {
        self.store
            .find_test(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", id)))
    }

    async fn load_active_test(&self, id: Uuid) -> Result<TestDefinition> {
        let test = self.load_test(id).await?;
        if !test.is_active {
            return Err(Error::NotFound(format!("Test {} not found", id)));
        }
        Ok(test)
    }

    async fn load_result(&self, id: Uuid) -> Result<TestResult> {
        self.store
            .find_result(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Attempt {} not found", id)))
    }

    /// Seconds after start past which the attempt is closed and a
    /// submission no longer applies its batch.
    fn expiry_seconds(&self, test: &TestDefinition) -> i64 {
        test.time_limit_seconds() + self.policy.submit_grace_seconds
    }

    /// Open attempts stay open through the grace window so a final
    /// submission can still land.
    fn is_stale(&self, result: &TestResult, test: &TestDefinition, now: DateTime<Utc>) -> bool {
        !result.is_completed && result.elapsed_seconds(now) > self.expiry_seconds(test)
    }

    fn is_overtime(result: &TestResult, test: &TestDefinition, now: DateTime<Utc>) -> bool {
        result.elapsed_seconds(now) >= test.time_limit_seconds()
    }

    fn time_remaining(result: &TestResult, test: &TestDefinition, now: DateTime<Utc>) -> i64 {
        (test.time_limit_seconds() - result.elapsed_seconds(now)).max(0)
    }

    /// Closes `result` from its stored answers. Caller holds the lock.
    async fn complete(
        &self,
        result: &TestResult,
        test: &TestDefinition,
        reason: CompletionReason,
        time_taken_seconds: i64,
    ) -> Result<TestResult> {
        let stored = self.store.answers_for_result(result.id).await?;
        let correct = scoring::tally(
            stored.iter().map(|a| (a.question_id, a.is_correct)),
            &result.question_ids,
        );
        let score = scoring::score_percent(correct, result.total_questions);
        let completion = Completion {
            completed_at: self.clock.now(),
            correct_answers: correct,
            score_percent: score,
            time_taken_seconds: time_taken_seconds.clamp(0, test.time_limit_seconds()) as i32,
            reason,
        };
        let closed = self.store.complete_result(result.id, completion).await?;

        tracing::info!(
            attempt_id = %closed.id,
            candidate_id = %closed.candidate_id,
            test_id = %closed.test_id,
            score = closed.score_percent,
            reason = reason.as_str(),
            "Attempt completed"
        );

        if closed.is_trial {
            if let Err(e) = self.store.record_trial_taken(closed.candidate_id, closed.test_id).await {
                tracing::error!("Failed to record trial test for attempt {}: {:?}", closed.id, e);
            }
        }

        match self.store.find_candidate(closed.candidate_id).await {
            Ok(Some(candidate)) => {
                let event = AttemptCompleted {
                    result: closed.clone(),
                    test_title: test.title.clone(),
                    passing_score_percent: test.passing_score_percent,
                    is_passed: closed.is_passed(test.passing_score_percent),
                    candidate_name: candidate.display_name(),
                    candidate_telegram_id: candidate.telegram_id,
                };
                if let Err(e) = self.observer.attempt_completed(event).await {
                    tracing::error!("Attempt observer failed for {}: {:?}", closed.id, e);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Failed to load candidate for attempt {}: {:?}", closed.id, e),
        }

        Ok(closed)
    }

    /// Expires `result` if its time limit has passed. Caller holds the lock.
    async fn expire_if_stale(&self, result: &TestResult, test: &TestDefinition) -> Result<Option<TestResult>> {
        if !self.is_stale(result, test, self.clock.now()) {
            return Ok(None);
        }
        let closed = self
            .complete(result, test, CompletionReason::Expired, test.time_limit_seconds())
            .await?;
        Ok(Some(closed))
    }

    async fn evaluate_gate(
        &self,
        candidate: &Candidate,
        test: &TestDefinition,
        mode: AttemptMode,
    ) -> Result<EligibilityDecision> {
        let counts = self.store.result_counts(candidate.id, test.id).await?;
        let has_cv = self.store.has_cv(candidate.id).await?;
        Ok(eligibility::evaluate(&EligibilityContext {
            candidate,
            test,
            mode,
            counts,
            has_cv,
            bot_telegram_id: self.policy.bot_telegram_id,
        }))
    }

    pub async fn check_eligibility(
        &self,
        candidate_id: Uuid,
        test_id: Uuid,
        mode: AttemptMode,
    ) -> Result<EligibilityDecision> {
        let candidate = self.load_candidate(candidate_id).await?;
        let test = self.load_active_test(test_id).await?;

        let _guard = self.locks.lock((candidate_id, test_id)).await;
        if let Some(open) = self.store.latest_open_result(candidate_id, test_id).await? {
            self.expire_if_stale(&open, &test).await?;
        }
        self.evaluate_gate(&candidate, &test, mode).await
    }

    pub async fn start_or_resume(
        &self,
        candidate_id: Uuid,
        test_id: Uuid,
        mode: AttemptMode,
    ) -> Result<AttemptSession> {
        let candidate = self.load_candidate(candidate_id).await?;
        let test = self.load_active_test(test_id).await?;

        let _guard = self.locks.lock((candidate_id, test_id)).await;

        let mut open = self.store.latest_open_result(candidate_id, test_id).await?;
        if let Some(result) = &open {
            if self.expire_if_stale(result, &test).await?.is_some() {
                open = None;
            }
        }

        let decision = self.evaluate_gate(&candidate, &test, mode).await?;
        if !decision.allowed {
            tracing::warn!(
                candidate_id = %candidate_id,
                test_id = %test_id,
                reason = decision.reason_code(),
                "Attempt start rejected"
            );
            return Err(Error::NotEligible(Box::new(decision)));
        }

        let now = self.clock.now();
        if let Some(result) = open {
            if result.mode() != mode {
                return Err(Error::InvalidState(format!(
                    "An open {} attempt already exists for this test",
                    if result.is_trial { "trial" } else { "regular" }
                )));
            }
            tracing::info!(attempt_id = %result.id, "Resuming attempt");
            let time_remaining_seconds = Self::time_remaining(&result, &test, now);
            return Ok(AttemptSession {
                result,
                resumed: true,
                time_remaining_seconds,
            });
        }

        let questions = self.store.questions_for_test(test_id).await?;
        let selected = self.selector.select(&test, mode, &questions);
        if selected.is_empty() {
            return Err(Error::InvalidState(format!("Test {} has no questions", test_id)));
        }

        let counts = self.store.result_counts(candidate_id, test_id).await?;
        let result = self
            .store
            .insert_result(NewTestResult {
                candidate_id,
                test_id,
                attempt_number: counts.total as i32 + 1,
                is_trial: mode.is_trial(),
                question_ids: selected.iter().map(|q| q.id).collect(),
                started_at: now,
            })
            .await?;

        tracing::info!(
            attempt_id = %result.id,
            candidate_id = %candidate_id,
            test_id = %test_id,
            attempt_number = result.attempt_number,
            trial = result.is_trial,
            questions = result.total_questions,
            "Attempt started"
        );

        Ok(AttemptSession {
            time_remaining_seconds: test.time_limit_seconds(),
            result,
            resumed: false,
        })
    }

    /// Returns the live open attempt for the pair; Invalid State if there is none.
    pub async fn resume(&self, candidate_id: Uuid, test_id: Uuid) -> Result<AttemptSession> {
        let candidate = self.load_candidate(candidate_id).await?;
        let test = self.load_active_test(test_id).await?;

        let _guard = self.locks.lock((candidate_id, test_id)).await;
        let open = self
            .store
            .latest_open_result(candidate_id, test_id)
            .await?
            .ok_or_else(|| Error::InvalidState("No open attempt to resume".to_string()))?;
        if self.expire_if_stale(&open, &test).await?.is_some() {
            return Err(Error::InvalidState("The attempt's time limit has elapsed".to_string()));
        }

        let decision = self.evaluate_gate(&candidate, &test, open.mode()).await?;
        if !decision.allowed {
            return Err(Error::NotEligible(Box::new(decision)));
        }

        let time_remaining_seconds = Self::time_remaining(&open, &test, self.clock.now());
        Ok(AttemptSession {
            result: open,
            resumed: true,
            time_remaining_seconds,
        })
    }

    pub async fn question_pool(&self, attempt_id: Uuid) -> Result<AttemptQuestions> {
        let result = self.load_result(attempt_id).await?;
        let test = self.load_test(result.test_id).await?;
        let questions = self.store.questions_for_test(test.id).await?;
        let questions = self.selector.present(&test, &result.question_ids, &questions);
        Ok(AttemptQuestions {
            result,
            show_answers: test.show_answers_immediately,
            questions,
        })
    }

    /// Incremental answer while the attempt is open.
    pub async fn save_answer(&self, attempt_id: Uuid, entry: AnswerEntry) -> Result<SavedAnswer> {
        let peek = self.load_result(attempt_id).await?;
        let _guard = self.locks.lock((peek.candidate_id, peek.test_id)).await;

        let result = self.load_result(attempt_id).await?;
        if result.is_completed {
            return Err(Error::InvalidState(format!("Attempt {} is already completed", attempt_id)));
        }
        let test = self.load_test(result.test_id).await?;
        if self.expire_if_stale(&result, &test).await?.is_some()
            || Self::is_overtime(&result, &test, self.clock.now())
        {
            return Err(Error::InvalidState("The attempt's time limit has elapsed".to_string()));
        }

        let questions = self.store.questions_for_test(test.id).await?;
        let outcome = scoring::aggregate(&questions, &result.question_ids, &[entry]);
        self.persist(&result, &outcome).await?;
        for skipped in &outcome.skipped {
            tracing::debug!(attempt_id = %attempt_id, question_id = skipped.question_id, reason = ?skipped.reason, "Answer skipped");
        }
        Ok(SavedAnswer {
            answers: outcome,
            show_answers: test.show_answers_immediately,
        })
    }

    async fn persist(&self, result: &TestResult, outcome: &AggregateOutcome) -> Result<()> {
        let now = self.clock.now();
        for applied in &outcome.applied {
            let written = self
                .store
                .upsert_answer(UserAnswer {
                    result_id: result.id,
                    question_id: applied.question_id,
                    selected_option_id: applied.option_id,
                    is_correct: applied.is_correct,
                    answered_at: now,
                })
                .await?;
            if !written {
                return Err(Error::InvalidState(format!("Attempt {} is already completed", result.id)));
            }
        }
        Ok(())
    }

    /// Applies a final batch and closes the attempt.
    ///
    /// `submitter_telegram_id` is the Telegram account making the request,
    /// when known; it must be the attempt owner and never the bot itself.
    pub async fn submit(
        &self,
        attempt_id: Uuid,
        answers: &[AnswerEntry],
        time_taken_seconds: Option<i64>,
        submitter_telegram_id: Option<i64>,
    ) -> Result<SubmissionOutcome> {
        let peek = self.load_result(attempt_id).await?;
        let _guard = self.locks.lock((peek.candidate_id, peek.test_id)).await;

        let result = self.load_result(attempt_id).await?;
        if result.is_completed {
            return Err(Error::InvalidState(format!("Attempt {} is already completed", attempt_id)));
        }

        if let Some(submitter) = submitter_telegram_id {
            if self.policy.bot_telegram_id == Some(submitter) {
                tracing::warn!(attempt_id = %attempt_id, "Bot account tried to submit a test");
                return Err(Error::Forbidden("The bot account cannot submit tests".to_string()));
            }
            let owner = self.load_candidate(result.candidate_id).await?;
            if owner.telegram_id != Some(submitter) {
                return Err(Error::Forbidden("This attempt belongs to another candidate".to_string()));
            }
        }

        let test = self.load_test(result.test_id).await?;
        let now = self.clock.now();
        let elapsed = result.elapsed_seconds(now);

        if elapsed > self.expiry_seconds(&test) {
            tracing::warn!(
                attempt_id = %attempt_id,
                elapsed_seconds = elapsed,
                "Late submission ignored, expiring attempt"
            );
            let closed = self
                .complete(&result, &test, CompletionReason::Expired, test.time_limit_seconds())
                .await?;
            return Ok(SubmissionOutcome {
                is_passed: closed.is_passed(test.passing_score_percent),
                result: closed,
                answers: AggregateOutcome::default(),
                expired: true,
            });
        }

        let questions = self.store.questions_for_test(test.id).await?;
        let outcome = scoring::aggregate(&questions, &result.question_ids, answers);
        if !outcome.skipped.is_empty() {
            tracing::info!(
                attempt_id = %attempt_id,
                skipped = outcome.skipped.len(),
                "Some submitted answers were skipped"
            );
        }
        self.persist(&result, &outcome).await?;

        let taken = time_taken_seconds.unwrap_or(elapsed);
        let closed = self.complete(&result, &test, CompletionReason::Submitted, taken).await?;
        Ok(SubmissionOutcome {
            is_passed: closed.is_passed(test.passing_score_percent),
            result: closed,
            answers: outcome,
            expired: false,
        })
    }

    pub async fn attempt_status(&self, attempt_id: Uuid) -> Result<AttemptStatus> {
        let peek = self.load_result(attempt_id).await?;
        let test = self.load_test(peek.test_id).await?;

        let result = if peek.is_completed {
            peek
        } else {
            let _guard = self.locks.lock((peek.candidate_id, peek.test_id)).await;
            let current = self.load_result(attempt_id).await?;
            match self.expire_if_stale(&current, &test).await? {
                Some(closed) => closed,
                None => current,
            }
        };

        let answered = self.store.answers_for_result(attempt_id).await?.len();
        let time_remaining_seconds =
            (!result.is_completed).then(|| Self::time_remaining(&result, &test, self.clock.now()));
        Ok(AttemptStatus {
            result,
            test_title: test.title,
            passing_score_percent: test.passing_score_percent,
            answered,
            time_remaining_seconds,
        })
    }

    pub async fn results_for_candidate(&self, candidate_id: Uuid) -> Result<Vec<ResultSummary>> {
        self.load_candidate(candidate_id).await?;
        let results = self.store.completed_results_for_candidate(candidate_id).await?;
        let mut out = Vec::with_capacity(results.len());
        for result in results {
            let Some(test) = self.store.find_test(result.test_id).await? else {
                continue;
            };
            out.push(ResultSummary {
                is_passed: result.is_passed(test.passing_score_percent),
                test_title: test.title,
                result,
            });
        }
        Ok(out)
    }

    /// Expires every open attempt whose time limit and grace window have passed.
    pub async fn sweep_stale(&self) -> Result<usize> {
        let now = self.clock.now();
        let cutoff = now - chrono::Duration::seconds(self.policy.submit_grace_seconds);
        let stale = self.store.stale_open_results(cutoff).await?;
        let mut expired = 0;
        for candidate in stale {
            let _guard = self.locks.lock((candidate.candidate_id, candidate.test_id)).await;
            let current = self.load_result(candidate.id).await?;
            let test = self.load_test(current.test_id).await?;
            if self.expire_if_stale(&current, &test).await?.is_some() {
                expired += 1;
            }
        }
        if expired > 0 {
            tracing::info!("Expired {} stale attempts", expired);
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::candidate::{BlockInfo, NewCandidate};
    use crate::models::cv::NewCv;
    use crate::models::question::{NewAnswerOption, NewQuestion};
    use crate::models::test_definition::{NewTestDefinition, TestMode, TestPatch};
    use crate::services::eligibility::EligibilityReason;
    use crate::services::question_pool::SeededRandom;
    use crate::utils::time::ManualClock;
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};

    struct Fixture {
        service: AttemptService,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        test: TestDefinition,
        candidate: Candidate,
        questions: Vec<Question>,
    }

    fn new_test() -> NewTestDefinition {
        NewTestDefinition {
            title: "Backend screening".into(),
            description: None,
            time_limit_minutes: 10,
            passing_score_percent: 60,
            max_attempts: 3,
            max_trial_attempts: 1,
            trial_question_count: 3,
            random_question_count: 0,
            show_answers_immediately: false,
            shuffle_questions: false,
            shuffle_options: false,
            test_mode: TestMode::Both,
            is_active: true,
            position_ids: vec![],
        }
    }

    async fn fixture_with(
        question_count: usize,
        observer: Arc<dyn AttemptObserver>,
        tweak: impl FnOnce(&mut NewTestDefinition),
    ) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut def = new_test();
        tweak(&mut def);
        let test = store.insert_test(def).await.unwrap();
        let mut questions = Vec::new();
        for i in 0..question_count {
            let q = store
                .insert_question(
                    test.id,
                    NewQuestion {
                        text: format!("Question {}", i + 1),
                        order: i as i32,
                        options: vec![
                            NewAnswerOption { text: "right".into(), is_correct: true },
                            NewAnswerOption { text: "wrong".into(), is_correct: false },
                        ],
                    },
                )
                .await
                .unwrap();
            questions.push(q);
        }
        let candidate = store
            .insert_candidate(NewCandidate {
                telegram_id: Some(1001),
                first_name: "Aziz".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let service = AttemptService::new(
            store.clone(),
            QuestionPoolSelector::new(Arc::new(SeededRandom::new(42))),
            clock.clone(),
            observer,
            AttemptPolicy {
                bot_telegram_id: Some(777),
                submit_grace_seconds: 30,
            },
        );
        Fixture { service, store, clock, test, candidate, questions }
    }

    async fn fixture(question_count: usize) -> Fixture {
        fixture_with(question_count, Arc::new(NoopObserver), |_| {}).await
    }

    impl Fixture {
        fn question(&self, id: i64) -> &Question {
            self.questions.iter().find(|q| q.id == id).unwrap()
        }

        fn right(&self, question_id: i64) -> AnswerEntry {
            let q = self.question(question_id);
            AnswerEntry { question_id, option_id: q.options[0].id }
        }

        fn wrong(&self, question_id: i64) -> AnswerEntry {
            let q = self.question(question_id);
            AnswerEntry { question_id, option_id: q.options[1].id }
        }

        async fn start(&self, mode: AttemptMode) -> AttemptSession {
            self.service
                .start_or_resume(self.candidate.id, self.test.id, mode)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn all_correct_answers_score_full_marks() {
        let fx = fixture(5).await;
        let session = fx.start(AttemptMode::Regular).await;
        assert!(!session.resumed);
        assert_eq!(session.result.total_questions, 5);
        assert_eq!(session.time_remaining_seconds, 600);

        let answers: Vec<AnswerEntry> = session.result.question_ids.iter().map(|id| fx.right(*id)).collect();
        let outcome = fx.service.submit(session.result.id, &answers, Some(120), None).await.unwrap();

        assert!(outcome.is_passed);
        assert_eq!(outcome.result.correct_answers, 5);
        assert_eq!(outcome.result.score_percent, 100);
        assert_eq!(outcome.result.time_taken_seconds, 120);
        assert_eq!(outcome.result.completion_reason.as_deref(), Some("submitted"));
    }

    #[tokio::test]
    async fn unanswered_questions_count_against_the_score() {
        let fx = fixture(10).await;
        let session = fx.start(AttemptMode::Regular).await;
        let ids = &session.result.question_ids;
        let answers = vec![fx.right(ids[0]), fx.right(ids[1]), fx.right(ids[2]), fx.wrong(ids[3])];

        let outcome = fx.service.submit(session.result.id, &answers, None, None).await.unwrap();
        assert_eq!(outcome.result.total_questions, 10);
        assert_eq!(outcome.result.correct_answers, 3);
        assert_eq!(outcome.result.score_percent, 30);
        assert!(!outcome.is_passed);
    }

    #[tokio::test]
    async fn repeated_answers_are_idempotent_and_last_wins() {
        let fx = fixture(3).await;
        let session = fx.start(AttemptMode::Regular).await;
        let q = session.result.question_ids[0];

        assert_ok!(fx.service.save_answer(session.result.id, fx.wrong(q)).await);
        assert_ok!(fx.service.save_answer(session.result.id, fx.wrong(q)).await);
        let stored = fx.store.answers_for_result(session.result.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].is_correct);

        assert_ok!(fx.service.save_answer(session.result.id, fx.right(q)).await);
        let stored = fx.store.answers_for_result(session.result.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].selected_option_id, fx.right(q).option_id);

        let batch = vec![fx.right(q), fx.right(q)];
        let outcome = fx.service.submit(session.result.id, &batch, None, None).await.unwrap();
        assert_eq!(outcome.answers.applied.len(), 1);
        assert_eq!(outcome.result.correct_answers, 1);
        assert_eq!(outcome.result.score_percent, 33);
    }

    #[tokio::test]
    async fn attempt_numbers_increase_and_are_never_reused() {
        let fx = fixture(2).await;
        let first = fx.start(AttemptMode::Regular).await;
        assert_eq!(first.result.attempt_number, 1);
        fx.service.submit(first.result.id, &[], None, None).await.unwrap();

        let second = fx.start(AttemptMode::Regular).await;
        assert_eq!(second.result.attempt_number, 2);

        // abandoned attempt still takes its number
        fx.clock.advance(Duration::minutes(11));
        let third = fx.start(AttemptMode::Regular).await;
        assert_eq!(third.result.attempt_number, 3);
    }

    #[tokio::test]
    async fn concurrent_starts_share_one_open_attempt() {
        let fx = fixture(4).await;
        let (a, b) = tokio::join!(
            fx.service.start_or_resume(fx.candidate.id, fx.test.id, AttemptMode::Regular),
            fx.service.start_or_resume(fx.candidate.id, fx.test.id, AttemptMode::Regular),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.result.id, b.result.id);
        assert!(a.resumed ^ b.resumed);
        assert_eq!(fx.store.result_counts(fx.candidate.id, fx.test.id).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn blocking_mid_attempt_only_stops_new_starts() {
        let fx = fixture(2).await;
        let session = fx.start(AttemptMode::Regular).await;
        fx.store
            .set_block(
                fx.candidate.id,
                Some(BlockInfo { reason: "page leave".into(), blocked_at: Utc::now() }),
            )
            .await
            .unwrap();

        let ids = session.result.question_ids.clone();
        let answers: Vec<AnswerEntry> = ids.iter().map(|id| fx.right(*id)).collect();
        let outcome = assert_ok!(fx.service.submit(session.result.id, &answers, None, None).await);
        assert_eq!(outcome.result.score_percent, 100);

        let err = assert_err!(
            fx.service
                .start_or_resume(fx.candidate.id, fx.test.id, AttemptMode::Regular)
                .await
        );
        match err {
            Error::NotEligible(decision) => {
                assert_eq!(decision.reason, Some(EligibilityReason::Blocked));
                assert_eq!(decision.blocked_reason.as_deref(), Some("page leave"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn pass_flag_follows_the_current_threshold() {
        let fx = fixture(5).await;
        let session = fx.start(AttemptMode::Regular).await;
        let ids = &session.result.question_ids;
        let answers: Vec<AnswerEntry> = ids.iter().take(3).map(|id| fx.right(*id)).collect();
        let outcome = fx.service.submit(session.result.id, &answers, None, None).await.unwrap();
        assert_eq!(outcome.result.score_percent, 60);
        assert!(outcome.is_passed);

        fx.store
            .update_test(fx.test.id, TestPatch { passing_score_percent: Some(70), ..Default::default() })
            .await
            .unwrap();
        let history = fx.service.results_for_candidate(fx.candidate.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].is_passed);
    }

    #[tokio::test]
    async fn trial_selects_subset_and_respects_trial_limit() {
        let fx = fixture(10).await;
        let session = fx.start(AttemptMode::Trial).await;
        assert_eq!(session.result.total_questions, 3);
        assert!(session.result.is_trial);

        fx.service.submit(session.result.id, &[], None, None).await.unwrap();
        let candidate = fx.store.find_candidate(fx.candidate.id).await.unwrap().unwrap();
        assert_eq!(candidate.trial_tests_taken, vec![fx.test.id]);

        let err = assert_err!(
            fx.service
                .start_or_resume(fx.candidate.id, fx.test.id, AttemptMode::Trial)
                .await
        );
        assert!(matches!(
            err,
            Error::NotEligible(ref d) if d.reason == Some(EligibilityReason::AttemptsExhausted)
        ));

        // regular attempts are counted separately
        let regular = fx.start(AttemptMode::Regular).await;
        assert_eq!(regular.result.total_questions, 10);
        assert_eq!(regular.result.attempt_number, 2);
    }

    #[tokio::test]
    async fn reconnect_within_limit_resumes_same_attempt() {
        let fx = fixture(4).await;
        let session = fx.start(AttemptMode::Regular).await;
        let q = session.result.question_ids[0];
        fx.service.save_answer(session.result.id, fx.right(q)).await.unwrap();

        fx.clock.advance(Duration::minutes(4));
        let again = fx.start(AttemptMode::Regular).await;
        assert!(again.resumed);
        assert_eq!(again.result.id, session.result.id);
        assert_eq!(again.time_remaining_seconds, 360);

        let resumed = fx.service.resume(fx.candidate.id, fx.test.id).await.unwrap();
        assert_eq!(resumed.result.id, session.result.id);
        let stored = fx.store.answers_for_result(session.result.id).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn reconnect_after_limit_expires_and_starts_fresh() {
        let fx = fixture(5).await;
        let session = fx.start(AttemptMode::Regular).await;
        let q = session.result.question_ids[0];
        fx.service.save_answer(session.result.id, fx.right(q)).await.unwrap();

        fx.clock.advance(Duration::minutes(11));
        let fresh = fx.start(AttemptMode::Regular).await;
        assert!(!fresh.resumed);
        assert_ne!(fresh.result.id, session.result.id);
        assert_eq!(fresh.result.attempt_number, 2);

        let old = fx.store.find_result(session.result.id).await.unwrap().unwrap();
        assert!(old.is_completed);
        assert_eq!(old.completion_reason.as_deref(), Some("expired"));
        assert_eq!(old.correct_answers, 1);
        assert_eq!(old.score_percent, 20);
        assert_eq!(old.time_taken_seconds, 600);
    }

    #[tokio::test]
    async fn expired_attempt_is_not_restarted_when_attempts_are_exhausted() {
        let fx = fixture_with(2, Arc::new(NoopObserver), |t| t.max_attempts = 1).await;
        fx.start(AttemptMode::Regular).await;
        fx.clock.advance(Duration::minutes(15));

        let decision = fx
            .service
            .check_eligibility(fx.candidate.id, fx.test.id, AttemptMode::Regular)
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.attempts_used, 1);
        assert_eq!(decision.attempts_allowed, 1);
    }

    #[tokio::test]
    async fn late_submission_batch_is_ignored() {
        let fx = fixture(2).await;
        let session = fx.start(AttemptMode::Regular).await;
        let q = session.result.question_ids[0];
        fx.service.save_answer(session.result.id, fx.right(q)).await.unwrap();

        fx.clock.advance(Duration::seconds(600 + 31));
        let answers: Vec<AnswerEntry> = session.result.question_ids.iter().map(|id| fx.right(*id)).collect();
        let outcome = fx.service.submit(session.result.id, &answers, Some(10), None).await.unwrap();
        assert!(outcome.expired);
        assert_eq!(outcome.result.correct_answers, 1);
        assert_eq!(outcome.result.score_percent, 50);
        assert_eq!(outcome.result.completion_reason.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn submission_within_grace_is_accepted() {
        let fx = fixture(2).await;
        let session = fx.start(AttemptMode::Regular).await;
        fx.clock.advance(Duration::seconds(620));
        let answers: Vec<AnswerEntry> = session.result.question_ids.iter().map(|id| fx.right(*id)).collect();
        let outcome = fx.service.submit(session.result.id, &answers, Some(5000), None).await.unwrap();
        assert!(!outcome.expired);
        assert_eq!(outcome.result.score_percent, 100);
        assert_eq!(outcome.result.time_taken_seconds, 600);
    }

    #[tokio::test]
    async fn status_poll_in_grace_window_keeps_the_final_submission() {
        let fx = fixture(2).await;
        let session = fx.start(AttemptMode::Regular).await;
        let q = session.result.question_ids[0];

        fx.clock.advance(Duration::seconds(605));
        let status = fx.service.attempt_status(session.result.id).await.unwrap();
        assert!(!status.result.is_completed);
        assert_eq!(status.time_remaining_seconds, Some(0));

        let err = assert_err!(fx.service.save_answer(session.result.id, fx.right(q)).await);
        assert!(matches!(err, Error::InvalidState(_)));
        let still_open = fx.store.find_result(session.result.id).await.unwrap().unwrap();
        assert!(!still_open.is_completed);

        let answers: Vec<AnswerEntry> = session.result.question_ids.iter().map(|id| fx.right(*id)).collect();
        let outcome = fx.service.submit(session.result.id, &answers, None, None).await.unwrap();
        assert!(!outcome.expired);
        assert_eq!(outcome.result.completion_reason.as_deref(), Some("submitted"));
        assert_eq!(outcome.result.score_percent, 100);
    }

    #[tokio::test]
    async fn closed_attempts_reject_further_writes() {
        let fx = fixture(2).await;
        let session = fx.start(AttemptMode::Regular).await;
        let q = session.result.question_ids[0];
        fx.service.submit(session.result.id, &[], None, None).await.unwrap();

        let err = assert_err!(fx.service.submit(session.result.id, &[], None, None).await);
        assert!(matches!(err, Error::InvalidState(_)));
        let err = assert_err!(fx.service.save_answer(session.result.id, fx.right(q)).await);
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(fx.store.answers_for_result(session.result.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resume_without_open_attempt_is_invalid() {
        let fx = fixture(2).await;
        let err = assert_err!(fx.service.resume(fx.candidate.id, fx.test.id).await);
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn open_attempt_in_other_mode_blocks_start() {
        let fx = fixture(5).await;
        fx.start(AttemptMode::Trial).await;
        let err = assert_err!(
            fx.service
                .start_or_resume(fx.candidate.id, fx.test.id, AttemptMode::Regular)
                .await
        );
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn submitter_must_own_the_attempt_and_not_be_the_bot() {
        let fx = fixture(2).await;
        let session = fx.start(AttemptMode::Regular).await;

        let err = assert_err!(fx.service.submit(session.result.id, &[], None, Some(777)).await);
        assert!(matches!(err, Error::Forbidden(_)));
        let err = assert_err!(fx.service.submit(session.result.id, &[], None, Some(2002)).await);
        assert!(matches!(err, Error::Forbidden(_)));
        assert_ok!(fx.service.submit(session.result.id, &[], None, Some(1001)).await);
    }

    #[tokio::test]
    async fn passed_candidate_with_cv_is_locked_out() {
        let fx = fixture(2).await;
        let session = fx.start(AttemptMode::Regular).await;
        let answers: Vec<AnswerEntry> = session.result.question_ids.iter().map(|id| fx.right(*id)).collect();
        fx.service.submit(session.result.id, &answers, None, None).await.unwrap();

        let decision = fx
            .service
            .check_eligibility(fx.candidate.id, fx.test.id, AttemptMode::Regular)
            .await
            .unwrap();
        assert!(decision.allowed);

        fx.store
            .insert_cv(NewCv {
                candidate_id: fx.candidate.id,
                file_name: "cv.pdf".into(),
                file_size: 1024,
                file_path: "/tmp/cv.pdf".into(),
            })
            .await
            .unwrap();
        let decision = fx
            .service
            .check_eligibility(fx.candidate.id, fx.test.id, AttemptMode::Regular)
            .await
            .unwrap();
        assert_eq!(decision.reason, Some(EligibilityReason::CvLocked));
    }

    #[tokio::test]
    async fn observer_hears_each_completion_once() {
        let mut observer = MockAttemptObserver::new();
        observer
            .expect_attempt_completed()
            .withf(|event| event.is_passed && event.candidate_telegram_id == Some(1001))
            .times(1)
            .returning(|_| Ok(()));
        let fx = fixture_with(2, Arc::new(observer), |_| {}).await;
        let session = fx.start(AttemptMode::Regular).await;
        let answers: Vec<AnswerEntry> = session.result.question_ids.iter().map(|id| fx.right(*id)).collect();
        fx.service.submit(session.result.id, &answers, None, None).await.unwrap();
        assert_err!(fx.service.submit(session.result.id, &answers, None, None).await);
    }

    #[tokio::test]
    async fn observer_failure_does_not_fail_submission() {
        let mut observer = MockAttemptObserver::new();
        observer
            .expect_attempt_completed()
            .returning(|_| Err(Error::Internal("outbox down".into())));
        let fx = fixture_with(1, Arc::new(observer), |_| {}).await;
        let session = fx.start(AttemptMode::Regular).await;
        assert_ok!(fx.service.submit(session.result.id, &[], None, None).await);
    }

    #[tokio::test]
    async fn trial_bookkeeping_failure_still_returns_the_closed_attempt() {
        let fx = fixture(4).await;
        let session = fx.start(AttemptMode::Trial).await;
        fx.store.remove_candidate(fx.candidate.id).unwrap();

        let outcome = assert_ok!(fx.service.submit(session.result.id, &[], None, None).await);
        assert!(outcome.result.is_completed);
        assert!(outcome.result.is_trial);
        let stored = fx.store.find_result(session.result.id).await.unwrap().unwrap();
        assert!(stored.is_completed);
    }

    #[tokio::test]
    async fn empty_test_cannot_be_started() {
        let fx = fixture(0).await;
        let err = assert_err!(
            fx.service
                .start_or_resume(fx.candidate.id, fx.test.id, AttemptMode::Regular)
                .await
        );
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn status_reports_remaining_time_and_expires_lazily() {
        let fx = fixture(3).await;
        let session = fx.start(AttemptMode::Regular).await;
        fx.clock.advance(Duration::minutes(3));
        let status = fx.service.attempt_status(session.result.id).await.unwrap();
        assert_eq!(status.time_remaining_seconds, Some(420));
        assert_eq!(status.is_passed(), None);

        fx.clock.advance(Duration::minutes(8));
        let status = fx.service.attempt_status(session.result.id).await.unwrap();
        assert!(status.result.is_completed);
        assert_eq!(status.time_remaining_seconds, None);
        assert_eq!(status.is_passed(), Some(false));
    }

    #[tokio::test]
    async fn sweep_closes_only_stale_attempts() {
        let fx = fixture(2).await;
        let session = fx.start(AttemptMode::Regular).await;
        assert_eq!(fx.service.sweep_stale().await.unwrap(), 0);
        fx.clock.advance(Duration::seconds(620));
        assert_eq!(fx.service.sweep_stale().await.unwrap(), 0);
        fx.clock.advance(Duration::seconds(11));
        assert_eq!(fx.service.sweep_stale().await.unwrap(), 1);
        let closed = fx.store.find_result(session.result.id).await.unwrap().unwrap();
        assert_eq!(closed.completion_reason.as_deref(), Some("expired"));
    }
}
