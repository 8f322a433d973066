use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::database::store::ScreeningStore;
use crate::error::{Error, Result};
use crate::models::candidate::{BlockInfo, Candidate, NewCandidate, NewPosition, Position, ProfilePatch};
use crate::models::cv::{Cv, NewCv};
use crate::models::question::{sort_canonical, AnswerOption, NewQuestion, Question};
use crate::models::test_definition::{NewTestDefinition, TestDefinition, TestFilter, TestPatch};
use crate::models::test_result::{Completion, NewTestResult, ResultCounts, TestResult};
use crate::models::user_answer::UserAnswer;
use crate::models::webhook_log::{DeliveryOutcome, WebhookLog};

/// In-process store. Backs the HTTP tests and lets the service run
/// without Postgres; it enforces the same invariants as the schema.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    tests: HashMap<Uuid, TestDefinition>,
    test_positions: Vec<(Uuid, Uuid)>,
    questions: HashMap<i64, Question>,
    next_question_id: i64,
    next_option_id: i64,
    positions: HashMap<Uuid, Position>,
    candidates: HashMap<Uuid, Candidate>,
    cvs: Vec<Cv>,
    results: HashMap<Uuid, TestResult>,
    answers: HashMap<(Uuid, i64), UserAnswer>,
    events: Vec<WebhookLog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }

    /// Outbox rows in insertion order.
    pub fn events(&self) -> Result<Vec<WebhookLog>> {
        Ok(self.state()?.events.clone())
    }

    #[cfg(test)]
    pub(crate) fn remove_candidate(&self, id: Uuid) -> Result<()> {
        self.state()?.candidates.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ScreeningStore for MemoryStore {
    async fn insert_test(&self, new: NewTestDefinition) -> Result<TestDefinition> {
        let mut state = self.state()?;
        let now = Utc::now();
        let test = TestDefinition {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            time_limit_minutes: new.time_limit_minutes,
            passing_score_percent: new.passing_score_percent,
            max_attempts: new.max_attempts,
            max_trial_attempts: new.max_trial_attempts,
            trial_question_count: new.trial_question_count,
            random_question_count: new.random_question_count,
            show_answers_immediately: new.show_answers_immediately,
            shuffle_questions: new.shuffle_questions,
            shuffle_options: new.shuffle_options,
            test_mode: new.test_mode.as_str().to_string(),
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };
        for position_id in new.position_ids {
            if !state.positions.contains_key(&position_id) {
                return Err(Error::NotFound(format!("Position {} not found", position_id)));
            }
            state.test_positions.push((test.id, position_id));
        }
        state.tests.insert(test.id, test.clone());
        Ok(test)
    }

    async fn update_test(&self, id: Uuid, patch: TestPatch) -> Result<TestDefinition> {
        let mut state = self.state()?;
        let test = state
            .tests
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", id)))?;
        patch.apply(test);
        test.updated_at = Utc::now();
        Ok(test.clone())
    }

    async fn find_test(&self, id: Uuid) -> Result<Option<TestDefinition>> {
        Ok(self.state()?.tests.get(&id).cloned())
    }

    async fn list_tests(&self, filter: TestFilter) -> Result<Vec<TestDefinition>> {
        let state = self.state()?;
        let mut tests: Vec<TestDefinition> = state
            .tests
            .values()
            .filter(|t| !filter.active_only || t.is_active)
            .filter(|t| match filter.position_id {
                Some(position_id) => {
                    let open = state.positions.get(&position_id).map(|p| p.is_open).unwrap_or(false);
                    open && state.test_positions.contains(&(t.id, position_id))
                }
                None => true,
            })
            .cloned()
            .collect();
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tests)
    }

    async fn insert_question(&self, test_id: Uuid, new: NewQuestion) -> Result<Question> {
        let mut state = self.state()?;
        if !state.tests.contains_key(&test_id) {
            return Err(Error::NotFound(format!("Test {} not found", test_id)));
        }
        state.next_question_id += 1;
        let question_id = state.next_question_id;
        let mut options = Vec::with_capacity(new.options.len());
        for (idx, option) in new.options.into_iter().enumerate() {
            state.next_option_id += 1;
            options.push(AnswerOption {
                id: state.next_option_id,
                question_id,
                text: option.text,
                is_correct: option.is_correct,
                order: idx as i32,
            });
        }
        let question = Question {
            id: question_id,
            test_id,
            text: new.text,
            order: new.order,
            options,
        };
        state.questions.insert(question_id, question.clone());
        Ok(question)
    }

    async fn questions_for_test(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let state = self.state()?;
        let mut questions: Vec<Question> = state
            .questions
            .values()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect();
        sort_canonical(&mut questions);
        Ok(questions)
    }

    async fn insert_position(&self, new: NewPosition) -> Result<Position> {
        let mut state = self.state()?;
        if state.positions.values().any(|p| p.name == new.name) {
            return Err(Error::Conflict(format!("Position '{}' already exists", new.name)));
        }
        let position = Position {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            is_open: new.is_open,
            created_at: Utc::now(),
        };
        state.positions.insert(position.id, position.clone());
        Ok(position)
    }

    async fn find_position(&self, id: Uuid) -> Result<Option<Position>> {
        Ok(self.state()?.positions.get(&id).cloned())
    }

    async fn list_open_positions(&self) -> Result<Vec<Position>> {
        let state = self.state()?;
        let mut positions: Vec<Position> =
            state.positions.values().filter(|p| p.is_open).cloned().collect();
        positions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(positions)
    }

    async fn insert_candidate(&self, new: NewCandidate) -> Result<Candidate> {
        let mut state = self.state()?;
        if let Some(telegram_id) = new.telegram_id {
            if state.candidates.values().any(|c| c.telegram_id == Some(telegram_id)) {
                return Err(Error::Conflict(format!(
                    "A candidate with Telegram ID {} already exists",
                    telegram_id
                )));
            }
        }
        let now = Utc::now();
        let candidate = Candidate {
            id: Uuid::new_v4(),
            telegram_id: new.telegram_id,
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            email: new.email,
            position_id: new.position_id,
            is_blocked: false,
            blocked_reason: None,
            blocked_at: None,
            trial_tests_taken: Vec::new(),
            notification_enabled: true,
            created_at: now,
            updated_at: now,
        };
        state.candidates.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn find_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        Ok(self.state()?.candidates.get(&id).cloned())
    }

    async fn find_candidate_by_telegram(&self, telegram_id: i64) -> Result<Option<Candidate>> {
        Ok(self
            .state()?
            .candidates
            .values()
            .find(|c| c.telegram_id == Some(telegram_id))
            .cloned())
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<Candidate> {
        let mut state = self.state()?;
        let candidate = state
            .candidates
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", id)))?;
        if let Some(v) = patch.first_name {
            candidate.first_name = v;
        }
        if let Some(v) = patch.last_name {
            candidate.last_name = v;
        }
        if let Some(v) = patch.phone {
            candidate.phone = Some(v);
        }
        if let Some(v) = patch.email {
            candidate.email = Some(v);
        }
        if let Some(v) = patch.position_id {
            candidate.position_id = Some(v);
        }
        if let Some(v) = patch.notification_enabled {
            candidate.notification_enabled = v;
        }
        candidate.updated_at = Utc::now();
        Ok(candidate.clone())
    }

    async fn set_block(&self, id: Uuid, block: Option<BlockInfo>) -> Result<Candidate> {
        let mut state = self.state()?;
        let candidate = state
            .candidates
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", id)))?;
        match block {
            Some(info) => {
                candidate.is_blocked = true;
                candidate.blocked_reason = Some(info.reason);
                candidate.blocked_at = Some(info.blocked_at);
            }
            None => {
                candidate.is_blocked = false;
                candidate.blocked_reason = None;
                candidate.blocked_at = None;
            }
        }
        candidate.updated_at = Utc::now();
        Ok(candidate.clone())
    }

    async fn record_trial_taken(&self, candidate_id: Uuid, test_id: Uuid) -> Result<()> {
        let mut state = self.state()?;
        let candidate = state
            .candidates
            .get_mut(&candidate_id)
            .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", candidate_id)))?;
        if !candidate.trial_tests_taken.contains(&test_id) {
            candidate.trial_tests_taken.push(test_id);
        }
        Ok(())
    }

    async fn notifiable_candidates(&self, ids: Option<Vec<Uuid>>) -> Result<Vec<Candidate>> {
        let state = self.state()?;
        let mut candidates: Vec<Candidate> = state
            .candidates
            .values()
            .filter(|c| c.telegram_id.is_some() && c.notification_enabled)
            .filter(|c| ids.as_ref().map(|ids| ids.contains(&c.id)).unwrap_or(true))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(candidates)
    }

    async fn insert_cv(&self, new: NewCv) -> Result<Cv> {
        let mut state = self.state()?;
        if !state.candidates.contains_key(&new.candidate_id) {
            return Err(Error::NotFound(format!("Candidate {} not found", new.candidate_id)));
        }
        let cv = Cv {
            id: Uuid::new_v4(),
            candidate_id: new.candidate_id,
            file_name: new.file_name,
            file_size: new.file_size,
            file_path: new.file_path,
            uploaded_at: Utc::now(),
        };
        state.cvs.push(cv.clone());
        Ok(cv)
    }

    async fn has_cv(&self, candidate_id: Uuid) -> Result<bool> {
        Ok(self.state()?.cvs.iter().any(|cv| cv.candidate_id == candidate_id))
    }

    async fn result_counts(&self, candidate_id: Uuid, test_id: Uuid) -> Result<ResultCounts> {
        let state = self.state()?;
        let mut counts = ResultCounts::default();
        for result in state
            .results
            .values()
            .filter(|r| r.candidate_id == candidate_id && r.test_id == test_id)
        {
            counts.total += 1;
            if result.is_completed {
                if result.is_trial {
                    counts.completed_trial += 1;
                } else {
                    counts.completed_regular += 1;
                }
                counts.best_completed_score = Some(
                    counts
                        .best_completed_score
                        .map_or(result.score_percent, |best| best.max(result.score_percent)),
                );
            }
        }
        Ok(counts)
    }

    async fn latest_open_result(&self, candidate_id: Uuid, test_id: Uuid) -> Result<Option<TestResult>> {
        let state = self.state()?;
        Ok(state
            .results
            .values()
            .filter(|r| r.candidate_id == candidate_id && r.test_id == test_id && !r.is_completed)
            .max_by_key(|r| r.started_at)
            .cloned())
    }

    async fn insert_result(&self, new: NewTestResult) -> Result<TestResult> {
        let mut state = self.state()?;
        let clash = state.results.values().any(|r| {
            r.candidate_id == new.candidate_id
                && r.test_id == new.test_id
                && (!r.is_completed || r.attempt_number == new.attempt_number)
        });
        if clash {
            return Err(Error::Conflict(
                "An open attempt already exists for this candidate and test".to_string(),
            ));
        }
        let result = TestResult {
            id: Uuid::new_v4(),
            candidate_id: new.candidate_id,
            test_id: new.test_id,
            attempt_number: new.attempt_number,
            is_trial: new.is_trial,
            total_questions: new.question_ids.len() as i32,
            question_ids: new.question_ids,
            correct_answers: 0,
            score_percent: 0,
            time_taken_seconds: 0,
            started_at: new.started_at,
            completed_at: None,
            is_completed: false,
            completion_reason: None,
        };
        state.results.insert(result.id, result.clone());
        Ok(result)
    }

    async fn find_result(&self, id: Uuid) -> Result<Option<TestResult>> {
        Ok(self.state()?.results.get(&id).cloned())
    }

    async fn completed_results_for_candidate(&self, candidate_id: Uuid) -> Result<Vec<TestResult>> {
        let state = self.state()?;
        let mut results: Vec<TestResult> = state
            .results
            .values()
            .filter(|r| r.candidate_id == candidate_id && r.is_completed)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(results)
    }

    async fn stale_open_results(&self, cutoff: DateTime<Utc>) -> Result<Vec<TestResult>> {
        let state = self.state()?;
        Ok(state
            .results
            .values()
            .filter(|r| !r.is_completed)
            .filter(|r| match state.tests.get(&r.test_id) {
                Some(test) => r.elapsed_seconds(cutoff) >= test.time_limit_seconds(),
                None => false,
            })
            .cloned()
            .collect())
    }

    async fn complete_result(&self, id: Uuid, completion: Completion) -> Result<TestResult> {
        let mut state = self.state()?;
        let result = state
            .results
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Attempt {} not found", id)))?;
        if result.is_completed {
            return Err(Error::InvalidState(format!("Attempt {} is already completed", id)));
        }
        result.is_completed = true;
        result.completed_at = Some(completion.completed_at);
        result.correct_answers = completion.correct_answers;
        result.score_percent = completion.score_percent;
        result.time_taken_seconds = completion.time_taken_seconds;
        result.completion_reason = Some(completion.reason.as_str().to_string());
        Ok(result.clone())
    }

    async fn upsert_answer(&self, answer: UserAnswer) -> Result<bool> {
        let mut state = self.state()?;
        let open = state
            .results
            .get(&answer.result_id)
            .map(|r| !r.is_completed)
            .unwrap_or(false);
        if !open {
            return Ok(false);
        }
        state
            .answers
            .insert((answer.result_id, answer.question_id), answer);
        Ok(true)
    }

    async fn answers_for_result(&self, result_id: Uuid) -> Result<Vec<UserAnswer>> {
        let state = self.state()?;
        let mut answers: Vec<UserAnswer> = state
            .answers
            .values()
            .filter(|a| a.result_id == result_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.question_id);
        Ok(answers)
    }

    async fn enqueue_event(&self, event_type: &str, payload: JsonValue, target_url: &str) -> Result<WebhookLog> {
        let mut state = self.state()?;
        let now = Utc::now();
        let log = WebhookLog {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            payload,
            target_url: target_url.to_string(),
            http_status: None,
            response_body: None,
            attempts: 0,
            max_attempts: 3,
            next_retry_at: None,
            status: "pending".to_string(),
            created_at: now,
            updated_at: now,
        };
        state.events.push(log.clone());
        Ok(log)
    }

    async fn claim_pending_event(
        &self,
        now: DateTime<Utc>,
        lease_expired_before: DateTime<Utc>,
    ) -> Result<Option<WebhookLog>> {
        let mut state = self.state()?;
        let next = state.events.iter_mut().find(|e| match e.status.as_str() {
            "pending" => e.next_retry_at.map(|at| at <= now).unwrap_or(true),
            "delivering" => e.updated_at < lease_expired_before,
            _ => false,
        });
        Ok(next.map(|event| {
            event.status = "delivering".to_string();
            event.updated_at = now;
            event.clone()
        }))
    }

    async fn record_delivery(&self, id: Uuid, outcome: DeliveryOutcome) -> Result<WebhookLog> {
        let mut state = self.state()?;
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::NotFound(format!("Event {} not found", id)))?;
        event.attempts += 1;
        event.updated_at = Utc::now();
        match outcome {
            DeliveryOutcome::Delivered { http_status, body } => {
                event.status = "success".to_string();
                event.http_status = Some(http_status);
                event.response_body = Some(body);
                event.next_retry_at = None;
            }
            DeliveryOutcome::Failed { http_status, body, retry_at } => {
                event.http_status = http_status;
                event.response_body = Some(body);
                event.status = if retry_at.is_some() { "pending" } else { "failed" }.to_string();
                event.next_retry_at = retry_at;
            }
        }
        Ok(event.clone())
    }
}
