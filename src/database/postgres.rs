use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::store::ScreeningStore;
use crate::error::{Error, Result};
use crate::models::candidate::{BlockInfo, Candidate, NewCandidate, NewPosition, Position, ProfilePatch};
use crate::models::cv::{Cv, NewCv};
use crate::models::question::{AnswerOption, NewQuestion, Question};
use crate::models::test_definition::{NewTestDefinition, TestDefinition, TestFilter, TestPatch};
use crate::models::test_result::{Completion, NewTestResult, ResultCounts, TestResult};
use crate::models::user_answer::UserAnswer;
use crate::models::webhook_log::{DeliveryOutcome, WebhookLog};

const TEST_COLUMNS: &str = "id, title, description, time_limit_minutes, passing_score_percent, \
    max_attempts, max_trial_attempts, trial_question_count, random_question_count, \
    show_answers_immediately, shuffle_questions, shuffle_options, test_mode, is_active, \
    created_at, updated_at";

const CANDIDATE_COLUMNS: &str = "id, telegram_id, first_name, last_name, phone, email, position_id, \
    is_blocked, blocked_reason, blocked_at, trial_tests_taken, notification_enabled, created_at, updated_at";

const RESULT_COLUMNS: &str = "id, candidate_id, test_id, attempt_number, is_trial, question_ids, \
    total_questions, correct_answers, score_percent, time_taken_seconds, started_at, completed_at, \
    is_completed, completion_reason";

const WEBHOOK_COLUMNS: &str = "id, event_type, payload, target_url, http_status, response_body, \
    attempts, max_attempts, next_retry_at, status, created_at, updated_at";

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    test_id: Uuid,
    text: String,
    display_order: i32,
}

#[derive(FromRow)]
struct OptionRow {
    id: i64,
    question_id: i64,
    text: String,
    is_correct: bool,
    display_order: i32,
}

impl From<OptionRow> for AnswerOption {
    fn from(row: OptionRow) -> Self {
        AnswerOption {
            id: row.id,
            question_id: row.question_id,
            text: row.text,
            is_correct: row.is_correct,
            order: row.display_order,
        }
    }
}

#[derive(FromRow)]
struct CountsRow {
    total: i64,
    completed_regular: i64,
    completed_trial: i64,
    best_completed_score: Option<i32>,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScreeningStore for PgStore {
    async fn insert_test(&self, new: NewTestDefinition) -> Result<TestDefinition> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO tests (id, title, description, time_limit_minutes, passing_score_percent,
                max_attempts, max_trial_attempts, trial_question_count, random_question_count,
                show_answers_immediately, shuffle_questions, shuffle_options, test_mode, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {TEST_COLUMNS}
            "#
        );
        let test = sqlx::query_as::<_, TestDefinition>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.time_limit_minutes)
            .bind(new.passing_score_percent)
            .bind(new.max_attempts)
            .bind(new.max_trial_attempts)
            .bind(new.trial_question_count)
            .bind(new.random_question_count)
            .bind(new.show_answers_immediately)
            .bind(new.shuffle_questions)
            .bind(new.shuffle_options)
            .bind(new.test_mode.as_str())
            .bind(new.is_active)
            .fetch_one(&mut *tx)
            .await?;

        for position_id in &new.position_ids {
            sqlx::query("INSERT INTO test_positions (test_id, position_id) VALUES ($1, $2)")
                .bind(test.id)
                .bind(position_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                        Error::NotFound(format!("Position {} not found", position_id))
                    }
                    other => Error::from(other),
                })?;
        }
        tx.commit().await?;
        Ok(test)
    }

    async fn update_test(&self, id: Uuid, patch: TestPatch) -> Result<TestDefinition> {
        let mut test = self
            .find_test(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", id)))?;
        patch.apply(&mut test);

        let sql = format!(
            r#"
            UPDATE tests SET title = $2, description = $3, time_limit_minutes = $4,
                passing_score_percent = $5, max_attempts = $6, max_trial_attempts = $7,
                trial_question_count = $8, random_question_count = $9,
                show_answers_immediately = $10, shuffle_questions = $11, shuffle_options = $12,
                test_mode = $13, is_active = $14, updated_at = NOW()
            WHERE id = $1
            RETURNING {TEST_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, TestDefinition>(&sql)
            .bind(id)
            .bind(&test.title)
            .bind(&test.description)
            .bind(test.time_limit_minutes)
            .bind(test.passing_score_percent)
            .bind(test.max_attempts)
            .bind(test.max_trial_attempts)
            .bind(test.trial_question_count)
            .bind(test.random_question_count)
            .bind(test.show_answers_immediately)
            .bind(test.shuffle_questions)
            .bind(test.shuffle_options)
            .bind(&test.test_mode)
            .bind(test.is_active)
            .fetch_one(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn find_test(&self, id: Uuid) -> Result<Option<TestDefinition>> {
        let sql = format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = $1");
        let test = sqlx::query_as::<_, TestDefinition>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(test)
    }

    async fn list_tests(&self, filter: TestFilter) -> Result<Vec<TestDefinition>> {
        let sql = format!(
            r#"
            SELECT {TEST_COLUMNS} FROM tests t
            WHERE ($1 = FALSE OR t.is_active)
              AND ($2::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM test_positions tp
                    JOIN positions p ON p.id = tp.position_id
                    WHERE tp.test_id = t.id AND tp.position_id = $2 AND p.is_open))
            ORDER BY t.created_at DESC
            "#
        );
        let tests = sqlx::query_as::<_, TestDefinition>(&sql)
            .bind(filter.active_only)
            .bind(filter.position_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tests)
    }

    async fn insert_question(&self, test_id: Uuid, new: NewQuestion) -> Result<Question> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            INSERT INTO questions (test_id, text, display_order)
            VALUES ($1, $2, $3)
            RETURNING id, test_id, text, display_order
            "#,
        )
        .bind(test_id)
        .bind(&new.text)
        .bind(new.order)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                Error::NotFound(format!("Test {} not found", test_id))
            }
            other => Error::from(other),
        })?;

        let mut options = Vec::with_capacity(new.options.len());
        for (idx, option) in new.options.iter().enumerate() {
            let option_row = sqlx::query_as::<_, OptionRow>(
                r#"
                INSERT INTO answer_options (question_id, text, is_correct, display_order)
                VALUES ($1, $2, $3, $4)
                RETURNING id, question_id, text, is_correct, display_order
                "#,
            )
            .bind(row.id)
            .bind(&option.text)
            .bind(option.is_correct)
            .bind(idx as i32)
            .fetch_one(&mut *tx)
            .await?;
            options.push(AnswerOption::from(option_row));
        }
        tx.commit().await?;

        Ok(Question {
            id: row.id,
            test_id: row.test_id,
            text: row.text,
            order: row.display_order,
            options,
        })
    }

    async fn questions_for_test(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, test_id, text, display_order FROM questions WHERE test_id = $1 ORDER BY display_order, id",
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        let option_rows = sqlx::query_as::<_, OptionRow>(
            r#"
            SELECT o.id, o.question_id, o.text, o.is_correct, o.display_order
            FROM answer_options o
            JOIN questions q ON q.id = o.question_id
            WHERE q.test_id = $1
            ORDER BY o.display_order, o.id
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
        for option in option_rows {
            by_question
                .entry(option.question_id)
                .or_default()
                .push(AnswerOption::from(option));
        }

        Ok(rows
            .into_iter()
            .map(|row| Question {
                options: by_question.remove(&row.id).unwrap_or_default(),
                id: row.id,
                test_id: row.test_id,
                text: row.text,
                order: row.display_order,
            })
            .collect())
    }

    async fn insert_position(&self, new: NewPosition) -> Result<Position> {
        let position = sqlx::query_as::<_, Position>(
            r#"
            INSERT INTO positions (id, name, description, is_open)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, is_open, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.is_open)
        .fetch_one(&self.pool)
        .await?;
        Ok(position)
    }

    async fn find_position(&self, id: Uuid) -> Result<Option<Position>> {
        let position = sqlx::query_as::<_, Position>(
            "SELECT id, name, description, is_open, created_at FROM positions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(position)
    }

    async fn list_open_positions(&self) -> Result<Vec<Position>> {
        let positions = sqlx::query_as::<_, Position>(
            "SELECT id, name, description, is_open, created_at FROM positions WHERE is_open ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }

    async fn insert_candidate(&self, new: NewCandidate) -> Result<Candidate> {
        let sql = format!(
            r#"
            INSERT INTO candidates (id, telegram_id, first_name, last_name, phone, email, position_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CANDIDATE_COLUMNS}
            "#
        );
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.telegram_id)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.phone)
            .bind(&new.email)
            .bind(new.position_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(candidate)
    }

    async fn find_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = $1");
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(candidate)
    }

    async fn find_candidate_by_telegram(&self, telegram_id: i64) -> Result<Option<Candidate>> {
        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE telegram_id = $1");
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(candidate)
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<Candidate> {
        let sql = format!(
            r#"
            UPDATE candidates SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                position_id = COALESCE($6, position_id),
                notification_enabled = COALESCE($7, notification_enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CANDIDATE_COLUMNS}
            "#
        );
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(id)
            .bind(patch.first_name)
            .bind(patch.last_name)
            .bind(patch.phone)
            .bind(patch.email)
            .bind(patch.position_id)
            .bind(patch.notification_enabled)
            .fetch_optional(&self.pool)
            .await?;
        candidate.ok_or_else(|| Error::NotFound(format!("Candidate {} not found", id)))
    }

    async fn set_block(&self, id: Uuid, block: Option<BlockInfo>) -> Result<Candidate> {
        let (blocked, reason, at) = match block {
            Some(info) => (true, Some(info.reason), Some(info.blocked_at)),
            None => (false, None, None),
        };
        let sql = format!(
            r#"
            UPDATE candidates SET is_blocked = $2, blocked_reason = $3, blocked_at = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {CANDIDATE_COLUMNS}
            "#
        );
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(id)
            .bind(blocked)
            .bind(reason)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        candidate.ok_or_else(|| Error::NotFound(format!("Candidate {} not found", id)))
    }

    async fn record_trial_taken(&self, candidate_id: Uuid, test_id: Uuid) -> Result<()> {
        let done = sqlx::query(
            r#"
            UPDATE candidates
            SET trial_tests_taken = CASE
                    WHEN $2 = ANY(trial_tests_taken) THEN trial_tests_taken
                    ELSE array_append(trial_tests_taken, $2)
                END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(candidate_id)
        .bind(test_id)
        .execute(&self.pool)
        .await?;
        if done.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Candidate {} not found", candidate_id)));
        }
        Ok(())
    }

    async fn notifiable_candidates(&self, ids: Option<Vec<Uuid>>) -> Result<Vec<Candidate>> {
        let sql = format!(
            r#"
            SELECT {CANDIDATE_COLUMNS} FROM candidates
            WHERE telegram_id IS NOT NULL AND notification_enabled
              AND ($1::uuid[] IS NULL OR id = ANY($1))
            ORDER BY created_at
            "#
        );
        let candidates = sqlx::query_as::<_, Candidate>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(candidates)
    }

    async fn insert_cv(&self, new: NewCv) -> Result<Cv> {
        let cv = sqlx::query_as::<_, Cv>(
            r#"
            INSERT INTO cvs (id, candidate_id, file_name, file_size, file_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, candidate_id, file_name, file_size, file_path, uploaded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.candidate_id)
        .bind(&new.file_name)
        .bind(new.file_size)
        .bind(&new.file_path)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                Error::NotFound(format!("Candidate {} not found", new.candidate_id))
            }
            other => Error::from(other),
        })?;
        Ok(cv)
    }

    async fn has_cv(&self, candidate_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cvs WHERE candidate_id = $1)")
            .bind(candidate_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn result_counts(&self, candidate_id: Uuid, test_id: Uuid) -> Result<ResultCounts> {
        let row = sqlx::query_as::<_, CountsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE is_completed AND NOT is_trial) AS completed_regular,
                COUNT(*) FILTER (WHERE is_completed AND is_trial) AS completed_trial,
                MAX(score_percent) FILTER (WHERE is_completed) AS best_completed_score
            FROM test_results
            WHERE candidate_id = $1 AND test_id = $2
            "#,
        )
        .bind(candidate_id)
        .bind(test_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(ResultCounts {
            total: row.total,
            completed_regular: row.completed_regular,
            completed_trial: row.completed_trial,
            best_completed_score: row.best_completed_score,
        })
    }

    async fn latest_open_result(&self, candidate_id: Uuid, test_id: Uuid) -> Result<Option<TestResult>> {
        let sql = format!(
            r#"
            SELECT {RESULT_COLUMNS} FROM test_results
            WHERE candidate_id = $1 AND test_id = $2 AND NOT is_completed
            ORDER BY started_at DESC
            LIMIT 1
            "#
        );
        let result = sqlx::query_as::<_, TestResult>(&sql)
            .bind(candidate_id)
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(result)
    }

    async fn insert_result(&self, new: NewTestResult) -> Result<TestResult> {
        let sql = format!(
            r#"
            INSERT INTO test_results (id, candidate_id, test_id, attempt_number, is_trial,
                question_ids, total_questions, started_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RESULT_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, TestResult>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.candidate_id)
            .bind(new.test_id)
            .bind(new.attempt_number)
            .bind(new.is_trial)
            .bind(&new.question_ids)
            .bind(new.question_ids.len() as i32)
            .bind(new.started_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(result)
    }

    async fn find_result(&self, id: Uuid) -> Result<Option<TestResult>> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM test_results WHERE id = $1");
        let result = sqlx::query_as::<_, TestResult>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(result)
    }

    async fn completed_results_for_candidate(&self, candidate_id: Uuid) -> Result<Vec<TestResult>> {
        let sql = format!(
            r#"
            SELECT {RESULT_COLUMNS} FROM test_results
            WHERE candidate_id = $1 AND is_completed
            ORDER BY completed_at DESC
            "#
        );
        let results = sqlx::query_as::<_, TestResult>(&sql)
            .bind(candidate_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(results)
    }

    async fn stale_open_results(&self, cutoff: DateTime<Utc>) -> Result<Vec<TestResult>> {
        let sql = format!(
            r#"
            SELECT {RESULT_COLUMNS} FROM test_results r
            WHERE NOT r.is_completed
              AND r.started_at + (
                    SELECT make_interval(mins => t.time_limit_minutes)
                    FROM tests t WHERE t.id = r.test_id) <= $1
            "#
        );
        let results = sqlx::query_as::<_, TestResult>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(results)
    }

    async fn complete_result(&self, id: Uuid, completion: Completion) -> Result<TestResult> {
        let sql = format!(
            r#"
            UPDATE test_results SET
                is_completed = TRUE,
                completed_at = $2,
                correct_answers = $3,
                score_percent = $4,
                time_taken_seconds = $5,
                completion_reason = $6
            WHERE id = $1 AND NOT is_completed
            RETURNING {RESULT_COLUMNS}
            "#
        );
        let closed = sqlx::query_as::<_, TestResult>(&sql)
            .bind(id)
            .bind(completion.completed_at)
            .bind(completion.correct_answers)
            .bind(completion.score_percent)
            .bind(completion.time_taken_seconds)
            .bind(completion.reason.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match closed {
            Some(result) => Ok(result),
            None => match self.find_result(id).await? {
                Some(_) => Err(Error::InvalidState(format!("Attempt {} is already completed", id))),
                None => Err(Error::NotFound(format!("Attempt {} not found", id))),
            },
        }
    }

    async fn upsert_answer(&self, answer: UserAnswer) -> Result<bool> {
        let written = sqlx::query(
            r#"
            INSERT INTO user_answers (result_id, question_id, selected_option_id, is_correct, answered_at)
            SELECT $1, $2, $3, $4, $5
            WHERE EXISTS (SELECT 1 FROM test_results WHERE id = $1 AND NOT is_completed)
            ON CONFLICT (result_id, question_id) DO UPDATE SET
                selected_option_id = EXCLUDED.selected_option_id,
                is_correct = EXCLUDED.is_correct,
                answered_at = EXCLUDED.answered_at
            "#,
        )
        .bind(answer.result_id)
        .bind(answer.question_id)
        .bind(answer.selected_option_id)
        .bind(answer.is_correct)
        .bind(answer.answered_at)
        .execute(&self.pool)
        .await?;
        Ok(written.rows_affected() > 0)
    }

    async fn answers_for_result(&self, result_id: Uuid) -> Result<Vec<UserAnswer>> {
        let answers = sqlx::query_as::<_, UserAnswer>(
            r#"
            SELECT result_id, question_id, selected_option_id, is_correct, answered_at
            FROM user_answers WHERE result_id = $1
            ORDER BY question_id
            "#,
        )
        .bind(result_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn enqueue_event(&self, event_type: &str, payload: JsonValue, target_url: &str) -> Result<WebhookLog> {
        let sql = format!(
            r#"
            INSERT INTO webhook_logs (id, event_type, payload, target_url)
            VALUES ($1, $2, $3, $4)
            RETURNING {WEBHOOK_COLUMNS}
            "#
        );
        let log = sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(Uuid::new_v4())
            .bind(event_type)
            .bind(payload)
            .bind(target_url)
            .fetch_one(&self.pool)
            .await?;
        Ok(log)
    }

    async fn claim_pending_event(
        &self,
        now: DateTime<Utc>,
        lease_expired_before: DateTime<Utc>,
    ) -> Result<Option<WebhookLog>> {
        let sql = format!(
            r#"
            UPDATE webhook_logs SET status = 'delivering', updated_at = $1
            WHERE id = (
                SELECT id FROM webhook_logs
                WHERE (status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= $1))
                   OR (status = 'delivering' AND updated_at < $2)
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {WEBHOOK_COLUMNS}
            "#
        );
        let log = sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(now)
            .bind(lease_expired_before)
            .fetch_optional(&self.pool)
            .await?;
        Ok(log)
    }

    async fn record_delivery(&self, id: Uuid, outcome: DeliveryOutcome) -> Result<WebhookLog> {
        let (status, http_status, body, retry_at) = match outcome {
            DeliveryOutcome::Delivered { http_status, body } => ("success", Some(http_status), body, None),
            DeliveryOutcome::Failed { http_status, body, retry_at } => {
                let status = if retry_at.is_some() { "pending" } else { "failed" };
                (status, http_status, body, retry_at)
            }
        };
        let sql = format!(
            r#"
            UPDATE webhook_logs SET
                status = $2,
                http_status = $3,
                response_body = $4,
                next_retry_at = $5,
                attempts = attempts + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {WEBHOOK_COLUMNS}
            "#
        );
        let log = sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(id)
            .bind(status)
            .bind(http_status)
            .bind(body)
            .bind(retry_at)
            .fetch_optional(&self.pool)
            .await?;
        log.ok_or_else(|| Error::NotFound(format!("Event {} not found", id)))
    }
}
