use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::database::ScreeningStore;
use crate::error::{Error, Result};
use crate::models::candidate::{Candidate, NewPosition, Position};
use crate::models::question::{NewQuestion, Question};
use crate::models::test_definition::{NewTestDefinition, TestDefinition, TestFilter, TestMode, TestPatch};

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub test: TestDefinition,
    pub question_count: usize,
    pub attempts_used: i64,
    pub trial_available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestDetail {
    pub test: TestDefinition,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    pub position_id: Option<Uuid>,
    pub channel: Option<TestMode>,
    pub candidate: Option<Candidate>,
}

/// Test authoring and the public catalog.
#[derive(Clone)]
pub struct TestService {
    store: Arc<dyn ScreeningStore>,
}

impl TestService {
    pub fn new(store: Arc<dyn ScreeningStore>) -> Self {
        Self { store }
    }

    fn check_settings(
        time_limit_minutes: i32,
        passing_score_percent: i32,
        max_attempts: i32,
        max_trial_attempts: i32,
        random_question_count: i32,
    ) -> Result<()> {
        if time_limit_minutes <= 0 {
            return Err(Error::BadRequest("time_limit_minutes must be positive".into()));
        }
        if !(0..=100).contains(&passing_score_percent) {
            return Err(Error::BadRequest("passing_score_percent must be between 0 and 100".into()));
        }
        if max_attempts < 1 {
            return Err(Error::BadRequest("max_attempts must be at least 1".into()));
        }
        if max_trial_attempts < 0 || random_question_count < 0 {
            return Err(Error::BadRequest("counts cannot be negative".into()));
        }
        Ok(())
    }

    pub async fn create_test(&self, new: NewTestDefinition) -> Result<TestDefinition> {
        if new.title.trim().is_empty() {
            return Err(Error::BadRequest("Title is required".into()));
        }
        Self::check_settings(
            new.time_limit_minutes,
            new.passing_score_percent,
            new.max_attempts,
            new.max_trial_attempts,
            new.random_question_count,
        )?;
        let test = self.store.insert_test(new).await?;
        tracing::info!(test_id = %test.id, title = %test.title, "Test created");
        Ok(test)
    }

    pub async fn update_test(&self, id: Uuid, patch: TestPatch) -> Result<TestDefinition> {
        let mut preview = self.get_test(id).await?;
        patch.apply(&mut preview);
        Self::check_settings(
            preview.time_limit_minutes,
            preview.passing_score_percent,
            preview.max_attempts,
            preview.max_trial_attempts,
            preview.random_question_count,
        )?;
        let test = self.store.update_test(id, patch).await?;
        tracing::info!(test_id = %id, "Test updated");
        Ok(test)
    }

    pub async fn get_test(&self, id: Uuid) -> Result<TestDefinition> {
        self.store
            .find_test(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", id)))
    }

    pub async fn test_detail(&self, id: Uuid) -> Result<TestDetail> {
        let test = self.get_test(id).await?;
        let questions = self.store.questions_for_test(id).await?;
        Ok(TestDetail { test, questions })
    }

    pub async fn add_question(&self, test_id: Uuid, new: NewQuestion) -> Result<Question> {
        new.check_well_formed()?;
        self.get_test(test_id).await?;
        self.store.insert_question(test_id, new).await
    }

    pub async fn create_position(&self, new: NewPosition) -> Result<Position> {
        self.store.insert_position(new).await
    }

    pub async fn open_positions(&self) -> Result<Vec<Position>> {
        self.store.list_open_positions().await
    }

    /// Active tests offered on the channel, minus those whose regular
    /// attempts the candidate has used up.
    pub async fn catalog(&self, query: CatalogQuery) -> Result<Vec<CatalogEntry>> {
        let tests = self
            .store
            .list_tests(TestFilter {
                active_only: true,
                position_id: query.position_id,
            })
            .await?;

        let mut entries = Vec::new();
        for test in tests {
            if let Some(channel) = query.channel {
                if !test.mode().offered_on(channel) {
                    continue;
                }
            }
            let question_count = self.store.questions_for_test(test.id).await?.len();
            if question_count == 0 {
                continue;
            }

            let (attempts_used, trial_used) = match &query.candidate {
                Some(candidate) => {
                    let counts = self.store.result_counts(candidate.id, test.id).await?;
                    (counts.completed_regular, counts.completed_trial)
                }
                None => (0, 0),
            };
            if attempts_used >= i64::from(test.max_attempts) {
                continue;
            }

            entries.push(CatalogEntry {
                trial_available: trial_used < i64::from(test.max_trial_attempts),
                attempts_used,
                question_count,
                test,
            });
        }
        Ok(entries)
    }
}
