use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub test_id: Uuid,
    pub text: String,
    pub order: i32,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
    pub order: i32,
}

impl Question {
    pub fn option(&self, option_id: i64) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

/// Canonical ordering: `(order, id)` ascending, for questions and their options.
pub fn sort_canonical(questions: &mut [Question]) {
    questions.sort_by_key(|q| (q.order, q.id));
    for q in questions.iter_mut() {
        q.options.sort_by_key(|o| (o.order, o.id));
    }
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub text: String,
    pub order: i32,
    pub options: Vec<NewAnswerOption>,
}

impl NewQuestion {
    /// Authoring rule: non-empty texts, at least two options and exactly
    /// one marked correct. Stored questions may still violate it.
    pub fn check_well_formed(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::BadRequest("Question text is required".into()));
        }
        if self.options.len() < 2 {
            return Err(Error::BadRequest("A question needs at least two options".into()));
        }
        if self.options.iter().any(|o| o.text.trim().is_empty()) {
            return Err(Error::BadRequest("Option text is required".into()));
        }
        let correct = self.options.iter().filter(|o| o.is_correct).count();
        if correct != 1 {
            return Err(Error::BadRequest(format!(
                "A question needs exactly one correct option, got {}",
                correct
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewAnswerOption {
    pub text: String,
    pub is_correct: bool,
}
