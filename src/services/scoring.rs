use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::question::Question;

/// One submitted `(question, option)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AnswerEntry {
    pub question_id: i64,
    pub option_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The question does not belong to the test.
    UnknownQuestion,
    /// The question belongs to the test but was not selected for this attempt.
    QuestionNotInAttempt,
    /// The option does not belong to the question.
    UnknownOption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AppliedAnswer {
    pub question_id: i64,
    pub option_id: i64,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SkippedAnswer {
    pub question_id: i64,
    pub option_id: i64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AggregateOutcome {
    pub applied: Vec<AppliedAnswer>,
    pub skipped: Vec<SkippedAnswer>,
}

/// Deduplicates `entries` by question (last one wins, keeping the
/// position of the first occurrence) and checks each survivor against
/// the attempt's frozen pool. Bad entries are reported, never fatal.
///
/// `questions` is every question of the test; `frozen_ids` the subset
/// this attempt shows.
pub fn aggregate(questions: &[Question], frozen_ids: &[i64], entries: &[AnswerEntry]) -> AggregateOutcome {
    let mut order: Vec<i64> = Vec::new();
    let mut latest: HashMap<i64, i64> = HashMap::new();
    for entry in entries {
        if latest.insert(entry.question_id, entry.option_id).is_none() {
            order.push(entry.question_id);
        }
    }

    let by_id: HashMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();
    let mut outcome = AggregateOutcome::default();

    for question_id in order {
        let option_id = latest[&question_id];
        let skip = |reason| SkippedAnswer {
            question_id,
            option_id,
            reason,
        };
        let Some(question) = by_id.get(&question_id) else {
            outcome.skipped.push(skip(SkipReason::UnknownQuestion));
            continue;
        };
        if !frozen_ids.contains(&question_id) {
            outcome.skipped.push(skip(SkipReason::QuestionNotInAttempt));
            continue;
        }
        match question.option(option_id) {
            Some(option) => outcome.applied.push(AppliedAnswer {
                question_id,
                option_id,
                is_correct: option.is_correct,
            }),
            None => outcome.skipped.push(skip(SkipReason::UnknownOption)),
        }
    }
    outcome
}

/// `floor(correct / total * 100)` in integer arithmetic; 0 when `total` is 0.
pub fn score_percent(correct: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    let correct = i64::from(correct.clamp(0, total));
    (correct * 100 / i64::from(total)) as i32
}

/// Correct stored answers that fall inside the frozen pool.
pub fn tally<I>(answers: I, frozen_ids: &[i64]) -> i32
where
    I: IntoIterator<Item = (i64, bool)>,
{
    answers
        .into_iter()
        .filter(|(question_id, is_correct)| *is_correct && frozen_ids.contains(question_id))
        .count() as i32
}
