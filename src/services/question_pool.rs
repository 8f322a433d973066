use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::models::question::Question;
use crate::models::test_definition::TestDefinition;
use crate::models::test_result::AttemptMode;

/// Randomness used for question sampling and display shuffles.
pub trait RandomSource: Send + Sync {
    /// `amount` distinct indices from `0..len`, in random order.
    fn sample(&self, len: usize, amount: usize) -> Vec<usize>;
    fn shuffle_indices(&self, len: usize) -> Vec<usize>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn sample(&self, len: usize, amount: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut rand::thread_rng(), len, amount.min(len)).into_vec()
    }

    fn shuffle_indices(&self, len: usize) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..len).collect();
        idx.shuffle(&mut rand::thread_rng());
        idx
    }
}

/// Deterministic source for tests.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn sample(&self, len: usize, amount: usize) -> Vec<usize> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rand::seq::index::sample(&mut *rng, len, amount.min(len)).into_vec()
    }

    fn shuffle_indices(&self, len: usize) -> Vec<usize> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut idx: Vec<usize> = (0..len).collect();
        idx.shuffle(&mut *rng);
        idx
    }
}

/// Chooses which questions an attempt shows and in what order.
///
/// Selection runs once per attempt; the resulting ids are frozen on the
/// attempt row and every later read goes through [`present`](Self::present).
#[derive(Clone)]
pub struct QuestionPoolSelector {
    random: Arc<dyn RandomSource>,
}

impl QuestionPoolSelector {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    /// How many questions an attempt in `mode` shows; `None` means all.
    pub fn target_count(test: &TestDefinition, mode: AttemptMode) -> Option<usize> {
        let configured = match mode {
            AttemptMode::Trial => test.trial_question_count,
            AttemptMode::Regular => test.random_question_count,
        };
        if configured > 0 {
            Some(configured as usize)
        } else {
            None
        }
    }

    /// `questions` must be in canonical order. Returns the chosen
    /// questions in display order.
    pub fn select(&self, test: &TestDefinition, mode: AttemptMode, questions: &[Question]) -> Vec<Question> {
        let mut picked: Vec<usize> = match Self::target_count(test, mode) {
            Some(n) if n < questions.len() => self.random.sample(questions.len(), n),
            _ => (0..questions.len()).collect(),
        };

        if test.shuffle_questions {
            let order = self.random.shuffle_indices(picked.len());
            picked = order.into_iter().map(|i| picked[i]).collect();
        } else {
            picked.sort_unstable();
        }

        picked.into_iter().map(|i| questions[i].clone()).collect()
    }

    /// Rebuilds an attempt's questions from its frozen ids. Ids whose
    /// question has since been deleted are dropped. Options are shuffled
    /// on every call when the test asks for it.
    pub fn present(&self, test: &TestDefinition, frozen_ids: &[i64], questions: &[Question]) -> Vec<Question> {
        let by_id: HashMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();
        frozen_ids
            .iter()
            .filter_map(|id| by_id.get(id).map(|q| (*q).clone()))
            .map(|mut q| {
                if test.shuffle_options {
                    let order = self.random.shuffle_indices(q.options.len());
                    let options = std::mem::take(&mut q.options);
                    let mut slots: Vec<Option<_>> = options.into_iter().map(Some).collect();
                    q.options = order.into_iter().filter_map(|i| slots[i].take()).collect();
                }
                q
            })
            .collect()
    }
}
