use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::candidate::Candidate;
use crate::models::test_definition::TestDefinition;
use crate::models::test_result::{AttemptMode, ResultCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    Blocked,
    AttemptsExhausted,
    CvLocked,
    SelfSubmission,
}

impl EligibilityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EligibilityReason::Blocked => "blocked",
            EligibilityReason::AttemptsExhausted => "attempts_exhausted",
            EligibilityReason::CvLocked => "cv_locked",
            EligibilityReason::SelfSubmission => "self_submission",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EligibilityDecision {
    pub allowed: bool,
    pub reason: Option<EligibilityReason>,
    pub message: String,
    pub attempts_used: i64,
    pub attempts_allowed: i32,
    pub blocked_reason: Option<String>,
}

impl EligibilityDecision {
    pub fn reason_code(&self) -> &'static str {
        self.reason.map(|r| r.as_str()).unwrap_or("allowed")
    }
}

/// Everything the gate looks at, gathered by the caller.
pub struct EligibilityContext<'a> {
    pub candidate: &'a Candidate,
    pub test: &'a TestDefinition,
    pub mode: AttemptMode,
    pub counts: ResultCounts,
    pub has_cv: bool,
    pub bot_telegram_id: Option<i64>,
}

/// Runs the start-of-attempt checks in order: block, attempt count,
/// CV lock, self-submission. The first failing check decides.
pub fn evaluate(ctx: &EligibilityContext<'_>) -> EligibilityDecision {
    let attempts_used = ctx.counts.completed_in(ctx.mode);
    let attempts_allowed = match ctx.mode {
        AttemptMode::Regular => ctx.test.max_attempts,
        AttemptMode::Trial => ctx.test.max_trial_attempts,
    };
    let deny = |reason: EligibilityReason, message: String| EligibilityDecision {
        allowed: false,
        reason: Some(reason),
        message,
        attempts_used,
        attempts_allowed,
        blocked_reason: ctx.candidate.blocked_reason.clone(),
    };

    if ctx.candidate.is_blocked {
        return deny(
            EligibilityReason::Blocked,
            "You have been blocked from taking tests".to_string(),
        );
    }

    if attempts_used >= i64::from(attempts_allowed) {
        let kind = if ctx.mode.is_trial() { "trial attempts" } else { "attempts" };
        return deny(
            EligibilityReason::AttemptsExhausted,
            format!("You have used all {} {} for this test", attempts_allowed, kind),
        );
    }

    let passed_before = ctx
        .counts
        .best_completed_score
        .map(|best| ctx.test.is_passing(best))
        .unwrap_or(false);
    if passed_before && ctx.has_cv {
        return deny(
            EligibilityReason::CvLocked,
            "You already passed this test and submitted a CV".to_string(),
        );
    }

    if let (Some(bot_id), Some(telegram_id)) = (ctx.bot_telegram_id, ctx.candidate.telegram_id) {
        if bot_id == telegram_id {
            return deny(
                EligibilityReason::SelfSubmission,
                "The bot account cannot take tests".to_string(),
            );
        }
    }

    EligibilityDecision {
        allowed: true,
        reason: None,
        message: "Eligible".to_string(),
        attempts_used,
        attempts_allowed,
        blocked_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn candidate() -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            telegram_id: Some(555),
            first_name: "Dana".into(),
            last_name: "K".into(),
            phone: None,
            email: None,
            position_id: None,
            is_blocked: false,
            blocked_reason: None,
            blocked_at: None,
            trial_tests_taken: vec![],
            notification_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_def() -> TestDefinition {
        TestDefinition {
            id: Uuid::new_v4(),
            title: "SQL".into(),
            description: None,
            time_limit_minutes: 20,
            passing_score_percent: 60,
            max_attempts: 2,
            max_trial_attempts: 1,
            trial_question_count: 3,
            random_question_count: 0,
            show_answers_immediately: false,
            shuffle_questions: true,
            shuffle_options: false,
            test_mode: "both".into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ctx<'a>(candidate: &'a Candidate, test: &'a TestDefinition) -> EligibilityContext<'a> {
        EligibilityContext {
            candidate,
            test,
            mode: AttemptMode::Regular,
            counts: ResultCounts::default(),
            has_cv: false,
            bot_telegram_id: Some(999),
        }
    }

    #[test]
    fn fresh_candidate_is_allowed() {
        let (c, t) = (candidate(), test_def());
        let decision = evaluate(&ctx(&c, &t));
        assert!(decision.allowed);
        assert_eq!(decision.attempts_used, 0);
        assert_eq!(decision.attempts_allowed, 2);
    }

    #[test]
    fn block_wins_over_everything() {
        let mut c = candidate();
        c.is_blocked = true;
        c.blocked_reason = Some("left the page".into());
        c.telegram_id = Some(999);
        let t = test_def();
        let mut cx = ctx(&c, &t);
        cx.counts.completed_regular = 5;
        let decision = evaluate(&cx);
        assert_eq!(decision.reason, Some(EligibilityReason::Blocked));
        assert_eq!(decision.blocked_reason.as_deref(), Some("left the page"));
    }

    #[test]
    fn counts_are_per_mode() {
        let (c, t) = (candidate(), test_def());
        let mut cx = ctx(&c, &t);
        cx.counts.completed_trial = 1;
        assert!(evaluate(&cx).allowed);

        cx.mode = AttemptMode::Trial;
        let decision = evaluate(&cx);
        assert_eq!(decision.reason, Some(EligibilityReason::AttemptsExhausted));
        assert_eq!(decision.attempts_used, 1);
        assert_eq!(decision.attempts_allowed, 1);
    }

    #[test]
    fn cv_lock_needs_pass_and_cv() {
        let (c, t) = (candidate(), test_def());
        let mut cx = ctx(&c, &t);
        cx.counts.completed_regular = 1;
        cx.counts.best_completed_score = Some(80);
        assert!(evaluate(&cx).allowed);

        cx.has_cv = true;
        assert_eq!(evaluate(&cx).reason, Some(EligibilityReason::CvLocked));

        cx.counts.best_completed_score = Some(40);
        assert!(evaluate(&cx).allowed);
    }

    #[test]
    fn bot_account_is_rejected() {
        let mut c = candidate();
        c.telegram_id = Some(999);
        let t = test_def();
        assert_eq!(evaluate(&ctx(&c, &t)).reason, Some(EligibilityReason::SelfSubmission));
    }
}
