pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::database::ScreeningStore;
use crate::services::{
    attempt_service::{AttemptPolicy, AttemptService},
    candidate_service::{CandidatePolicy, CandidateService},
    notification_service::NotificationService,
    question_pool::{QuestionPoolSelector, RandomSource, ThreadRandom},
    test_service::TestService,
};
use crate::utils::time::{Clock, SystemClock};

#[derive(Clone)]
pub struct AppState {
    pub attempt_service: AttemptService,
    pub candidate_service: CandidateService,
    pub test_service: TestService,
    pub notification_service: NotificationService,
    pub jwt_secret: String,
    /// Enables `X-Telegram-Init-Data` verification when set.
    pub bot_token: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn ScreeningStore>, config: &Config) -> Self {
        Self::with_parts(store, config, Arc::new(SystemClock), Arc::new(ThreadRandom))
    }

    pub fn with_parts(
        store: Arc<dyn ScreeningStore>,
        config: &Config,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let notification_service = NotificationService::new(
            store.clone(),
            clock.clone(),
            config.telegram_bot_webhook_url.clone(),
            config.webhook_secret.clone(),
        );
        let observer = Arc::new(notification_service.clone());

        let attempt_service = AttemptService::new(
            store.clone(),
            QuestionPoolSelector::new(random),
            clock.clone(),
            observer.clone(),
            AttemptPolicy {
                bot_telegram_id: config.bot_telegram_id,
                submit_grace_seconds: config.submit_grace_seconds,
            },
        );
        let candidate_service = CandidateService::new(
            store.clone(),
            clock,
            observer,
            CandidatePolicy {
                page_leave_block_threshold: config.page_leave_block_threshold,
                uploads_dir: PathBuf::from(&config.uploads_dir),
            },
        );
        let test_service = TestService::new(store);

        Self {
            attempt_service,
            candidate_service,
            test_service,
            notification_service,
            jwt_secret: config.jwt_secret.clone(),
            bot_token: config.telegram_bot_token.clone(),
        }
    }
}
