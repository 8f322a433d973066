#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use screening_backend::{
    config::{Config, LogFormat},
    database::MemoryStore,
    middleware::auth::Claims,
    routes::api_router,
    services::question_pool::SeededRandom,
    utils::time::ManualClock,
    AppState,
};

pub const JWT_SECRET: &str = "test_secret_key";
pub const BOT_TOKEN: &str = "999000:test-bot-token";
pub const BOT_TELEGRAM_ID: i64 = 999000;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub config: Config,
}

pub fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: "postgres://unused".into(),
        jwt_secret: JWT_SECRET.into(),
        webhook_secret: "whsec_test".into(),
        telegram_bot_webhook_url: "http://127.0.0.1:9/webhook".into(),
        telegram_bot_token: Some(BOT_TOKEN.into()),
        bot_telegram_id: Some(BOT_TELEGRAM_ID),
        public_rps: 1000,
        admin_rps: 1000,
        page_leave_block_threshold: 2,
        submit_grace_seconds: 30,
        uploads_dir: std::env::temp_dir()
            .join(format!("screening-test-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned(),
        stale_sweep_cron: None,
        log_format: LogFormat::Pretty,
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

pub fn spawn_app_with(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let state = AppState::with_parts(store.clone(), &config, clock.clone(), Arc::new(SeededRandom::new(7)));
    let router = api_router(state, config.public_rps, config.admin_rps);
    TestApp {
        router,
        store,
        clock,
        config,
    }
}

pub fn staff_token(role: &str) -> String {
    let claims = Claims {
        sub: "staff-1".into(),
        exp: (Utc::now().timestamp() + 3600) as usize,
        role: Some(role.to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<JsonValue>,
        headers: &[(&str, String)],
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 4 * 1024 * 1024).await.expect("body");
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, JsonValue) {
        self.request(Method::GET, uri, None, &[]).await
    }

    pub async fn post(&self, uri: &str, body: JsonValue) -> (StatusCode, JsonValue) {
        self.request(Method::POST, uri, Some(body), &[]).await
    }

    pub async fn patch(&self, uri: &str, body: JsonValue) -> (StatusCode, JsonValue) {
        self.request(Method::PATCH, uri, Some(body), &[]).await
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
        let auth = format!("Bearer {}", staff_token("admin"));
        self.request(method, uri, body, &[("authorization", auth)]).await
    }

    /// Creates a test with `questions` questions whose first option is correct.
    pub async fn seed_test(&self, settings: JsonValue, questions: usize) -> (String, Vec<(i64, i64, i64)>) {
        let mut body = json!({
            "title": "Backend screening",
            "time_limit_minutes": 10,
            "passing_score_percent": 60,
            "shuffle_questions": false,
        });
        if let (Some(base), Some(extra)) = (body.as_object_mut(), settings.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        let (status, test) = self.admin(Method::POST, "/api/admin/tests", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create test: {}", test);
        let test_id = test["id"].as_str().expect("test id").to_string();

        let mut ids = Vec::new();
        for i in 0..questions {
            let (status, q) = self
                .admin(
                    Method::POST,
                    &format!("/api/admin/tests/{}/questions", test_id),
                    Some(json!({
                        "text": format!("Question {}", i + 1),
                        "order": i,
                        "options": [
                            {"text": "right", "is_correct": true},
                            {"text": "wrong"}
                        ]
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "add question: {}", q);
            let options = q["options"].as_array().expect("options");
            let right = options.iter().find(|o| o["is_correct"] == true).expect("right option");
            let wrong = options.iter().find(|o| o["is_correct"] == false).expect("wrong option");
            ids.push((
                q["id"].as_i64().expect("question id"),
                right["id"].as_i64().expect("option id"),
                wrong["id"].as_i64().expect("option id"),
            ));
        }
        (test_id, ids)
    }

    /// Registers a candidate through the Telegram flow and returns its id.
    pub async fn register(&self, telegram_id: i64) -> String {
        let (status, body) = self
            .post(
                "/api/candidates/telegram-auth",
                json!({"telegram_id": telegram_id, "first_name": "Aziz", "last_name": "Karimov"}),
            )
            .await;
        assert!(status.is_success(), "register: {}", body);
        body["candidate"]["id"].as_str().expect("candidate id").to_string()
    }
}
