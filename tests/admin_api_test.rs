mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{spawn_app, spawn_app_with, staff_token, test_config};

#[tokio::test]
async fn admin_routes_require_a_staff_token() {
    let app = spawn_app();
    let body = json!({"name": "QA engineer"});

    let (status, err) = app
        .request(Method::POST, "/api/admin/positions", Some(body.clone()), &[])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "missing_authorization");

    let (status, err) = app
        .request(
            Method::POST,
            "/api/admin/positions",
            Some(body.clone()),
            &[("authorization", "Token abc".to_string())],
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "unsupported_scheme");

    let (status, err) = app
        .request(
            Method::POST,
            "/api/admin/positions",
            Some(body.clone()),
            &[("authorization", format!("Bearer {}", staff_token("candidate")))],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "forbidden");

    let (status, position) = app
        .request(
            Method::POST,
            "/api/admin/positions",
            Some(body),
            &[("authorization", format!("Bearer {}", staff_token("hr")))],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(position["is_open"], true);
}

#[tokio::test]
async fn question_authoring_is_validated() {
    let app = spawn_app();
    let (test_id, _) = app.seed_test(json!({}), 0).await;
    let uri = format!("/api/admin/tests/{}/questions", test_id);

    let (status, _) = app
        .admin(
            Method::POST,
            &uri,
            Some(json!({"text": "Pick one", "options": [{"text": "only", "is_correct": true}]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .admin(
            Method::POST,
            &uri,
            Some(json!({
                "text": "Pick one",
                "options": [
                    {"text": "a", "is_correct": true},
                    {"text": "b", "is_correct": true}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("exactly one correct"));

    let (status, _) = app
        .admin(
            Method::POST,
            &uri,
            Some(json!({"text": "Pick one", "options": [{"text": "a"}, {"text": "b"}]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, detail) = app
        .admin(Method::GET, &format!("/api/admin/tests/{}", test_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["questions"].as_array().map(|a| a.len()), Some(0));
}

#[tokio::test]
async fn test_settings_are_validated_and_patched() {
    let app = spawn_app();

    let (status, _) = app
        .admin(
            Method::POST,
            "/api/admin/tests",
            Some(json!({"title": "Bad", "time_limit_minutes": 10, "passing_score_percent": 150})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (test_id, _) = app.seed_test(json!({}), 1).await;
    let uri = format!("/api/admin/tests/{}", test_id);
    let (status, updated) = app
        .admin(
            Method::PATCH,
            &uri,
            Some(json!({"passing_score_percent": 80, "test_mode": "telegram", "is_active": false})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["passing_score_percent"], 80);
    assert_eq!(updated["test_mode"], "telegram");

    let (_, catalog) = app.get("/api/tests").await;
    assert_eq!(catalog.as_array().map(|a| a.len()), Some(0));

    app.register(7001).await;
    let (status, _) = app
        .post(&format!("/api/tests/{}/start", test_id), json!({"telegram_id": 7001}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_filters_by_channel_and_position() {
    let app = spawn_app();
    let (_, position) = app
        .admin(Method::POST, "/api/admin/positions", Some(json!({"name": "Support"})))
        .await;
    let position_id = position["id"].as_str().unwrap().to_string();

    app.seed_test(json!({"title": "Chat only", "test_mode": "telegram"}), 1).await;
    app.seed_test(
        json!({"title": "Support quiz", "test_mode": "webapp", "position_ids": [position_id]}),
        1,
    )
    .await;

    let (_, web) = app.get("/api/tests?mode=webapp").await;
    let titles: Vec<_> = web.as_array().unwrap().iter().map(|t| t["title"].clone()).collect();
    assert_eq!(titles, vec![json!("Support quiz")]);

    let (_, for_position) = app.get(&format!("/api/tests?position_id={}", position_id)).await;
    assert_eq!(for_position.as_array().map(|a| a.len()), Some(1));

    let (_, chat) = app.get("/api/tests?mode=telegram").await;
    assert_eq!(chat[0]["title"], "Chat only");
}

#[tokio::test]
async fn broadcast_queues_one_event_per_notifiable_candidate() {
    let app = spawn_app();
    let first = app.register(7101).await;
    app.register(7102).await;
    let muted = app.register(7103).await;
    app.patch(&format!("/api/candidates/{}", muted), json!({"notification_enabled": false}))
        .await;

    let (status, summary) = app
        .admin(
            Method::POST,
            "/api/admin/notifications",
            Some(json!({"kind": "interview", "title": "Interview", "message": "See you on Monday"})),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(summary["queued"], 2);

    let (_, targeted) = app
        .admin(
            Method::POST,
            "/api/admin/notifications",
            Some(json!({
                "kind": "job_offer",
                "title": "Offer",
                "message": "Welcome aboard",
                "candidate_ids": [first]
            })),
        )
        .await;
    assert_eq!(targeted["queued"], 1);

    let events = app.store.events().unwrap();
    let broadcasts: Vec<_> = events.iter().filter(|e| e.event_type == "broadcast").collect();
    assert_eq!(broadcasts.len(), 3);
    assert!(broadcasts.iter().all(|e| e.status == "pending"));
    assert_eq!(broadcasts[2].payload["kind"], "job_offer");
}

#[tokio::test]
async fn admin_block_is_reported_to_the_bot() {
    let app = spawn_app();
    let candidate_id = app.register(7201).await;

    let (status, blocked) = app
        .admin(
            Method::POST,
            &format!("/api/admin/candidates/{}/block", candidate_id),
            Some(json!({"reason": "Shared answers in a group chat"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blocked["is_blocked"], true);
    assert_eq!(blocked["blocked_reason"], "Shared answers in a group chat");

    let events = app.store.events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["telegram_id"], 7201);
}

#[tokio::test]
async fn public_routes_are_rate_limited() {
    let mut config = test_config();
    config.public_rps = 2;
    let app = spawn_app_with(config);

    assert_eq!(app.get("/api/positions").await.0, StatusCode::OK);
    assert_eq!(app.get("/api/positions").await.0, StatusCode::OK);
    let (status, body) = app.get("/api/positions").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limit_exceeded");

    assert_eq!(app.get("/health").await.0, StatusCode::OK);
}

#[tokio::test]
async fn openapi_document_lists_attempt_routes() {
    let app = spawn_app();
    let (status, doc) = app.get("/api/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"].get("/api/tests/{id}/start").is_some());
    assert!(doc["paths"].get("/api/attempts/{id}/submit").is_some());
    assert!(doc["components"]["schemas"].get("SubmitResultResponse").is_some());
}
