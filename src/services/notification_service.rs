use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::database::ScreeningStore;
use crate::error::Result;
use crate::models::candidate::Candidate;
use crate::models::webhook_log::{DeliveryOutcome, WebhookLog};
use crate::services::attempt_service::{AttemptCompleted, AttemptObserver};
use crate::utils::time::Clock;

const BASE_RETRY_SECONDS: i64 = 30;
const MAX_RETRY_SECONDS: i64 = 3600;
/// A claimed event not recorded within this long is delivered again.
const DELIVERY_LEASE_SECONDS: i64 = 300;
const DELIVERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastKind {
    Interview,
    JobOffer,
    Encouragement,
    General,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastSummary {
    pub queued: usize,
}

/// Retry delay after the `attempt`-th failed delivery (1-based).
pub fn retry_delay(attempt: i32) -> Duration {
    let exp = (attempt.max(1) - 1).min(16) as u32;
    Duration::seconds((BASE_RETRY_SECONDS * 2i64.pow(exp)).min(MAX_RETRY_SECONDS))
}

/// Writes bot-facing events to the outbox and delivers them.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn ScreeningStore>,
    client: Client,
    clock: Arc<dyn Clock>,
    target_url: String,
    webhook_secret: String,
}

impl NotificationService {
    pub fn new(store: Arc<dyn ScreeningStore>, clock: Arc<dyn Clock>, target_url: String, webhook_secret: String) -> Self {
        Self {
            store,
            client: Client::new(),
            clock,
            target_url,
            webhook_secret,
        }
    }

    pub async fn enqueue_webhook(&self, event_type: &str, payload: &JsonValue) -> Result<WebhookLog> {
        let log = self
            .store
            .enqueue_event(event_type, payload.clone(), &self.target_url)
            .await?;
        tracing::debug!(event_id = %log.id, event_type, "Event queued");
        Ok(log)
    }

    /// Queues one message per notifiable candidate. `candidate_ids` of
    /// `None` targets everyone.
    pub async fn broadcast(
        &self,
        kind: BroadcastKind,
        title: &str,
        message: &str,
        candidate_ids: Option<Vec<Uuid>>,
    ) -> Result<BroadcastSummary> {
        let recipients = self.store.notifiable_candidates(candidate_ids).await?;
        for candidate in &recipients {
            let payload = json!({
                "event": "broadcast",
                "kind": kind,
                "title": title,
                "message": message,
                "candidate_id": candidate.id,
                "telegram_id": candidate.telegram_id,
                "candidate_name": candidate.display_name(),
            });
            self.enqueue_webhook("broadcast", &payload).await?;
        }
        tracing::info!(kind = ?kind, recipients = recipients.len(), "Broadcast queued");
        Ok(BroadcastSummary {
            queued: recipients.len(),
        })
    }

    fn outcome_for(&self, log: &WebhookLog, now: DateTime<Utc>, http_status: Option<i32>, body: String) -> DeliveryOutcome {
        if let Some(status) = http_status.filter(|s| (200..300).contains(s)) {
            return DeliveryOutcome::Delivered { http_status: status, body };
        }
        let attempt = log.attempts + 1;
        let retry_at = (attempt < log.max_attempts).then(|| now + retry_delay(attempt));
        DeliveryOutcome::Failed {
            http_status,
            body,
            retry_at,
        }
    }

    /// Delivers at most one due event. Returns `false` when nothing was due.
    pub async fn run_once(&self) -> Result<bool> {
        let now = self.clock.now();
        let lease_expired_before = now - Duration::seconds(DELIVERY_LEASE_SECONDS);
        let Some(log) = self.store.claim_pending_event(now, lease_expired_before).await? else {
            return Ok(false);
        };

        let res = self
            .client
            .post(&log.target_url)
            .header("X-Webhook-Secret", &self.webhook_secret)
            .json(&log.payload)
            .timeout(DELIVERY_TIMEOUT)
            .send()
            .await;

        let outcome = match res {
            Ok(resp) => {
                let status = resp.status().as_u16() as i32;
                let body = resp.text().await.unwrap_or_default();
                self.outcome_for(&log, now, Some(status), body)
            }
            Err(err) => self.outcome_for(&log, now, None, err.to_string()),
        };

        let updated = self.store.record_delivery(log.id, outcome).await?;
        match updated.status.as_str() {
            "success" => tracing::debug!(event_id = %updated.id, "Event delivered"),
            "pending" => tracing::warn!(
                event_id = %updated.id,
                attempts = updated.attempts,
                http_status = ?updated.http_status,
                "Event delivery failed, will retry"
            ),
            _ => tracing::error!(
                event_id = %updated.id,
                attempts = updated.attempts,
                "Event delivery failed permanently"
            ),
        }
        Ok(true)
    }
}

#[async_trait]
impl AttemptObserver for NotificationService {
    async fn attempt_completed(&self, event: AttemptCompleted) -> Result<()> {
        let payload = json!({
            "event": "test_completed",
            "attempt_id": event.result.id,
            "candidate_id": event.result.candidate_id,
            "telegram_id": event.candidate_telegram_id,
            "candidate_name": event.candidate_name,
            "test_id": event.result.test_id,
            "test_title": event.test_title,
            "is_trial": event.result.is_trial,
            "attempt_number": event.result.attempt_number,
            "score_percent": event.result.score_percent,
            "correct_answers": event.result.correct_answers,
            "total_questions": event.result.total_questions,
            "passing_score_percent": event.passing_score_percent,
            "is_passed": event.is_passed,
            "completion_reason": event.result.completion_reason,
        });
        self.enqueue_webhook("test_completed", &payload).await?;
        Ok(())
    }

    async fn candidate_blocked(&self, candidate: Candidate, reason: String) -> Result<()> {
        let payload = json!({
            "event": "candidate_blocked",
            "candidate_id": candidate.id,
            "telegram_id": candidate.telegram_id,
            "candidate_name": candidate.display_name(),
            "reason": reason,
        });
        self.enqueue_webhook("candidate_blocked", &payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::candidate::{NewCandidate, ProfilePatch};
    use crate::utils::time::ManualClock;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn spawn_bot(fail_first: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/hook",
            post(move |headers: HeaderMap| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if headers.get("X-Webhook-Secret").map(|v| v.as_bytes()) != Some(&b"s3cret"[..]) {
                        return StatusCode::UNAUTHORIZED;
                    }
                    if n < fail_first {
                        StatusCode::SERVICE_UNAVAILABLE
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), hits)
    }

    fn service(store: Arc<MemoryStore>, clock: Arc<ManualClock>, url: String) -> NotificationService {
        NotificationService::new(store, clock, url, "s3cret".into())
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(retry_delay(1), Duration::seconds(30));
        assert_eq!(retry_delay(2), Duration::seconds(60));
        assert_eq!(retry_delay(3), Duration::seconds(120));
        assert_eq!(retry_delay(20), Duration::seconds(3600));
    }

    #[tokio::test]
    async fn delivers_with_secret_header() {
        let (url, hits) = spawn_bot(0).await;
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let svc = service(store.clone(), clock, url);

        svc.enqueue_webhook("test_completed", &json!({"score": 80})).await.unwrap();
        assert!(svc.run_once().await.unwrap());
        assert!(!svc.run_once().await.unwrap());

        let events = store.events().unwrap();
        assert_eq!(events[0].status, "success");
        assert_eq!(events[0].http_status, Some(200));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_delivery_backs_off_then_gives_up() {
        let (url, hits) = spawn_bot(10).await;
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let svc = service(store.clone(), clock.clone(), url);
        svc.enqueue_webhook("candidate_blocked", &json!({})).await.unwrap();

        assert!(svc.run_once().await.unwrap());
        let event = store.events().unwrap().remove(0);
        assert_eq!(event.status, "pending");
        assert_eq!(event.attempts, 1);
        assert_eq!(event.http_status, Some(503));

        // not due yet
        assert!(!svc.run_once().await.unwrap());
        clock.advance(Duration::seconds(30));
        assert!(svc.run_once().await.unwrap());
        clock.advance(Duration::seconds(60));
        assert!(svc.run_once().await.unwrap());

        let event = store.events().unwrap().remove(0);
        assert_eq!(event.status, "failed");
        assert_eq!(event.attempts, 3);
        assert!(event.next_retry_at.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn abandoned_delivery_is_claimed_again_after_the_lease() {
        let (url, hits) = spawn_bot(0).await;
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let svc = service(store.clone(), clock.clone(), url);
        svc.enqueue_webhook("test_completed", &json!({"score": 40})).await.unwrap();

        // a worker claims the event and dies before recording the outcome
        let now = clock.now();
        let claimed = store
            .claim_pending_event(now, now - Duration::seconds(DELIVERY_LEASE_SECONDS))
            .await
            .unwrap();
        assert!(claimed.is_some());
        assert_eq!(store.events().unwrap()[0].status, "delivering");

        assert!(!svc.run_once().await.unwrap());
        clock.advance(Duration::seconds(DELIVERY_LEASE_SECONDS + 1));
        assert!(svc.run_once().await.unwrap());

        let event = store.events().unwrap().remove(0);
        assert_eq!(event.status, "success");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broadcast_skips_opted_out_and_chatless_candidates() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let svc = service(store.clone(), clock, "http://127.0.0.1:9/hook".into());

        let a = store
            .insert_candidate(NewCandidate { telegram_id: Some(1), first_name: "A".into(), ..Default::default() })
            .await
            .unwrap();
        let b = store
            .insert_candidate(NewCandidate { telegram_id: Some(2), first_name: "B".into(), ..Default::default() })
            .await
            .unwrap();
        store
            .insert_candidate(NewCandidate { telegram_id: None, first_name: "C".into(), ..Default::default() })
            .await
            .unwrap();
        store
            .update_profile(b.id, ProfilePatch { notification_enabled: Some(false), ..Default::default() })
            .await
            .unwrap();

        let summary = svc
            .broadcast(BroadcastKind::Interview, "Interview", "See you on Monday", None)
            .await
            .unwrap();
        assert_eq!(summary.queued, 1);
        let events = store.events().unwrap();
        assert_eq!(events[0].payload["candidate_id"], json!(a.id));
        assert_eq!(events[0].payload["kind"], json!("interview"));
    }
}
