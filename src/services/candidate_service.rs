use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::database::ScreeningStore;
use crate::error::{Error, Result};
use crate::models::candidate::{BlockInfo, Candidate, NewCandidate, ProfilePatch};
use crate::models::cv::{Cv, NewCv};
use crate::services::attempt_service::AttemptObserver;
use crate::utils::time::Clock;

const ALLOWED_CV_EXTENSIONS: [&str; 8] = ["pdf", "doc", "docx", "rtf", "txt", "jpg", "jpeg", "png"];
const MAX_CV_BYTES: usize = 10 * 1024 * 1024;

/// How a request names its candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateRef {
    Id(Uuid),
    Telegram(i64),
}

/// Turns a request's candidate reference into a stored candidate.
#[async_trait]
pub trait CandidateResolver: Send + Sync {
    /// Fails with NotFound when nobody matches.
    async fn resolve(&self, reference: CandidateRef) -> Result<Candidate>;
}

#[derive(Debug, Clone, Default)]
pub struct TelegramProfile {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageLeaveOutcome {
    pub leave_count: i32,
    pub blocked: bool,
    pub blocked_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CandidatePolicy {
    pub page_leave_block_threshold: i32,
    pub uploads_dir: PathBuf,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self {
            page_leave_block_threshold: 2,
            uploads_dir: PathBuf::from("./uploads"),
        }
    }
}

#[derive(Clone)]
pub struct CandidateService {
    store: Arc<dyn ScreeningStore>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn AttemptObserver>,
    policy: CandidatePolicy,
}

#[async_trait]
impl CandidateResolver for CandidateService {
    async fn resolve(&self, reference: CandidateRef) -> Result<Candidate> {
        let found = match reference {
            CandidateRef::Id(id) => self.store.find_candidate(id).await?,
            CandidateRef::Telegram(telegram_id) => self.store.find_candidate_by_telegram(telegram_id).await?,
        };
        found.ok_or_else(|| match reference {
            CandidateRef::Id(id) => Error::NotFound(format!("Candidate {} not found", id)),
            CandidateRef::Telegram(tg) => Error::NotFound(format!("No candidate with Telegram ID {}", tg)),
        })
    }
}

impl CandidateService {
    pub fn new(
        store: Arc<dyn ScreeningStore>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn AttemptObserver>,
        policy: CandidatePolicy,
    ) -> Self {
        Self {
            store,
            clock,
            observer,
            policy,
        }
    }

    /// Finds the candidate for a Telegram account, creating one on first
    /// contact. The flag is `true` when a candidate was created.
    pub async fn telegram_auth(&self, profile: TelegramProfile) -> Result<(Candidate, bool)> {
        if let Some(existing) = self.store.find_candidate_by_telegram(profile.telegram_id).await? {
            return Ok((existing, false));
        }

        let created = self
            .store
            .insert_candidate(NewCandidate {
                telegram_id: Some(profile.telegram_id),
                first_name: profile.first_name,
                last_name: profile.last_name,
                ..Default::default()
            })
            .await;

        match created {
            Ok(candidate) => {
                tracing::info!(candidate_id = %candidate.id, telegram_id = profile.telegram_id, "Candidate registered");
                Ok((candidate, true))
            }
            // lost a race with a concurrent first contact
            Err(Error::Conflict(_)) => {
                let existing = self.resolve(CandidateRef::Telegram(profile.telegram_id)).await?;
                Ok((existing, false))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<Candidate> {
        if let Some(position_id) = patch.position_id {
            let position = self
                .store
                .find_position(position_id)
                .await?
                .ok_or_else(|| Error::BadRequest(format!("Position {} does not exist", position_id)))?;
            if !position.is_open {
                return Err(Error::BadRequest(format!("Position '{}' is closed", position.name)));
            }
        }
        self.store.update_profile(id, patch).await
    }

    pub async fn block(&self, id: Uuid, reason: String) -> Result<Candidate> {
        let blocked = self
            .store
            .set_block(
                id,
                Some(BlockInfo {
                    reason: reason.clone(),
                    blocked_at: self.clock.now(),
                }),
            )
            .await?;
        tracing::warn!(candidate_id = %id, reason = %reason, "Candidate blocked");
        if let Err(e) = self.observer.candidate_blocked(blocked.clone(), reason).await {
            tracing::error!("Failed to notify about blocked candidate {}: {:?}", id, e);
        }
        Ok(blocked)
    }

    pub async fn unblock(&self, id: Uuid) -> Result<Candidate> {
        let candidate = self.store.set_block(id, None).await?;
        tracing::info!(candidate_id = %id, "Candidate unblocked");
        Ok(candidate)
    }

    /// Records that the candidate left the test page `leave_count` times
    /// in total. Reaching the threshold blocks the candidate.
    pub async fn report_page_leave(&self, candidate_id: Uuid, test_id: Uuid, leave_count: i32) -> Result<PageLeaveOutcome> {
        let candidate = self.resolve(CandidateRef::Id(candidate_id)).await?;
        if candidate.is_blocked {
            return Ok(PageLeaveOutcome {
                leave_count,
                blocked: true,
                blocked_reason: candidate.blocked_reason,
            });
        }

        let test = self
            .store
            .find_test(test_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))?;

        if leave_count < self.policy.page_leave_block_threshold {
            tracing::warn!(
                candidate_id = %candidate_id,
                test_id = %test_id,
                leave_count,
                "Candidate left the test page"
            );
            return Ok(PageLeaveOutcome {
                leave_count,
                blocked: false,
                blocked_reason: None,
            });
        }

        let reason = format!(
            "Left the test page {} times during test '{}'",
            leave_count, test.title
        );
        let blocked = self.block(candidate_id, reason).await?;
        Ok(PageLeaveOutcome {
            leave_count,
            blocked: true,
            blocked_reason: blocked.blocked_reason,
        })
    }

    pub async fn upload_cv(&self, candidate_id: Uuid, file_name: &str, data: &bytes::Bytes) -> Result<Cv> {
        self.resolve(CandidateRef::Id(candidate_id)).await?;
        let dir = self.policy.uploads_dir.join("cv");
        let path = save_cv_file(&dir, file_name, data).await?;

        let inserted = self
            .store
            .insert_cv(NewCv {
                candidate_id,
                file_name: file_name.to_string(),
                file_size: data.len() as i64,
                file_path: path.to_string_lossy().into_owned(),
            })
            .await;
        let cv = match inserted {
            Ok(cv) => cv,
            Err(e) => {
                if let Err(rm) = fs::remove_file(&path).await {
                    tracing::warn!("Failed to remove orphaned CV file {}: {}", path.display(), rm);
                }
                return Err(e);
            }
        };
        tracing::info!(candidate_id = %candidate_id, cv_id = %cv.id, size = cv.file_size, "CV uploaded");
        Ok(cv)
    }
}

fn cv_extension(file_name: &str) -> Result<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_CV_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::BadRequest(format!("File type .{} is not allowed", ext)));
    }
    Ok(ext)
}

fn check_magic(ext: &str, data: &[u8]) -> Result<()> {
    let ok = match ext {
        "pdf" => data.starts_with(b"%PDF"),
        "jpg" | "jpeg" => data.starts_with(&[0xFF, 0xD8]),
        "png" => data.starts_with(&[0x89, 0x50, 0x4E, 0x47]),
        "docx" => data.starts_with(b"PK\x03\x04"),
        "doc" => data.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]),
        "rtf" => data.starts_with(b"{\\rtf"),
        _ => true,
    };
    if !ok {
        return Err(Error::BadRequest(format!("Invalid .{} file content", ext)));
    }
    Ok(())
}

async fn save_cv_file(dir: &Path, file_name: &str, data: &bytes::Bytes) -> Result<PathBuf> {
    if data.is_empty() {
        return Err(Error::BadRequest("CV file is empty".into()));
    }
    if data.len() > MAX_CV_BYTES {
        return Err(Error::BadRequest(format!(
            "CV file exceeds {} MB",
            MAX_CV_BYTES / (1024 * 1024)
        )));
    }
    let ext = cv_extension(file_name)?;
    check_magic(&ext, data)?;

    fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.{}", Uuid::new_v4(), ext));
    fs::write(&path, data).await.map_err(|e| {
        tracing::error!("Failed to write CV file: {}", e);
        Error::Internal(format!("Failed to save file: {}", e))
    })?;
    Ok(path)
}
