//! Study session log used for analytics.

use crate::{
    clock::Clock,
    db::{StoreError, StudySessionRepository},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Validation(String),
}

impl StudyError {
    pub fn client_message(&self) -> String {
        match self {
            StudyError::Store(_) => "Internal server error".to_string(),
            StudyError::Validation(msg) => msg.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub questions_reviewed: i32,
    /// Seconds between start and end
    pub total_duration: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudySession {
    pub started_at: DateTime<Utc>,
    /// Defaults to the time of recording
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions_reviewed: i32,
}

/// Totals over all sessions of one owner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySummary {
    pub sessions: usize,
    pub questions_reviewed: i64,
    pub total_duration: i64,
    pub last_studied_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct StudyManager {
    store: Arc<dyn StudySessionRepository>,
    clock: Arc<dyn Clock>,
}

impl StudyManager {
    pub fn new(store: Arc<dyn StudySessionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn record(&self, owner: &str, new: NewStudySession) -> Result<StudySession, StudyError> {
        let ended_at = new.ended_at.unwrap_or_else(|| self.clock.now());
        if ended_at < new.started_at {
            return Err(StudyError::Validation(
                "endedAt must not be before startedAt".to_string(),
            ));
        }
        if new.questions_reviewed < 0 {
            return Err(StudyError::Validation(
                "questionsReviewed must not be negative".to_string(),
            ));
        }

        let session = StudySession {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.to_string(),
            started_at: new.started_at,
            ended_at,
            questions_reviewed: new.questions_reviewed,
            total_duration: (ended_at - new.started_at).num_seconds(),
        };
        self.store.insert_session(&session).await?;
        Ok(session)
    }

    /// Newest first
    pub async fn list(&self, owner: &str) -> Result<Vec<StudySession>, StudyError> {
        Ok(self.store.list_sessions(owner).await?)
    }

    pub async fn summary(&self, owner: &str) -> Result<StudySummary, StudyError> {
        let sessions = self.store.list_sessions(owner).await?;
        Ok(StudySummary {
            sessions: sessions.len(),
            questions_reviewed: sessions.iter().map(|s| i64::from(s.questions_reviewed)).sum(),
            total_duration: sessions.iter().map(|s| s.total_duration).sum(),
            last_studied_at: sessions.iter().map(|s| s.ended_at).max(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, db::MemoryStore};
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_record_and_summarize() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(now);
        let study = StudyManager::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));

        study
            .record(
                "guest_1",
                NewStudySession {
                    started_at: now - Duration::minutes(10),
                    ended_at: Some(now - Duration::minutes(5)),
                    questions_reviewed: 4,
                },
            )
            .await
            .unwrap();
        clock.advance(Duration::hours(1));
        let latest = study
            .record(
                "guest_1",
                NewStudySession {
                    started_at: now,
                    ended_at: None,
                    questions_reviewed: 6,
                },
            )
            .await
            .unwrap();
        assert_eq!(latest.total_duration, 3600);

        let sessions = study.list("guest_1").await.unwrap();
        assert_eq!(sessions[0].id, latest.id);

        let summary = study.summary("guest_1").await.unwrap();
        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.questions_reviewed, 10);
        assert_eq!(summary.total_duration, 300 + 3600);
        assert_eq!(summary.last_studied_at, Some(now + Duration::hours(1)));

        assert_eq!(study.summary("other").await.unwrap(), StudySummary::default());
    }

    #[tokio::test]
    async fn test_end_before_start_rejected() {
        let now = Utc::now();
        let study = StudyManager::new(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(now)));
        let result = study
            .record(
                "guest_1",
                NewStudySession {
                    started_at: now,
                    ended_at: Some(now - Duration::seconds(1)),
                    questions_reviewed: 0,
                },
            )
            .await;
        assert!(matches!(result, Err(StudyError::Validation(_))));
    }
}
