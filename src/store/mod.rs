// src/store/mod.rs

//! Durable storage of drafts and completed assessments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    assessment::CompletedAssessment,
    draft::{DraftAssessment, ProgressUpdate},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryDraftStore;
pub use postgres::PgDraftStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("draft has already been completed")]
    AlreadyCompleted,

    #[error("storage conflict: {0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// Outcome of completing a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// This call performed the transition.
    Created(CompletedAssessment),
    /// The draft was already completed; the stored record is returned.
    Existing(CompletedAssessment),
}

impl Completion {
    pub fn into_assessment(self) -> CompletedAssessment {
        match self {
            Completion::Created(a) | Completion::Existing(a) => a,
        }
    }
}

/// Filter and page for the admin listing of open drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftQuery {
    pub offset: usize,
    pub limit: usize,
    /// Only drafts whose last activity is older than this instant.
    pub idle_before: Option<DateTime<Utc>>,
}

/// Storage abstraction for the draft session store.
///
/// A draft has a single writer (whoever holds its resume token), so each
/// operation only needs to be atomic on one record.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Persists a fresh draft. Fails with `Conflict` if its id or token is taken.
    async fn insert_draft(&self, draft: DraftAssessment) -> Result<DraftAssessment, StoreError>;

    async fn find_draft(&self, id: Uuid) -> Result<Option<DraftAssessment>, StoreError>;

    async fn find_draft_by_token(&self, token: &str)
    -> Result<Option<DraftAssessment>, StoreError>;

    /// Atomically merges `update` into the stored draft.
    ///
    /// Returns `Ok(None)` for an unknown id and `AlreadyCompleted` once the
    /// draft has been finalized.
    async fn apply_progress(
        &self,
        id: Uuid,
        update: &ProgressUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<DraftAssessment>, StoreError>;

    /// Atomically stores `assessment` under the draft id and marks the draft
    /// completed. At most one call per draft creates a record; later calls
    /// get the stored one back.
    async fn complete_draft(
        &self,
        draft_id: Uuid,
        assessment: CompletedAssessment,
    ) -> Result<Completion, StoreError>;

    /// Stores an assessment that was never backed by a draft.
    async fn insert_assessment(
        &self,
        assessment: CompletedAssessment,
    ) -> Result<CompletedAssessment, StoreError>;

    async fn find_assessment(&self, id: Uuid) -> Result<Option<CompletedAssessment>, StoreError>;

    /// Completed assessments of a user, newest first.
    async fn list_user_assessments(
        &self,
        user_id: &str,
    ) -> Result<Vec<CompletedAssessment>, StoreError>;

    /// Open drafts, most recently active first, with the total match count.
    async fn list_open_drafts(
        &self,
        query: DraftQuery,
    ) -> Result<(Vec<DraftAssessment>, usize), StoreError>;

    /// Deletes open drafts of users that already hold a completed assessment.
    async fn delete_superseded_drafts(&self) -> Result<u64, StoreError>;
}
