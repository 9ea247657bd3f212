// src/progression/api.rs

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    assessment::{CompletedAssessment, SubmitAssessmentRequest},
    draft::{DraftResponse, ResumeRejection, SaveProgressRequest},
    question::QuestionCatalog,
};

/// Failures of the assessment API as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("not found: {message}")]
    NotFound {
        message: String,
        reason: Option<ResumeRejection>,
        assessment_id: Option<Uuid>,
    },

    #[error("rejected: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Network trouble or a server-side failure; the same call may be retried.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }

    /// Id of the finished assessment when a resume link points at one.
    pub fn completed_assessment(&self) -> Option<Uuid> {
        match self {
            ApiError::NotFound {
                reason: Some(ResumeRejection::AlreadyCompleted),
                assessment_id,
                ..
            } => *assessment_id,
            _ => None,
        }
    }
}

/// Client side of the assessment service.
#[async_trait]
pub trait AssessmentApi: Send + Sync + 'static {
    async fn questions(&self, language: &str) -> Result<QuestionCatalog, ApiError>;

    async fn create_draft(&self, user_id: &str, language: &str)
    -> Result<DraftResponse, ApiError>;

    async fn save_progress(&self, draft_id: Uuid, request: &SaveProgressRequest)
    -> Result<(), ApiError>;

    async fn resume(&self, token: &str) -> Result<DraftResponse, ApiError>;

    async fn submit(
        &self,
        request: &SubmitAssessmentRequest,
    ) -> Result<CompletedAssessment, ApiError>;

    async fn assessment(&self, id: Uuid) -> Result<CompletedAssessment, ApiError>;
}
