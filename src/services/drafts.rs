// src/services/drafts.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    catalog::Catalog,
    error::AppError,
    merge,
    models::{
        answer::Answer,
        assessment::{CompletedAssessment, SubmitAssessmentRequest},
        draft::{DraftAssessment, ProgressUpdate, ResumeRejection},
        question::QuestionCatalog,
    },
    scoring,
    store::{Completion, DraftQuery, DraftStore, StoreError},
    utils::resume_token,
};

/// Attempts at allocating a draft before giving up with a conflict.
const CREATE_ATTEMPTS: usize = 3;

/// Draft session operations on top of a `DraftStore`.
#[derive(Clone)]
pub struct DraftService {
    store: Arc<dyn DraftStore>,
    catalog: Arc<Catalog>,
    token_ttl: Option<Duration>,
}

impl DraftService {
    pub fn new(store: Arc<dyn DraftStore>, catalog: Arc<Catalog>) -> Self {
        Self {
            store,
            catalog,
            token_ttl: None,
        }
    }

    /// Drafts idle longer than `ttl` can no longer be resumed.
    pub fn with_token_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Starts a new draft with a fresh resume token.
    ///
    /// A user may hold any number of drafts. Storage allocation failures
    /// surface as `Conflict`.
    pub async fn create_draft(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<DraftAssessment, AppError> {
        let catalog = self.catalog.lookup(language);

        let mut last_conflict = String::new();
        for _ in 0..CREATE_ATTEMPTS {
            let draft = DraftAssessment::new(
                Uuid::new_v4(),
                resume_token::generate(),
                user_id.to_string(),
                catalog.language.clone(),
                catalog.total_questions(),
                Utc::now(),
            );

            match self.store.insert_draft(draft).await {
                Ok(draft) => {
                    tracing::info!(draft_id = %draft.id, user_id, "Draft created");
                    return Ok(draft);
                }
                Err(StoreError::Conflict(msg)) => {
                    tracing::warn!("Draft allocation collided, retrying: {}", msg);
                    last_conflict = msg;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict(format!(
            "Could not allocate a draft: {}",
            last_conflict
        )))
    }

    /// Idempotent upsert of a draft's progress.
    ///
    /// The supplied answers are merged into the stored ones, never written
    /// over them, so retried or reordered saves cannot drop answers.
    pub async fn save_progress(&self, id: Uuid, update: ProgressUpdate) -> Result<(), AppError> {
        let draft = self
            .store
            .find_draft(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Draft not found".to_string()))?;

        let catalog = self.catalog.lookup(&draft.language);
        if update.current_question_index >= catalog.total_questions() {
            return Err(AppError::BadRequest(format!(
                "currentQuestionIndex {} is out of range (0..{})",
                update.current_question_index,
                catalog.total_questions()
            )));
        }
        check_answers(catalog, &update.answers)?;

        match self.store.apply_progress(id, &update, Utc::now()).await {
            Ok(Some(saved)) => {
                tracing::debug!(
                    draft_id = %id,
                    answered = saved.answers.len(),
                    index = saved.current_question_index,
                    "Progress saved"
                );
                Ok(())
            }
            Ok(None) => Err(AppError::NotFound("Draft not found".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves a resume token to its draft.
    ///
    /// Unknown tokens, finalized drafts and expired drafts are rejected with
    /// distinct reasons.
    pub async fn resume_by_token(&self, token: &str) -> Result<DraftAssessment, AppError> {
        if !resume_token::is_well_formed(token) {
            return Err(AppError::ResumeRejected {
                reason: ResumeRejection::InvalidLink,
                assessment_id: None,
            });
        }

        let draft = self
            .store
            .find_draft_by_token(token)
            .await?
            .ok_or(AppError::ResumeRejected {
                reason: ResumeRejection::InvalidLink,
                assessment_id: None,
            })?;

        if draft.is_completed() {
            return Err(AppError::ResumeRejected {
                reason: ResumeRejection::AlreadyCompleted,
                assessment_id: Some(draft.id),
            });
        }

        if let Some(ttl) = self.token_ttl {
            if Utc::now() - draft.last_answered_at > ttl {
                return Err(AppError::ResumeRejected {
                    reason: ResumeRejection::Expired,
                    assessment_id: None,
                });
            }
        }

        Ok(draft)
    }

    /// Scores a complete answer set and stores the completed assessment.
    ///
    /// Safe to retry: finalizing a draft that is already completed returns
    /// the stored assessment, and concurrent calls create a single record.
    pub async fn finalize(
        &self,
        request: SubmitAssessmentRequest,
    ) -> Result<CompletedAssessment, AppError> {
        // A draft is scored against the catalog it was started in.
        let language = match request.assessment_id {
            Some(draft_id) => {
                let draft = self
                    .store
                    .find_draft(draft_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Draft not found".to_string()))?;

                if draft.user_id != request.user_id {
                    return Err(AppError::BadRequest(
                        "Draft belongs to another user".to_string(),
                    ));
                }

                if draft.is_completed() {
                    if let Some(existing) = self.store.find_assessment(draft_id).await? {
                        tracing::info!(draft_id = %draft_id, "Duplicate submit, returning stored assessment");
                        return Ok(existing);
                    }
                }
                draft.language
            }
            None => request.language.clone(),
        };

        let catalog = self.catalog.lookup(&language);
        let answers = merge::dedupe(&request.answers);
        check_answers(catalog, &answers)?;

        let total = catalog.total_questions();
        if answers.len() != total {
            return Err(AppError::BadRequest(format!(
                "Answer all questions before submitting ({} of {} answered)",
                answers.len(),
                total
            )));
        }

        let card = scoring::score(catalog, &answers)?;

        let assessment = CompletedAssessment {
            id: request.assessment_id.unwrap_or_else(Uuid::new_v4),
            user_id: request.user_id,
            language: catalog.language.clone(),
            answers,
            pillar_scores: card.pillar_scores,
            overall_score: card.overall_score,
            overall_status: card.overall_status,
            completed_at: Utc::now(),
        };

        let stored = match request.assessment_id {
            Some(draft_id) => match self.store.complete_draft(draft_id, assessment).await? {
                Completion::Created(a) => {
                    tracing::info!(assessment_id = %a.id, score = a.overall_score, "Assessment finalized");
                    a
                }
                Completion::Existing(a) => a,
            },
            None => {
                let a = self.store.insert_assessment(assessment).await?;
                tracing::info!(assessment_id = %a.id, score = a.overall_score, "Assessment submitted without draft");
                a
            }
        };

        Ok(stored)
    }

    pub async fn assessment(&self, id: Uuid) -> Result<CompletedAssessment, AppError> {
        self.store
            .find_assessment(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Assessment not found".to_string()))
    }

    pub async fn user_assessments(
        &self,
        user_id: &str,
    ) -> Result<Vec<CompletedAssessment>, AppError> {
        Ok(self.store.list_user_assessments(user_id).await?)
    }

    pub async fn open_drafts(
        &self,
        query: DraftQuery,
    ) -> Result<(Vec<DraftAssessment>, usize), AppError> {
        Ok(self.store.list_open_drafts(query).await?)
    }

    pub async fn cleanup_superseded_drafts(&self) -> Result<u64, AppError> {
        let deleted = self.store.delete_superseded_drafts().await?;
        tracing::info!(deleted, "Superseded drafts removed");
        Ok(deleted)
    }
}

/// Rejects answers to unknown questions and scores no option declares.
fn check_answers(catalog: &QuestionCatalog, answers: &[Answer]) -> Result<(), AppError> {
    for answer in answers {
        let question = catalog.question(&answer.question_id).ok_or_else(|| {
            AppError::BadRequest(format!("Unknown question '{}'", answer.question_id))
        })?;
        if !question.has_option_score(answer.answer) {
            return Err(AppError::BadRequest(format!(
                "Answer {} is not a valid option for question '{}'",
                answer.answer, answer.question_id
            )));
        }
    }
    Ok(())
}
