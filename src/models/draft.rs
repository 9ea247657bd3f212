// src/models/draft.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{merge, models::answer::Answer};

/// Lifecycle of a draft record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Draft,
    Completed,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(DraftStatus::Draft),
            "completed" => Some(DraftStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-progress assessment owned by the draft store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAssessment {
    pub id: Uuid,
    pub resume_token: String,
    pub user_id: String,
    pub language: String,

    /// Never holds two answers for the same question.
    pub answers: Vec<Answer>,

    pub current_question_index: usize,
    pub total_questions: usize,

    /// Highest client sequence number applied so far.
    pub last_seq: Option<i64>,

    pub started_at: DateTime<Utc>,
    pub last_answered_at: DateTime<Utc>,
    pub status: DraftStatus,
}

/// One `saveProgress` call after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub answers: Vec<Answer>,
    pub current_question_index: usize,
    pub seq: Option<i64>,
}

impl DraftAssessment {
    pub fn new(
        id: Uuid,
        resume_token: String,
        user_id: String,
        language: String,
        total_questions: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            resume_token,
            user_id,
            language,
            answers: Vec::new(),
            current_question_index: 0,
            total_questions,
            last_seq: None,
            started_at: now,
            last_answered_at: now,
            status: DraftStatus::Draft,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == DraftStatus::Completed
    }

    /// Merges a save into the stored state. Never touches `status`.
    ///
    /// A save carrying a `seq` lower than the highest one already applied is
    /// stale: it can only fill questions that are still unanswered and it does
    /// not move the cursor. Saves without `seq` apply in arrival order.
    pub fn apply_progress(&mut self, update: &ProgressUpdate, now: DateTime<Utc>) {
        let stale = matches!(
            (update.seq, self.last_seq),
            (Some(incoming), Some(applied)) if incoming < applied
        );

        if stale {
            self.answers = merge::merge_missing(&self.answers, &update.answers);
        } else {
            self.answers = merge::merge_all(&self.answers, &update.answers);
            self.current_question_index = update
                .current_question_index
                .min(self.total_questions.saturating_sub(1));
            if update.seq.is_some() {
                self.last_seq = update.seq;
            }
        }
        self.last_answered_at = now;
    }

    /// Share of the questionnaire answered, `0..=100`.
    pub fn progress_percentage(&self) -> u32 {
        if self.total_questions == 0 {
            return 0;
        }
        let answered = self.answers.len().min(self.total_questions);
        ((answered * 100) / self.total_questions) as u32
    }
}

/// Why a resume token cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeRejection {
    /// Unknown or malformed token.
    InvalidLink,
    /// The draft was already finalized.
    AlreadyCompleted,
    /// The draft sat idle longer than the configured token lifetime.
    Expired,
}

impl ResumeRejection {
    pub fn message(&self) -> &'static str {
        match self {
            ResumeRejection::InvalidLink => "Resume link is invalid",
            ResumeRejection::AlreadyCompleted => "This assessment has already been submitted",
            ResumeRejection::Expired => "Resume link has expired",
        }
    }
}

/// DTO for starting a draft.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,

    #[serde(default = "crate::models::assessment::default_language")]
    #[validate(length(min = 2, max = 8))]
    pub language: String,
}

/// DTO for `PUT /drafts/{id}/progress`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressRequest {
    #[validate(nested)]
    pub answers: Vec<Answer>,

    pub current_question_index: usize,

    /// Client-side monotonic counter, bumped on every mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
}

impl From<SaveProgressRequest> for ProgressUpdate {
    fn from(req: SaveProgressRequest) -> Self {
        Self {
            answers: req.answers,
            current_question_index: req.current_question_index,
            seq: req.seq,
        }
    }
}

/// Draft as returned to the client on create and resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftResponse {
    pub id: Uuid,
    pub resume_token: String,
    pub resume_url: String,
    pub user: String,
    pub language: String,
    pub current_question_index: usize,
    pub total_questions: usize,
    pub answers: Vec<Answer>,
    /// Highest save sequence applied so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seq: Option<i64>,
}

impl DraftResponse {
    pub fn new(draft: DraftAssessment, resume_url: String) -> Self {
        Self {
            id: draft.id,
            resume_token: draft.resume_token,
            resume_url,
            user: draft.user_id,
            language: draft.language,
            current_question_index: draft.current_question_index,
            total_questions: draft.total_questions,
            answers: draft.answers,
            last_seq: draft.last_seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> DraftAssessment {
        DraftAssessment::new(
            Uuid::new_v4(),
            "t".repeat(64),
            "user-1".to_string(),
            "en".to_string(),
            4,
            Utc::now(),
        )
    }

    fn update(pairs: &[(&str, i64)], index: usize, seq: Option<i64>) -> ProgressUpdate {
        ProgressUpdate {
            answers: pairs.iter().map(|(q, a)| Answer::new(*q, *a)).collect(),
            current_question_index: index,
            seq,
        }
    }

    #[test]
    fn test_apply_progress_merges_instead_of_overwriting() {
        let mut d = draft();
        d.apply_progress(&update(&[("q1", 2), ("q2", 1)], 1, None), Utc::now());
        d.apply_progress(&update(&[("q3", 3)], 2, None), Utc::now());

        assert_eq!(d.answers.len(), 3);
        assert_eq!(d.current_question_index, 2);
        assert_eq!(d.status, DraftStatus::Draft);
    }

    #[test]
    fn test_stale_save_does_not_override_newer_answer() {
        let mut d = draft();
        d.apply_progress(&update(&[("q1", 1)], 1, Some(2)), Utc::now());
        d.apply_progress(&update(&[("q1", 2), ("q2", 0)], 0, Some(1)), Utc::now());

        assert_eq!(merge::find(&d.answers, "q1").map(|a| a.answer), Some(1));
        assert_eq!(merge::find(&d.answers, "q2").map(|a| a.answer), Some(0));
        assert_eq!(d.current_question_index, 1);
        assert_eq!(d.last_seq, Some(2));
    }

    #[test]
    fn test_unsequenced_saves_apply_in_arrival_order() {
        let mut d = draft();
        d.apply_progress(&update(&[("q1", 2)], 0, None), Utc::now());
        d.apply_progress(&update(&[("q1", 1)], 0, None), Utc::now());
        assert_eq!(merge::find(&d.answers, "q1").map(|a| a.answer), Some(1));
    }

    #[test]
    fn test_cursor_is_clamped_to_last_question() {
        let mut d = draft();
        d.apply_progress(&update(&[], 12, None), Utc::now());
        assert_eq!(d.current_question_index, 3);
    }

    #[test]
    fn test_progress_percentage() {
        let mut d = draft();
        assert_eq!(d.progress_percentage(), 0);
        d.apply_progress(&update(&[("q1", 0), ("q2", 3), ("q3", 1)], 2, None), Utc::now());
        assert_eq!(d.progress_percentage(), 75);
    }
}
