// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::{Completion, DraftQuery, DraftStore, StoreError};
use crate::models::{
    answer::Answer,
    assessment::{CompletedAssessment, PillarScore, Zone},
    draft::{DraftAssessment, DraftStatus, ProgressUpdate},
};

const DRAFT_COLUMNS: &str = "id, resume_token, user_id, language, answers, current_question_index, \
     total_questions, last_seq, status, started_at, last_answered_at";

const ASSESSMENT_COLUMNS: &str =
    "id, user_id, language, answers, pillar_scores, overall_score, overall_status, completed_at";

/// Row of the 'draft_assessments' table.
#[derive(Debug, FromRow)]
struct DraftRow {
    id: Uuid,
    resume_token: String,
    user_id: String,
    language: String,
    answers: Json<Vec<Answer>>,
    current_question_index: i32,
    total_questions: i32,
    last_seq: Option<i64>,
    status: String,
    started_at: DateTime<Utc>,
    last_answered_at: DateTime<Utc>,
}

impl TryFrom<DraftRow> for DraftAssessment {
    type Error = StoreError;

    fn try_from(row: DraftRow) -> Result<Self, Self::Error> {
        let status = DraftStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Unavailable(format!("unknown draft status '{}'", row.status))
        })?;
        Ok(DraftAssessment {
            id: row.id,
            resume_token: row.resume_token,
            user_id: row.user_id,
            language: row.language,
            answers: row.answers.0,
            current_question_index: row.current_question_index.max(0) as usize,
            total_questions: row.total_questions.max(0) as usize,
            last_seq: row.last_seq,
            started_at: row.started_at,
            last_answered_at: row.last_answered_at,
            status,
        })
    }
}

/// Row of the 'completed_assessments' table.
#[derive(Debug, FromRow)]
struct AssessmentRow {
    id: Uuid,
    user_id: String,
    language: String,
    answers: Json<Vec<Answer>>,
    pillar_scores: Json<Vec<PillarScore>>,
    overall_score: i64,
    overall_status: String,
    completed_at: DateTime<Utc>,
}

impl TryFrom<AssessmentRow> for CompletedAssessment {
    type Error = StoreError;

    fn try_from(row: AssessmentRow) -> Result<Self, Self::Error> {
        let overall_status = Zone::parse(&row.overall_status).ok_or_else(|| {
            StoreError::Unavailable(format!("unknown zone '{}'", row.overall_status))
        })?;
        Ok(CompletedAssessment {
            id: row.id,
            user_id: row.user_id,
            language: row.language,
            answers: row.answers.0,
            pillar_scores: row.pillar_scores.0,
            overall_score: row.overall_score,
            overall_status,
            completed_at: row.completed_at,
        })
    }
}

/// PostgreSQL-backed draft store.
#[derive(Debug, Clone)]
pub struct PgDraftStore {
    pool: PgPool,
}

impl PgDraftStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_assessment_row<'e, E>(
    executor: E,
    assessment: &CompletedAssessment,
) -> Result<CompletedAssessment, StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let row = sqlx::query_as::<_, AssessmentRow>(&format!(
        r#"
        INSERT INTO completed_assessments
        (id, user_id, language, answers, pillar_scores, overall_score, overall_status, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        ASSESSMENT_COLUMNS
    ))
    .bind(assessment.id)
    .bind(&assessment.user_id)
    .bind(&assessment.language)
    .bind(Json(&assessment.answers))
    .bind(Json(&assessment.pillar_scores))
    .bind(assessment.overall_score)
    .bind(assessment.overall_status.as_str())
    .bind(assessment.completed_at)
    .fetch_one(executor)
    .await?;

    row.try_into()
}

#[async_trait]
impl DraftStore for PgDraftStore {
    async fn insert_draft(&self, draft: DraftAssessment) -> Result<DraftAssessment, StoreError> {
        let row = sqlx::query_as::<_, DraftRow>(&format!(
            r#"
            INSERT INTO draft_assessments
            (id, resume_token, user_id, language, answers, current_question_index,
             total_questions, last_seq, status, started_at, last_answered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            DRAFT_COLUMNS
        ))
        .bind(draft.id)
        .bind(&draft.resume_token)
        .bind(&draft.user_id)
        .bind(&draft.language)
        .bind(Json(&draft.answers))
        .bind(draft.current_question_index as i32)
        .bind(draft.total_questions as i32)
        .bind(draft.last_seq)
        .bind(draft.status.as_str())
        .bind(draft.started_at)
        .bind(draft.last_answered_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert draft: {:?}", e);
            StoreError::from(e)
        })?;

        row.try_into()
    }

    async fn find_draft(&self, id: Uuid) -> Result<Option<DraftAssessment>, StoreError> {
        sqlx::query_as::<_, DraftRow>(&format!(
            "SELECT {} FROM draft_assessments WHERE id = $1",
            DRAFT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(DraftAssessment::try_from)
        .transpose()
    }

    async fn find_draft_by_token(
        &self,
        token: &str,
    ) -> Result<Option<DraftAssessment>, StoreError> {
        sqlx::query_as::<_, DraftRow>(&format!(
            "SELECT {} FROM draft_assessments WHERE resume_token = $1",
            DRAFT_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .map(DraftAssessment::try_from)
        .transpose()
    }

    async fn apply_progress(
        &self,
        id: Uuid,
        update: &ProgressUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<DraftAssessment>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so racing saves merge one after the other.
        let row = sqlx::query_as::<_, DraftRow>(&format!(
            "SELECT {} FROM draft_assessments WHERE id = $1 FOR UPDATE",
            DRAFT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut draft = DraftAssessment::try_from(row)?;
        if draft.is_completed() {
            return Err(StoreError::AlreadyCompleted);
        }

        draft.apply_progress(update, at);

        sqlx::query(
            r#"
            UPDATE draft_assessments
            SET answers = $2, current_question_index = $3, last_seq = $4, last_answered_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Json(&draft.answers))
        .bind(draft.current_question_index as i32)
        .bind(draft.last_seq)
        .bind(draft.last_answered_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(draft))
    }

    async fn complete_draft(
        &self,
        draft_id: Uuid,
        mut assessment: CompletedAssessment,
    ) -> Result<Completion, StoreError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM draft_assessments WHERE id = $1 FOR UPDATE")
                .bind(draft_id)
                .fetch_optional(&mut *tx)
                .await?;

        let status = status.ok_or(StoreError::NotFound)?;

        if DraftStatus::parse(&status) == Some(DraftStatus::Completed) {
            let existing = sqlx::query_as::<_, AssessmentRow>(&format!(
                "SELECT {} FROM completed_assessments WHERE id = $1",
                ASSESSMENT_COLUMNS
            ))
            .bind(draft_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::Conflict("completed draft has no assessment".to_string()))?;
            tx.commit().await?;
            return Ok(Completion::Existing(existing.try_into()?));
        }

        assessment.id = draft_id;
        let created = insert_assessment_row(&mut *tx, &assessment).await?;

        sqlx::query("UPDATE draft_assessments SET status = $2 WHERE id = $1")
            .bind(draft_id)
            .bind(DraftStatus::Completed.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Completion::Created(created))
    }

    async fn insert_assessment(
        &self,
        assessment: CompletedAssessment,
    ) -> Result<CompletedAssessment, StoreError> {
        insert_assessment_row(&self.pool, &assessment)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert assessment: {:?}", e);
                e
            })
    }

    async fn find_assessment(&self, id: Uuid) -> Result<Option<CompletedAssessment>, StoreError> {
        sqlx::query_as::<_, AssessmentRow>(&format!(
            "SELECT {} FROM completed_assessments WHERE id = $1",
            ASSESSMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(CompletedAssessment::try_from)
        .transpose()
    }

    async fn list_user_assessments(
        &self,
        user_id: &str,
    ) -> Result<Vec<CompletedAssessment>, StoreError> {
        sqlx::query_as::<_, AssessmentRow>(&format!(
            "SELECT {} FROM completed_assessments WHERE user_id = $1 ORDER BY completed_at DESC",
            ASSESSMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CompletedAssessment::try_from)
        .collect()
    }

    async fn list_open_drafts(
        &self,
        query: DraftQuery,
    ) -> Result<(Vec<DraftAssessment>, usize), StoreError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM draft_assessments
            WHERE status = 'draft'
              AND ($1::TIMESTAMPTZ IS NULL OR last_answered_at < $1)
            "#,
        )
        .bind(query.idle_before)
        .fetch_one(&self.pool)
        .await?;

        let drafts = sqlx::query_as::<_, DraftRow>(&format!(
            r#"
            SELECT {} FROM draft_assessments
            WHERE status = 'draft'
              AND ($1::TIMESTAMPTZ IS NULL OR last_answered_at < $1)
            ORDER BY last_answered_at DESC
            LIMIT $2 OFFSET $3
            "#,
            DRAFT_COLUMNS
        ))
        .bind(query.idle_before)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(DraftAssessment::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok((drafts, total.max(0) as usize))
    }

    async fn delete_superseded_drafts(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM draft_assessments d
            WHERE d.status = 'draft'
              AND EXISTS (SELECT 1 FROM completed_assessments c WHERE c.user_id = d.user_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete superseded drafts: {:?}", e);
            StoreError::from(e)
        })?;

        Ok(result.rows_affected())
    }
}
