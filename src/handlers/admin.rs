// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::draft::DraftAssessment,
    services::DraftService,
    store::DraftQuery,
    utils::{jwt::Claims, resume_token},
};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Query parameters of the open draft listing.
#[derive(Debug, Deserialize)]
pub struct DraftListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Only drafts idle past the stale threshold.
    #[serde(default)]
    pub stale_only: bool,
}

/// How long a draft has gone without activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub fn from_days(days: i64) -> Self {
        if days >= 7 {
            Urgency::High
        } else if days >= 3 {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }
}

/// Whole days since `last`, rounded up.
pub fn days_since(last: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = (now - last).num_seconds().abs();
    let day = Duration::days(1).num_seconds();
    (elapsed + day - 1) / day
}

/// One row of the admin draft table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub id: Uuid,
    pub user_id: String,
    pub language: String,
    pub answered_count: usize,
    pub total_questions: usize,
    pub current_question_index: usize,
    pub progress_percentage: u32,
    pub started_at: DateTime<Utc>,
    pub last_answered_at: DateTime<Utc>,
    pub days_since_activity: i64,
    pub urgency: Urgency,
    pub stale: bool,
    pub resume_url: String,
}

impl DraftSummary {
    fn new(draft: DraftAssessment, config: &Config, now: DateTime<Utc>) -> Self {
        let days = days_since(draft.last_answered_at, now);
        let stale = now - draft.last_answered_at > Duration::hours(config.stale_draft_hours);
        Self {
            resume_url: resume_token::resume_url(&config.public_base_url, &draft.resume_token),
            progress_percentage: draft.progress_percentage(),
            answered_count: draft.answers.len(),
            id: draft.id,
            user_id: draft.user_id,
            language: draft.language,
            total_questions: draft.total_questions,
            current_question_index: draft.current_question_index,
            started_at: draft.started_at,
            last_answered_at: draft.last_answered_at,
            days_since_activity: days,
            urgency: Urgency::from_days(days),
            stale,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftListResponse {
    pub drafts: Vec<DraftSummary>,
    pub pagination: Pagination,
}

/// Lists drafts that are still in progress, most recently active first.
/// Admin only.
pub async fn list_drafts(
    State(drafts): State<DraftService>,
    State(config): State<Config>,
    Query(query): Query<DraftListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let now = Utc::now();
    let idle_before = query
        .stale_only
        .then(|| now - Duration::hours(config.stale_draft_hours));

    let (rows, total) = drafts
        .open_drafts(DraftQuery {
            offset: (page - 1).saturating_mul(limit) as usize,
            limit: limit as usize,
            idle_before,
        })
        .await?;

    let summaries = rows
        .into_iter()
        .map(|draft| DraftSummary::new(draft, &config, now))
        .collect();

    Ok(Json(DraftListResponse {
        drafts: summaries,
        pagination: Pagination {
            page,
            limit,
            total,
            pages: total.div_ceil(limit as usize),
        },
    }))
}

/// Deletes in-progress drafts of users who already completed an assessment.
/// Admin only.
pub async fn cleanup_drafts(
    State(drafts): State<DraftService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = drafts.cleanup_superseded_drafts().await?;
    tracing::info!(admin = %claims.sub, deleted, "Draft cleanup requested");

    Ok(Json(json!({ "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_since_rounds_up() {
        let now = Utc::now();
        assert_eq!(days_since(now, now), 0);
        assert_eq!(days_since(now - Duration::hours(1), now), 1);
        assert_eq!(days_since(now - Duration::hours(24), now), 1);
        assert_eq!(days_since(now - Duration::hours(25), now), 2);
    }

    #[test]
    fn test_urgency_thresholds() {
        assert_eq!(Urgency::from_days(0), Urgency::Low);
        assert_eq!(Urgency::from_days(2), Urgency::Low);
        assert_eq!(Urgency::from_days(3), Urgency::Medium);
        assert_eq!(Urgency::from_days(6), Urgency::Medium);
        assert_eq!(Urgency::from_days(7), Urgency::High);
    }
}
