// src/handlers/assessments.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::assessment::{SubmitAssessmentRequest, SubmitAssessmentResponse},
    services::DraftService,
};

/// Scores a complete answer set.
///
/// * With `assessmentId`, the draft is finalized; repeating the call returns
///   the stored result.
/// * Without it, a standalone assessment is recorded.
pub async fn submit_assessment(
    State(drafts): State<DraftService>,
    Json(payload): Json<SubmitAssessmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let assessment = drafts.finalize(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitAssessmentResponse { assessment }),
    ))
}

pub async fn get_assessment(
    State(drafts): State<DraftService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(drafts.assessment(id).await?))
}

/// Completed assessments of a user, newest first.
pub async fn list_user_assessments(
    State(drafts): State<DraftService>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(drafts.user_assessments(&user_id).await?))
}
