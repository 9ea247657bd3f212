// src/handlers/drafts.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::draft::{CreateDraftRequest, DraftAssessment, DraftResponse, SaveProgressRequest},
    services::DraftService,
    utils::resume_token,
};

fn to_response(draft: DraftAssessment, config: &Config) -> DraftResponse {
    let url = resume_token::resume_url(&config.public_base_url, &draft.resume_token);
    DraftResponse::new(draft, url)
}

/// Starts a new draft assessment and hands out its resume token.
pub async fn create_draft(
    State(drafts): State<DraftService>,
    State(config): State<Config>,
    Json(payload): Json<CreateDraftRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let draft = drafts
        .create_draft(&payload.user_id, &payload.language)
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(draft, &config))))
}

/// Saves answers and cursor position of a draft.
///
/// Answers are merged into the stored set by question id, so the client may
/// send the full list or only what changed.
pub async fn save_progress(
    State(drafts): State<DraftService>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaveProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    drafts.save_progress(id, payload.into()).await?;

    Ok(StatusCode::OK)
}

/// Loads a draft from its resume token.
pub async fn resume_draft(
    State(drafts): State<DraftService>,
    State(config): State<Config>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let draft = drafts.resume_by_token(&token).await?;
    tracing::debug!(draft_id = %draft.id, "Draft resumed");

    Ok(Json(to_response(draft, &config)))
}
