// src/progression/http.rs

//! `AssessmentApi` over the HTTP/JSON interface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use super::api::{ApiError, AssessmentApi};
use crate::models::{
    assessment::{CompletedAssessment, SubmitAssessmentRequest, SubmitAssessmentResponse},
    draft::{DraftResponse, ResumeRejection, SaveProgressRequest},
    question::QuestionCatalog,
};

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Error body returned by the service.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    reason: Option<ResumeRejection>,
    #[serde(default)]
    assessment_id: Option<Uuid>,
}

pub struct HttpApi {
    /// API root, e.g. `http://localhost:3000/api`.
    base_url: String,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Transient("request timed out".to_string())
    } else {
        ApiError::Transient(e.to_string())
    }
}

/// Maps non-success statuses onto `ApiError`.
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = if body.error.is_empty() { text } else { body.error };

    Err(match status {
        StatusCode::NOT_FOUND => ApiError::NotFound {
            message,
            reason: body.reason,
            assessment_id: body.assessment_id,
        },
        StatusCode::CONFLICT => ApiError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ApiError::Validation(message)
        }
        _ => ApiError::Transient(format!("{}: {}", status, message)),
    })
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    check(response)
        .await?
        .json()
        .await
        .map_err(|e| ApiError::Transient(format!("failed to parse response: {e}")))
}

#[async_trait]
impl AssessmentApi for HttpApi {
    async fn questions(&self, language: &str) -> Result<QuestionCatalog, ApiError> {
        let response = self
            .client
            .get(self.url("/questions"))
            .query(&[("lang", language)])
            .send()
            .await
            .map_err(transport_error)?;
        parse(response).await
    }

    #[instrument(skip(self))]
    async fn create_draft(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<DraftResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/drafts"))
            .json(&json!({ "userId": user_id, "language": language }))
            .send()
            .await
            .map_err(transport_error)?;
        parse(response).await
    }

    #[instrument(skip(self, request), fields(seq = ?request.seq))]
    async fn save_progress(
        &self,
        draft_id: Uuid,
        request: &SaveProgressRequest,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.url(&format!("/drafts/{}/progress", draft_id)))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        check(response).await.map(|_| ())
    }

    async fn resume(&self, token: &str) -> Result<DraftResponse, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/drafts/resume/{}", token)))
            .send()
            .await
            .map_err(transport_error)?;
        parse(response).await
    }

    #[instrument(skip(self, request), fields(assessment_id = ?request.assessment_id))]
    async fn submit(
        &self,
        request: &SubmitAssessmentRequest,
    ) -> Result<CompletedAssessment, ApiError> {
        let response = self
            .client
            .post(self.url("/assessments"))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        parse::<SubmitAssessmentResponse>(response)
            .await
            .map(|r| r.assessment)
    }

    async fn assessment(&self, id: Uuid) -> Result<CompletedAssessment, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/assessments/{}", id)))
            .send()
            .await
            .map_err(transport_error)?;
        parse(response).await
    }
}
