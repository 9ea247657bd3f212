// src/models/assessment.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::answer::Answer;

/// Score band shared by pillar and overall scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Red,
    Amber,
    Green,
}

impl Zone {
    /// `red = [0,39]`, `amber = [40,69]`, `green = [70,100]`.
    pub fn from_score(score: i64) -> Self {
        if score >= 70 {
            Zone::Green
        } else if score >= 40 {
            Zone::Amber
        } else {
            Zone::Red
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Red => "red",
            Zone::Amber => "amber",
            Zone::Green => "green",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "red" => Some(Zone::Red),
            "amber" => Some(Zone::Amber),
            "green" => Some(Zone::Green),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score of a single pillar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PillarScore {
    pub pillar_id: String,
    pub pillar_name: String,
    pub score: i64,
    pub status: Zone,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// A finalized, immutable assessment.
///
/// When finalized from a draft it carries the draft's id, so one draft can
/// never yield two completed records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedAssessment {
    pub id: Uuid,
    pub user_id: String,
    pub language: String,
    pub answers: Vec<Answer>,
    pub pillar_scores: Vec<PillarScore>,
    pub overall_score: i64,
    pub overall_status: Zone,
    pub completed_at: DateTime<Utc>,
}

/// DTO for submitting a finished questionnaire.
///
/// The client resubmits this payload verbatim when retrying a failed submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAssessmentRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,

    #[validate(length(min = 1), nested)]
    pub answers: Vec<Answer>,

    #[serde(default = "default_language")]
    #[validate(length(min = 2, max = 8))]
    pub language: String,

    /// Draft being finalized, if the questionnaire was started as one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<Uuid>,
}

/// Response envelope of a successful submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAssessmentResponse {
    pub assessment: CompletedAssessment,
}

pub(crate) fn default_language() -> String {
    crate::catalog::DEFAULT_LANGUAGE.to_string()
}
