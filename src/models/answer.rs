// src/models/answer.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A recorded answer to one catalog question.
///
/// `answer` holds the score of the selected option. A score of `0` is a real
/// answer (the lowest option); an unanswered question is simply absent from
/// the answer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[validate(length(min = 1, max = 64))]
    pub question_id: String,
    pub answer: i64,
}

impl Answer {
    pub fn new(question_id: impl Into<String>, answer: i64) -> Self {
        Self {
            question_id: question_id.into(),
            answer,
        }
    }
}
