// src/models/question.rs

use serde::{Deserialize, Serialize};

use crate::models::assessment::Zone;

/// One selectable option of a question and the score it contributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub label: String,
    pub score: i64,
}

/// A catalog question. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,

    /// Filled in from the owning pillar when the catalog is loaded.
    #[serde(default)]
    pub pillar_id: String,

    pub text: String,
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// Inclusive `(min, max)` score range declared by the options.
    pub fn score_range(&self) -> Option<(i64, i64)> {
        let min = self.options.iter().map(|o| o.score).min()?;
        let max = self.options.iter().map(|o| o.score).max()?;
        Some((min, max))
    }

    pub fn max_score(&self) -> i64 {
        self.score_range().map(|(_, max)| max).unwrap_or(0)
    }

    pub fn has_option_score(&self, score: i64) -> bool {
        self.options.iter().any(|o| o.score == score)
    }
}

/// Zone-keyed recommendation texts of a pillar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    #[serde(default)]
    pub red: Vec<String>,
    #[serde(default)]
    pub amber: Vec<String>,
    #[serde(default)]
    pub green: Vec<String>,
}

impl Recommendations {
    pub fn for_zone(&self, zone: Zone) -> &[String] {
        match zone {
            Zone::Red => &self.red,
            Zone::Amber => &self.amber,
            Zone::Green => &self.green,
        }
    }
}

/// A themed group of questions contributing one sub-score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pillar {
    pub id: String,
    pub name: String,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub recommendations: Recommendations,
}

impl Pillar {
    /// Highest total this pillar can reach.
    pub fn max_score(&self) -> i64 {
        self.questions.iter().map(Question::max_score).sum()
    }
}

/// The ordered question tree for one language.
///
/// Pillar order, then question order inside each pillar, defines the global
/// question sequence the progression cursor walks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCatalog {
    pub language: String,
    pub pillars: Vec<Pillar>,
}

impl QuestionCatalog {
    pub fn total_questions(&self) -> usize {
        self.pillars.iter().map(|p| p.questions.len()).sum()
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.pillars.iter().flat_map(|p| p.questions.iter())
    }

    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions().nth(index)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions().find(|q| q.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.questions().position(|q| q.id == id)
    }

    /// Copies each pillar id onto its questions.
    pub(crate) fn link_pillars(&mut self) {
        for pillar in &mut self.pillars {
            for question in &mut pillar.questions {
                question.pillar_id = pillar.id.clone();
            }
        }
    }
}
