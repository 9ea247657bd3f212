// src/scoring.rs

use std::collections::HashMap;

use thiserror::Error;

use crate::models::{
    answer::Answer,
    assessment::{PillarScore, Zone},
    question::QuestionCatalog,
};

/// Recommendations attached to each pillar score.
pub const RECOMMENDATIONS_PER_PILLAR: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("unknown question '{0}'")]
    UnknownQuestion(String),

    #[error("answer {answer} for question '{question_id}' is outside {min}..={max}")]
    OutOfRange {
        question_id: String,
        answer: i64,
        min: i64,
        max: i64,
    },

    #[error("question '{0}' has not been answered")]
    Unanswered(String),
}

/// Result of scoring a complete answer set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    pub pillar_scores: Vec<PillarScore>,
    pub overall_score: i64,
    pub overall_status: Zone,
}

/// Scores a complete answer set against `catalog`.
///
/// * Pillar score: sum of the pillar's answers over the pillar's maximum,
///   as a rounded percentage.
/// * Overall score: rounded mean of the pillar scores, each pillar counting
///   equally whatever its question count.
///
/// Scores are never clamped: an answer outside the declared option range is
/// an error.
pub fn score(catalog: &QuestionCatalog, answers: &[Answer]) -> Result<ScoreCard, ScoringError> {
    let mut by_question: HashMap<&str, i64> = HashMap::with_capacity(answers.len());
    for answer in answers {
        let question = catalog
            .question(&answer.question_id)
            .ok_or_else(|| ScoringError::UnknownQuestion(answer.question_id.clone()))?;
        let (min, max) = question.score_range().unwrap_or((0, 0));
        if answer.answer < min || answer.answer > max {
            return Err(ScoringError::OutOfRange {
                question_id: answer.question_id.clone(),
                answer: answer.answer,
                min,
                max,
            });
        }
        by_question.insert(answer.question_id.as_str(), answer.answer);
    }

    let mut pillar_scores = Vec::with_capacity(catalog.pillars.len());
    for pillar in &catalog.pillars {
        let mut total = 0;
        for question in &pillar.questions {
            total += by_question
                .get(question.id.as_str())
                .ok_or_else(|| ScoringError::Unanswered(question.id.clone()))?;
        }

        let score = rounded_percentage(total, pillar.max_score());
        let status = Zone::from_score(score);
        pillar_scores.push(PillarScore {
            pillar_id: pillar.id.clone(),
            pillar_name: pillar.name.clone(),
            score,
            status,
            recommendations: pillar
                .recommendations
                .for_zone(status)
                .iter()
                .take(RECOMMENDATIONS_PER_PILLAR)
                .cloned()
                .collect(),
        });
    }

    let overall_score = rounded_mean(pillar_scores.iter().map(|p| p.score));

    Ok(ScoreCard {
        overall_status: Zone::from_score(overall_score),
        pillar_scores,
        overall_score,
    })
}

/// `round(part / whole * 100)`, halves rounding up. `0` when `whole` is `0`.
fn rounded_percentage(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        return 0;
    }
    (200 * part + whole) / (2 * whole)
}

fn rounded_mean(values: impl Iterator<Item = i64>) -> i64 {
    let (sum, count) = values.fold((0, 0), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return 0;
    }
    (2 * sum + count) / (2 * count)
}
