// src/progression/machine.rs

//! Pure progression reducer: `(state, event) -> (state, effects)`.

use std::{fmt, sync::Arc};

use thiserror::Error;
use uuid::Uuid;

use crate::{
    merge,
    models::{
        answer::Answer,
        assessment::{CompletedAssessment, SubmitAssessmentRequest},
        question::Question,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Answering { index: usize },
    Submitting,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Loading => f.write_str("loading"),
            Phase::Answering { index } => write!(f, "answering({})", index),
            Phase::Submitting => f.write_str("submitting"),
            Phase::Completed => f.write_str("completed"),
        }
    }
}

/// Where a loaded session starts from: a fresh or resumed draft, or nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub draft_id: Option<Uuid>,
    pub answers: Vec<Answer>,
    pub current_question_index: usize,
    /// Highest save sequence the draft has seen; later saves continue from it.
    pub last_seq: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionState {
    pub phase: Phase,
    pub user_id: String,
    pub language: String,
    pub draft_id: Option<Uuid>,
    /// Questions in global order.
    pub questions: Arc<Vec<Question>>,
    pub answers: Vec<Answer>,
    /// Bumped on every mutation, sent along with each save.
    pub seq: i64,
    /// Payload of the last submit attempt, resent verbatim on retry.
    pub pending_submit: Option<SubmitAssessmentRequest>,
    pub last_error: Option<String>,
    pub assessment: Option<CompletedAssessment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Loaded {
        questions: Vec<Question>,
        snapshot: Snapshot,
    },
    /// The resumed draft was already submitted; go straight to its results.
    ShowResults { assessment: CompletedAssessment },
    /// Answer the current question with the option worth `score`.
    Select { score: i64 },
    Next,
    Previous,
    RetrySubmit,
    SubmitSucceeded { assessment: CompletedAssessment },
    SubmitFailed { message: String },
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Loaded { .. } => "loaded",
            Event::ShowResults { .. } => "show_results",
            Event::Select { .. } => "select",
            Event::Next => "next",
            Event::Previous => "previous",
            Event::RetrySubmit => "retry_submit",
            Event::SubmitSucceeded { .. } => "submit_succeeded",
            Event::SubmitFailed { .. } => "submit_failed",
        }
    }
}

/// Side effects requested by a transition. The reducer never performs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Best-effort save of the full current answer set.
    SaveProgress {
        draft_id: Uuid,
        answers: Vec<Answer>,
        current_question_index: usize,
        seq: i64,
    },
    Finalize(SubmitAssessmentRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("'{event}' is not allowed while {phase}")]
    NotAllowed { phase: Phase, event: &'static str },

    #[error("the questionnaire has no questions")]
    EmptyCatalog,

    #[error("question {index} must be answered before moving on")]
    Unanswered { index: usize },

    #[error("{answered} of {total} questions answered")]
    Incomplete { answered: usize, total: usize },

    #[error("{score} is not an option of question '{question_id}'")]
    InvalidOption { question_id: String, score: i64 },

    #[error("already at the first question")]
    AtFirstQuestion,

    #[error("no submission to retry")]
    NothingToRetry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub state: ProgressionState,
    pub effects: Vec<Effect>,
}

impl ProgressionState {
    pub fn new(user_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            phase: Phase::Loading,
            user_id: user_id.into(),
            language: language.into(),
            draft_id: None,
            questions: Arc::new(Vec::new()),
            answers: Vec::new(),
            seq: 0,
            pending_submit: None,
            last_error: None,
            assessment: None,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Answering { index } => self.questions.get(index),
            _ => None,
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.phase {
            Phase::Answering { index } => Some(index),
            _ => None,
        }
    }

    pub fn answer_for(&self, index: usize) -> Option<&Answer> {
        let question = self.questions.get(index)?;
        merge::find(&self.answers, &question.id)
    }

    pub fn is_complete(&self) -> bool {
        !self.questions.is_empty() && self.answers.len() == self.questions.len()
    }

    fn last_index(&self) -> usize {
        self.questions.len().saturating_sub(1)
    }

    fn save_effect(&self, index: usize) -> Option<Effect> {
        self.draft_id.map(|draft_id| Effect::SaveProgress {
            draft_id,
            answers: self.answers.clone(),
            current_question_index: index,
            seq: self.seq,
        })
    }

    fn submit_request(&self) -> SubmitAssessmentRequest {
        SubmitAssessmentRequest {
            user_id: self.user_id.clone(),
            answers: self.answers.clone(),
            language: self.language.clone(),
            assessment_id: self.draft_id,
        }
    }
}

fn step(state: ProgressionState, effect: Option<Effect>) -> Step {
    Step {
        state,
        effects: effect.into_iter().collect(),
    }
}

/// Applies `event` to `state`.
///
/// Rejected events leave the caller's state untouched.
pub fn reduce(state: &ProgressionState, event: Event) -> Result<Step, TransitionError> {
    let mut next = state.clone();

    match (state.phase, event) {
        (Phase::Loading, Event::Loaded { questions, snapshot }) => {
            if questions.is_empty() {
                return Err(TransitionError::EmptyCatalog);
            }
            next.questions = Arc::new(questions);
            next.draft_id = snapshot.draft_id;
            next.answers = merge::dedupe(&snapshot.answers);
            next.seq = state.seq.max(snapshot.last_seq.unwrap_or(0));
            let index = snapshot.current_question_index.min(next.last_index());
            next.phase = Phase::Answering { index };
            Ok(step(next, None))
        }

        (Phase::Loading, Event::ShowResults { assessment }) => {
            next.draft_id = Some(assessment.id);
            next.answers = assessment.answers.clone();
            next.assessment = Some(assessment);
            next.phase = Phase::Completed;
            Ok(step(next, None))
        }

        (Phase::Answering { index }, Event::Select { score }) => {
            let question = &state.questions[index];
            if !question.has_option_score(score) {
                return Err(TransitionError::InvalidOption {
                    question_id: question.id.clone(),
                    score,
                });
            }
            next.answers = merge::merge(&state.answers, Answer::new(question.id.as_str(), score));
            next.seq += 1;
            let effect = next.save_effect(index);
            Ok(step(next, effect))
        }

        (Phase::Answering { index }, Event::Next) => {
            if state.answer_for(index).is_none() {
                return Err(TransitionError::Unanswered { index });
            }

            if index < state.last_index() {
                next.seq += 1;
                next.phase = Phase::Answering { index: index + 1 };
                let effect = next.save_effect(index + 1);
                return Ok(step(next, effect));
            }

            if !state.is_complete() {
                return Err(TransitionError::Incomplete {
                    answered: state.answers.len(),
                    total: state.total_questions(),
                });
            }

            let request = state.submit_request();
            next.pending_submit = Some(request.clone());
            next.last_error = None;
            next.phase = Phase::Submitting;
            Ok(step(next, Some(Effect::Finalize(request))))
        }

        (Phase::Answering { index }, Event::Previous) => {
            if index == 0 {
                return Err(TransitionError::AtFirstQuestion);
            }
            next.seq += 1;
            next.phase = Phase::Answering { index: index - 1 };
            let effect = next.save_effect(index - 1);
            Ok(step(next, effect))
        }

        (Phase::Answering { .. }, Event::RetrySubmit) => {
            let request = state
                .pending_submit
                .clone()
                .ok_or(TransitionError::NothingToRetry)?;
            next.last_error = None;
            next.phase = Phase::Submitting;
            Ok(step(next, Some(Effect::Finalize(request))))
        }

        (Phase::Submitting, Event::SubmitSucceeded { assessment }) => {
            next.assessment = Some(assessment);
            next.pending_submit = None;
            next.last_error = None;
            next.phase = Phase::Completed;
            Ok(step(next, None))
        }

        (Phase::Submitting, Event::SubmitFailed { message }) => {
            next.last_error = Some(message);
            next.phase = Phase::Answering {
                index: state.last_index(),
            };
            Ok(step(next, None))
        }

        (phase, event) => Err(TransitionError::NotAllowed {
            phase,
            event: event.name(),
        }),
    }
}
