// src/progression/session.rs

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::{
    api::{ApiError, AssessmentApi},
    machine::{Effect, Event, Phase, ProgressionState, Snapshot, TransitionError, reduce},
    mirror::{Mirror, MirrorRecord},
};
use crate::models::{
    answer::Answer,
    assessment::{CompletedAssessment, SubmitAssessmentRequest},
    draft::{DraftResponse, SaveProgressRequest},
    question::QuestionCatalog,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The questionnaire is back on its last question; `retry_submit` resends
    /// the same answers.
    #[error("submission failed: {0}")]
    Submit(ApiError),

    #[error("no session to restore")]
    NothingToRestore,
}

enum Opened {
    Draft {
        draft: DraftResponse,
        catalog: QuestionCatalog,
    },
    Completed(CompletedAssessment),
}

async fn open_token<A: AssessmentApi>(api: &A, token: &str) -> Result<Opened, ApiError> {
    match api.resume(token).await {
        Ok(draft) => {
            let catalog = api.questions(&draft.language).await?;
            Ok(Opened::Draft { draft, catalog })
        }
        Err(err) => match err.completed_assessment() {
            Some(id) => Ok(Opened::Completed(api.assessment(id).await?)),
            None => Err(err),
        },
    }
}

fn snapshot(draft: &DraftResponse) -> Snapshot {
    Snapshot {
        draft_id: Some(draft.id),
        answers: draft.answers.clone(),
        current_question_index: draft.current_question_index,
        last_seq: draft.last_seq,
    }
}

/// One user's walk through the questionnaire.
///
/// Drives the progression reducer, fires progress saves in the background
/// and finalizes on the last `next`.
pub struct AssessmentSession<A: AssessmentApi> {
    api: Arc<A>,
    state: ProgressionState,
    resume_token: Option<String>,
    mirror: Option<Box<dyn Mirror>>,
    saves: JoinSet<()>,
}

impl<A: AssessmentApi> AssessmentSession<A> {
    fn new(
        api: Arc<A>,
        user_id: &str,
        language: &str,
        mirror: Option<Box<dyn Mirror>>,
    ) -> Self {
        Self {
            api,
            state: ProgressionState::new(user_id, language),
            resume_token: None,
            mirror,
            saves: JoinSet::new(),
        }
    }

    /// Creates a new draft and starts at the first question.
    pub async fn start(
        api: Arc<A>,
        user_id: &str,
        language: &str,
        mirror: Option<Box<dyn Mirror>>,
    ) -> Result<Self, SessionError> {
        let draft = api.create_draft(user_id, language).await?;
        let catalog = api.questions(&draft.language).await?;

        let mut session = Self::new(api, &draft.user, &draft.language, mirror);
        session.resume_token = Some(draft.resume_token.clone());
        session.apply(Event::Loaded {
            questions: catalog.questions().cloned().collect(),
            snapshot: snapshot(&draft),
        })?;
        tracing::info!(draft_id = %draft.id, "Assessment session started");
        Ok(session)
    }

    /// Opens the draft behind a resume link.
    ///
    /// A link to an already submitted assessment opens its results instead.
    pub async fn resume(
        api: Arc<A>,
        token: &str,
        mirror: Option<Box<dyn Mirror>>,
    ) -> Result<Self, SessionError> {
        let opened = open_token(api.as_ref(), token).await?;
        Self::from_opened(api, token, opened, mirror)
    }

    /// Rebuilds the session recorded in `mirror`.
    ///
    /// The server copy wins when it can be reached. When it cannot, the
    /// session continues from the mirror and later saves catch the server up.
    pub async fn restore(api: Arc<A>, mirror: Box<dyn Mirror>) -> Result<Self, SessionError> {
        let record = match mirror.load() {
            Ok(Some(record)) => record,
            Ok(None) => return Err(SessionError::NothingToRestore),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session mirror: {}", e);
                return Err(SessionError::NothingToRestore);
            }
        };

        if let Some(token) = record.resume_token.as_deref() {
            match open_token(api.as_ref(), token).await {
                Ok(opened) => return Self::from_opened(api, token, opened, Some(mirror)),
                Err(e) if e.is_retryable() => {
                    tracing::warn!("Server unreachable, continuing from local mirror: {}", e);
                }
                Err(e) => {
                    if let Err(clear) = mirror.clear() {
                        tracing::warn!("Failed to clear session mirror: {}", clear);
                    }
                    return Err(e.into());
                }
            }
        }

        if record.questions.is_empty() {
            return Err(SessionError::NothingToRestore);
        }

        let mut session = Self::new(api, &record.user, &record.language, Some(mirror));
        session.resume_token = record.resume_token.clone();
        match record.assessment {
            Some(assessment) => {
                session.apply(Event::ShowResults { assessment })?;
            }
            None => {
                session.apply(Event::Loaded {
                    questions: record.questions,
                    snapshot: Snapshot {
                        draft_id: record.assessment_id,
                        answers: record.answers,
                        current_question_index: record.current_question_index,
                        last_seq: Some(record.seq),
                    },
                })?;
            }
        }
        Ok(session)
    }

    fn from_opened(
        api: Arc<A>,
        token: &str,
        opened: Opened,
        mirror: Option<Box<dyn Mirror>>,
    ) -> Result<Self, SessionError> {
        match opened {
            Opened::Draft { draft, catalog } => {
                let mut session = Self::new(api, &draft.user, &draft.language, mirror);
                session.resume_token = Some(token.to_string());
                session.apply(Event::Loaded {
                    questions: catalog.questions().cloned().collect(),
                    snapshot: snapshot(&draft),
                })?;
                tracing::info!(draft_id = %draft.id, "Assessment session resumed");
                Ok(session)
            }
            Opened::Completed(assessment) => {
                let mut session =
                    Self::new(api, &assessment.user_id, &assessment.language, mirror);
                session.apply(Event::ShowResults { assessment })?;
                Ok(session)
            }
        }
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn resume_token(&self) -> Option<&str> {
        self.resume_token.as_deref()
    }

    pub fn draft_id(&self) -> Option<Uuid> {
        self.state.draft_id
    }

    pub fn assessment(&self) -> Option<&CompletedAssessment> {
        self.state.assessment.as_ref()
    }

    pub async fn select(&mut self, score: i64) -> Result<&ProgressionState, SessionError> {
        self.dispatch(Event::Select { score }).await
    }

    /// Moves forward; on the last question this submits the questionnaire.
    pub async fn next(&mut self) -> Result<&ProgressionState, SessionError> {
        self.dispatch(Event::Next).await
    }

    pub async fn previous(&mut self) -> Result<&ProgressionState, SessionError> {
        self.dispatch(Event::Previous).await
    }

    pub async fn retry_submit(&mut self) -> Result<&ProgressionState, SessionError> {
        self.dispatch(Event::RetrySubmit).await
    }

    /// Waits for every background save to settle.
    pub async fn flush(&mut self) {
        while let Some(joined) = self.saves.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Progress save task aborted: {}", e);
            }
        }
    }

    /// Drops the session and forgets its local copy.
    pub async fn reset(mut self) {
        self.flush().await;
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.clear() {
                tracing::warn!("Failed to clear session mirror: {}", e);
            }
        }
    }

    async fn dispatch(&mut self, event: Event) -> Result<&ProgressionState, SessionError> {
        let effects = self.apply(event)?;
        for effect in effects {
            match effect {
                Effect::SaveProgress {
                    draft_id,
                    answers,
                    current_question_index,
                    seq,
                } => self.spawn_save(draft_id, answers, current_question_index, seq),
                Effect::Finalize(request) => self.finalize(request).await?,
            }
        }
        Ok(&self.state)
    }

    fn apply(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let step = reduce(&self.state, event)?;
        self.state = step.state;
        self.persist();
        Ok(step.effects)
    }

    fn spawn_save(&mut self, draft_id: Uuid, answers: Vec<Answer>, index: usize, seq: i64) {
        // Reap saves that already finished.
        while self.saves.try_join_next().is_some() {}

        let api = self.api.clone();
        let request = SaveProgressRequest {
            answers,
            current_question_index: index,
            seq: Some(seq),
        };
        self.saves.spawn(async move {
            if let Err(e) = api.save_progress(draft_id, &request).await {
                tracing::warn!(%draft_id, seq, "Progress save failed, the next change resends it: {}", e);
            }
        });
    }

    async fn finalize(&mut self, request: SubmitAssessmentRequest) -> Result<(), SessionError> {
        // Let in-flight saves land before the draft closes.
        self.flush().await;

        match self.api.submit(&request).await {
            Ok(assessment) => {
                tracing::info!(assessment_id = %assessment.id, score = assessment.overall_score, "Assessment submitted");
                self.apply(Event::SubmitSucceeded { assessment })?;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Submit failed: {}", e);
                self.apply(Event::SubmitFailed {
                    message: e.to_string(),
                })?;
                Err(SessionError::Submit(e))
            }
        }
    }

    fn persist(&self) {
        let Some(mirror) = &self.mirror else {
            return;
        };

        let result = match self.state.phase {
            Phase::Loading => Ok(()),
            Phase::Completed => mirror.clear(),
            Phase::Answering { .. } | Phase::Submitting => mirror.store(&self.record()),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to update session mirror: {}", e);
        }
    }

    fn record(&self) -> MirrorRecord {
        MirrorRecord {
            user: self.state.user_id.clone(),
            language: self.state.language.clone(),
            questions: self.state.questions.as_ref().clone(),
            current_question_index: self
                .state
                .current_index()
                .unwrap_or(self.state.total_questions().saturating_sub(1)),
            answers: self.state.answers.clone(),
            assessment: self.state.assessment.clone(),
            assessment_id: self.state.draft_id,
            resume_token: self.resume_token.clone(),
            seq: self.state.seq,
        }
    }
}
