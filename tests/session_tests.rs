// tests/session_tests.rs

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use assessment_backend::{
    catalog::Catalog,
    config::Config,
    models::{
        assessment::{CompletedAssessment, SubmitAssessmentRequest},
        draft::{DraftResponse, SaveProgressRequest},
        question::QuestionCatalog,
    },
    progression::{
        ApiError, AssessmentApi, AssessmentSession, FileMirror, HttpApi, Mirror, Phase,
        SessionError,
    },
    routes,
    services::DraftService,
    state::AppState,
    store::MemoryDraftStore,
};
use async_trait::async_trait;
use uuid::Uuid;

async fn spawn_app() -> String {
    let catalog = Arc::new(Catalog::builtin().expect("Bundled catalogs must load"));
    let drafts = DraftService::new(Arc::new(MemoryDraftStore::new()), catalog.clone());
    let state = AppState {
        drafts,
        catalog,
        config: Config {
            database_url: None,
            jwt_secret: "test_secret".to_string(),
            rust_log: "error".to_string(),
            public_base_url: "http://localhost:5173".parse().unwrap(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            resume_token_ttl_hours: None,
            stale_draft_hours: 24,
            resume_rate_limit: None,
        },
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}/api", port)
}

async fn http_api() -> Arc<HttpApi> {
    Arc::new(HttpApi::new(&spawn_app().await).unwrap())
}

/// Answers the current question and moves on, `n` times.
async fn answer_forward<A: AssessmentApi>(session: &mut AssessmentSession<A>, n: usize, score: i64) {
    for _ in 0..n {
        session.select(score).await.unwrap();
        session.next().await.unwrap();
    }
}

/// Fails the first `failures` submits with a transient error.
struct FlakySubmit {
    inner: HttpApi,
    failures: AtomicUsize,
}

#[async_trait]
impl AssessmentApi for FlakySubmit {
    async fn questions(&self, language: &str) -> Result<QuestionCatalog, ApiError> {
        self.inner.questions(language).await
    }

    async fn create_draft(&self, user_id: &str, language: &str) -> Result<DraftResponse, ApiError> {
        self.inner.create_draft(user_id, language).await
    }

    async fn save_progress(
        &self,
        draft_id: Uuid,
        request: &SaveProgressRequest,
    ) -> Result<(), ApiError> {
        self.inner.save_progress(draft_id, request).await
    }

    async fn resume(&self, token: &str) -> Result<DraftResponse, ApiError> {
        self.inner.resume(token).await
    }

    async fn submit(
        &self,
        request: &SubmitAssessmentRequest,
    ) -> Result<CompletedAssessment, ApiError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(ApiError::Transient("connection reset".to_string()));
        }
        self.inner.submit(request).await
    }

    async fn assessment(&self, id: Uuid) -> Result<CompletedAssessment, ApiError> {
        self.inner.assessment(id).await
    }
}

#[tokio::test]
async fn session_walks_to_completion() {
    let api = http_api().await;
    let mut session = AssessmentSession::start(api.clone(), "user-1", "fr", None)
        .await
        .unwrap();
    let total = session.state().total_questions();
    assert_eq!(total, 12);

    answer_forward(&mut session, total, 3).await;

    assert_eq!(session.state().phase, Phase::Completed);
    let assessment = session.assessment().unwrap();
    assert_eq!(assessment.overall_score, 100);
    assert_eq!(Some(assessment.id), session.draft_id());

    // Reopening the link shows the results instead of the questionnaire.
    let token = session.resume_token().unwrap().to_string();
    let reopened = AssessmentSession::resume(api, &token, None).await.unwrap();
    assert_eq!(reopened.state().phase, Phase::Completed);
    assert_eq!(
        reopened.assessment().map(|a| a.id),
        Some(assessment.id)
    );
}

#[tokio::test]
async fn resume_restores_cursor_and_answers() {
    let api = http_api().await;
    let mut session = AssessmentSession::start(api.clone(), "user-1", "en", None)
        .await
        .unwrap();
    answer_forward(&mut session, 2, 2).await;
    session.select(1).await.unwrap();
    session.flush().await;

    let token = session.resume_token().unwrap().to_string();
    let resumed = AssessmentSession::resume(api, &token, None).await.unwrap();

    assert_eq!(resumed.state().phase, Phase::Answering { index: 2 });
    assert_eq!(resumed.state().answers.len(), 3);
}

#[tokio::test]
async fn edit_after_resume_on_another_device_is_kept() {
    let api = http_api().await;
    let mut first = AssessmentSession::start(api.clone(), "user-1", "en", None)
        .await
        .unwrap();
    answer_forward(&mut first, 5, 2).await;
    first.flush().await;
    let token = first.resume_token().unwrap().to_string();

    // Step back one question and change its answer.
    let mut second = AssessmentSession::resume(api.clone(), &token, None)
        .await
        .unwrap();
    assert_eq!(second.state().seq, first.state().seq);
    second.previous().await.unwrap();
    second.select(0).await.unwrap();
    second.flush().await;

    let third = AssessmentSession::resume(api, &token, None).await.unwrap();
    assert_eq!(third.state().phase, Phase::Answering { index: 4 });
    assert_eq!(third.state().answer_for(4).map(|a| a.answer), Some(0));
    assert_eq!(third.state().answers.len(), 5);
}

#[tokio::test]
async fn unknown_resume_link_is_rejected() {
    let api = http_api().await;
    let err = AssessmentSession::resume(api, &"f".repeat(64), None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SessionError::Api(ApiError::NotFound { .. })));
}

#[tokio::test]
async fn failed_submit_can_be_retried() {
    let api = Arc::new(FlakySubmit {
        inner: HttpApi::new(&spawn_app().await).unwrap(),
        failures: AtomicUsize::new(1),
    });
    let mut session = AssessmentSession::start(api, "user-1", "fr", None)
        .await
        .unwrap();
    let last = session.state().total_questions() - 1;

    answer_forward(&mut session, last, 1).await;
    session.select(1).await.unwrap();

    let err = session.next().await.err().unwrap();
    assert!(matches!(err, SessionError::Submit(ApiError::Transient(_))));
    assert_eq!(session.state().phase, Phase::Answering { index: last });
    assert!(session.state().last_error.is_some());

    session.retry_submit().await.unwrap();
    assert_eq!(session.state().phase, Phase::Completed);
}

#[tokio::test]
async fn mirror_restores_session_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let api = http_api().await;

    let mut session = AssessmentSession::start(
        api.clone(),
        "user-1",
        "en",
        Some(Box::new(FileMirror::new(&path))),
    )
    .await
    .unwrap();
    answer_forward(&mut session, 3, 2).await;
    session.flush().await;
    drop(session);

    let restored = AssessmentSession::restore(api, Box::new(FileMirror::new(&path)))
        .await
        .unwrap();
    assert_eq!(restored.state().phase, Phase::Answering { index: 3 });
    assert_eq!(restored.state().answers.len(), 3);
}

#[tokio::test]
async fn edit_after_mirror_restore_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let api = http_api().await;

    let mut session = AssessmentSession::start(
        api.clone(),
        "user-1",
        "en",
        Some(Box::new(FileMirror::new(&path))),
    )
    .await
    .unwrap();
    answer_forward(&mut session, 5, 2).await;
    session.flush().await;
    let token = session.resume_token().unwrap().to_string();
    drop(session);

    let mut restored = AssessmentSession::restore(api.clone(), Box::new(FileMirror::new(&path)))
        .await
        .unwrap();
    restored.previous().await.unwrap();
    restored.select(0).await.unwrap();
    restored.flush().await;

    let reopened = AssessmentSession::resume(api, &token, None).await.unwrap();
    assert_eq!(reopened.state().phase, Phase::Answering { index: 4 });
    assert_eq!(reopened.state().answer_for(4).map(|a| a.answer), Some(0));
}

#[tokio::test]
async fn mirror_covers_server_outage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut session = AssessmentSession::start(
        http_api().await,
        "user-1",
        "en",
        Some(Box::new(FileMirror::new(&path))),
    )
    .await
    .unwrap();
    answer_forward(&mut session, 2, 1).await;
    session.flush().await;
    drop(session);

    // Nothing listens here any more.
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);
    let offline = Arc::new(HttpApi::new(&format!("http://{}/api", addr)).unwrap());

    let restored = AssessmentSession::restore(offline, Box::new(FileMirror::new(&path)))
        .await
        .unwrap();
    assert_eq!(restored.state().phase, Phase::Answering { index: 2 });
    assert_eq!(restored.state().answers.len(), 2);
    // Two selects and two moves: later saves continue after the mirrored count.
    assert_eq!(restored.state().seq, 4);
}

#[tokio::test]
async fn completion_clears_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let mirror = FileMirror::new(&path);

    let mut session = AssessmentSession::start(
        http_api().await,
        "user-1",
        "fr",
        Some(Box::new(mirror.clone())),
    )
    .await
    .unwrap();
    assert!(mirror.load().unwrap().is_some());

    let total = session.state().total_questions();
    answer_forward(&mut session, total, 0).await;

    assert_eq!(session.state().phase, Phase::Completed);
    assert!(mirror.load().unwrap().is_none());
}
