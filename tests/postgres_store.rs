// tests/postgres_store.rs

//! Runs only when DATABASE_URL points at a PostgreSQL instance.

use assessment_backend::{
    models::{
        answer::Answer,
        assessment::{CompletedAssessment, Zone},
        draft::{DraftAssessment, ProgressUpdate},
    },
    store::{Completion, DraftStore, PgDraftStore, StoreError},
    utils::resume_token,
};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn store() -> Option<PgDraftStore> {
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    Some(PgDraftStore::new(pool))
}

fn draft(user: &str) -> DraftAssessment {
    DraftAssessment::new(
        Uuid::new_v4(),
        resume_token::generate(),
        user.to_string(),
        "en".to_string(),
        2,
        Utc::now(),
    )
}

fn assessment(user: &str) -> CompletedAssessment {
    CompletedAssessment {
        id: Uuid::new_v4(),
        user_id: user.to_string(),
        language: "en".to_string(),
        answers: vec![Answer::new("q1", 1), Answer::new("q2", 2)],
        pillar_scores: vec![],
        overall_score: 50,
        overall_status: Zone::Amber,
        completed_at: Utc::now(),
    }
}

fn unique_user() -> String {
    format!("pg-{}", &Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn progress_is_merged_in_storage() {
    let Some(store) = store().await else {
        return;
    };
    let d = store.insert_draft(draft(&unique_user())).await.unwrap();

    for (q, a, index) in [("q1", 2, 1), ("q2", 0, 1), ("q1", 3, 1)] {
        let update = ProgressUpdate {
            answers: vec![Answer::new(q, a)],
            current_question_index: index,
            seq: None,
        };
        store.apply_progress(d.id, &update, Utc::now()).await.unwrap();
    }

    let found = store.find_draft_by_token(&d.resume_token).await.unwrap().unwrap();
    assert_eq!(found.answers, vec![Answer::new("q1", 3), Answer::new("q2", 0)]);
    assert_eq!(found.current_question_index, 1);
}

#[tokio::test]
async fn completion_happens_once() {
    let Some(store) = store().await else {
        return;
    };
    let user = unique_user();
    let d = store.insert_draft(draft(&user)).await.unwrap();

    let (a, b) = tokio::join!(
        store.complete_draft(d.id, assessment(&user)),
        store.complete_draft(d.id, assessment(&user))
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    let created = [&a, &b]
        .iter()
        .filter(|c| matches!(c, Completion::Created(_)))
        .count();
    assert_eq!(created, 1);
    assert_eq!(a.into_assessment().id, d.id);
    assert_eq!(b.into_assessment().id, d.id);

    let update = ProgressUpdate {
        answers: vec![],
        current_question_index: 0,
        seq: None,
    };
    let err = store.apply_progress(d.id, &update, Utc::now()).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyCompleted));
}

#[tokio::test]
async fn duplicate_token_is_a_conflict() {
    let Some(store) = store().await else {
        return;
    };
    let first = store.insert_draft(draft(&unique_user())).await.unwrap();
    let mut second = draft(&unique_user());
    second.resume_token = first.resume_token.clone();

    let err = store.insert_draft(second).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}
