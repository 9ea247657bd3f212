// src/store/memory.rs

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Completion, DraftQuery, DraftStore, StoreError};
use crate::models::{
    assessment::CompletedAssessment,
    draft::{DraftAssessment, DraftStatus, ProgressUpdate},
};

#[derive(Debug, Default)]
struct Inner {
    drafts: HashMap<Uuid, DraftAssessment>,
    tokens: HashMap<String, Uuid>,
    assessments: HashMap<Uuid, CompletedAssessment>,
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    inner: RwLock<Inner>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn insert_draft(&self, draft: DraftAssessment) -> Result<DraftAssessment, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.drafts.contains_key(&draft.id) || inner.tokens.contains_key(&draft.resume_token)
        {
            return Err(StoreError::Conflict("draft id or token already in use".to_string()));
        }
        inner.tokens.insert(draft.resume_token.clone(), draft.id);
        inner.drafts.insert(draft.id, draft.clone());
        Ok(draft)
    }

    async fn find_draft(&self, id: Uuid) -> Result<Option<DraftAssessment>, StoreError> {
        Ok(self.inner.read().await.drafts.get(&id).cloned())
    }

    async fn find_draft_by_token(
        &self,
        token: &str,
    ) -> Result<Option<DraftAssessment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tokens
            .get(token)
            .and_then(|id| inner.drafts.get(id))
            .cloned())
    }

    async fn apply_progress(
        &self,
        id: Uuid,
        update: &ProgressUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<DraftAssessment>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(draft) = inner.drafts.get_mut(&id) else {
            return Ok(None);
        };
        if draft.is_completed() {
            return Err(StoreError::AlreadyCompleted);
        }
        draft.apply_progress(update, at);
        Ok(Some(draft.clone()))
    }

    async fn complete_draft(
        &self,
        draft_id: Uuid,
        mut assessment: CompletedAssessment,
    ) -> Result<Completion, StoreError> {
        let mut inner = self.inner.write().await;
        let status = inner
            .drafts
            .get(&draft_id)
            .map(|d| d.status)
            .ok_or(StoreError::NotFound)?;

        if status == DraftStatus::Completed {
            return inner
                .assessments
                .get(&draft_id)
                .cloned()
                .map(Completion::Existing)
                .ok_or_else(|| {
                    StoreError::Conflict("completed draft has no assessment".to_string())
                });
        }

        assessment.id = draft_id;
        inner.assessments.insert(draft_id, assessment.clone());
        if let Some(draft) = inner.drafts.get_mut(&draft_id) {
            draft.status = DraftStatus::Completed;
        }
        Ok(Completion::Created(assessment))
    }

    async fn insert_assessment(
        &self,
        assessment: CompletedAssessment,
    ) -> Result<CompletedAssessment, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.assessments.contains_key(&assessment.id) {
            return Err(StoreError::Conflict("assessment id already in use".to_string()));
        }
        inner.assessments.insert(assessment.id, assessment.clone());
        Ok(assessment)
    }

    async fn find_assessment(&self, id: Uuid) -> Result<Option<CompletedAssessment>, StoreError> {
        Ok(self.inner.read().await.assessments.get(&id).cloned())
    }

    async fn list_user_assessments(
        &self,
        user_id: &str,
    ) -> Result<Vec<CompletedAssessment>, StoreError> {
        let inner = self.inner.read().await;
        let mut list: Vec<_> = inner
            .assessments
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(list)
    }

    async fn list_open_drafts(
        &self,
        query: DraftQuery,
    ) -> Result<(Vec<DraftAssessment>, usize), StoreError> {
        let inner = self.inner.read().await;
        let mut open: Vec<_> = inner
            .drafts
            .values()
            .filter(|d| d.status == DraftStatus::Draft)
            .filter(|d| query.idle_before.is_none_or(|cutoff| d.last_answered_at < cutoff))
            .cloned()
            .collect();
        open.sort_by(|a, b| b.last_answered_at.cmp(&a.last_answered_at));

        let total = open.len();
        let page = open
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();
        Ok((page, total))
    }

    async fn delete_superseded_drafts(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let finished: HashSet<String> = inner
            .assessments
            .values()
            .map(|a| a.user_id.clone())
            .collect();

        let doomed: Vec<(Uuid, String)> = inner
            .drafts
            .values()
            .filter(|d| d.status == DraftStatus::Draft && finished.contains(&d.user_id))
            .map(|d| (d.id, d.resume_token.clone()))
            .collect();

        for (id, token) in &doomed {
            inner.drafts.remove(id);
            inner.tokens.remove(token);
        }
        Ok(doomed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{answer::Answer, assessment::Zone};
    use std::sync::Arc;

    fn draft(user: &str) -> DraftAssessment {
        DraftAssessment::new(
            Uuid::new_v4(),
            crate::utils::resume_token::generate(),
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

    #[tokio::test]
    async fn test_token_lookup_returns_bound_draft() {
        let store = MemoryDraftStore::new();
        let d = store.insert_draft(draft("u1")).await.unwrap();

        let found = store.find_draft_by_token(&d.resume_token).await.unwrap();
        assert_eq!(found.map(|f| f.id), Some(d.id));
        assert!(store.find_draft_by_token("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_token_is_a_conflict() {
        let store = MemoryDraftStore::new();
        let first = store.insert_draft(draft("u1")).await.unwrap();
        let mut second = draft("u1");
        second.resume_token = first.resume_token.clone();

        let err = store.insert_draft(second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_progress_on_completed_draft_is_refused() {
        let store = MemoryDraftStore::new();
        let d = store.insert_draft(draft("u1")).await.unwrap();
        store.complete_draft(d.id, assessment("u1")).await.unwrap();

        let update = ProgressUpdate {
            answers: vec![Answer::new("q1", 0)],
            current_question_index: 0,
            seq: None,
        };
        let err = store.apply_progress(d.id, &update, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyCompleted));
    }

    #[tokio::test]
    async fn test_concurrent_completion_creates_one_record() {
        let store = Arc::new(MemoryDraftStore::new());
        let id = store.insert_draft(draft("u1")).await.unwrap().id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.complete_draft(id, assessment("u1")).await.unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            let completion = handle.await.unwrap();
            if matches!(completion, Completion::Created(_)) {
                created += 1;
            }
            assert_eq!(completion.into_assessment().id, id);
        }
        assert_eq!(created, 1);
        assert_eq!(store.list_user_assessments("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_superseded_drafts() {
        let store = MemoryDraftStore::new();
        let done = store.insert_draft(draft("u1")).await.unwrap();
        let leftover = store.insert_draft(draft("u1")).await.unwrap();
        let other = store.insert_draft(draft("u2")).await.unwrap();
        store.complete_draft(done.id, assessment("u1")).await.unwrap();

        assert_eq!(store.delete_superseded_drafts().await.unwrap(), 1);
        assert!(store.find_draft(leftover.id).await.unwrap().is_none());
        assert!(store.find_draft(other.id).await.unwrap().is_some());
        assert!(store.find_draft(done.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_open_drafts_pages_and_filters() {
        let store = MemoryDraftStore::new();
        for i in 0..5 {
            let mut d = draft(&format!("u{}", i));
            d.last_answered_at = Utc::now() - chrono::Duration::hours(i * 10);
            store.insert_draft(d).await.unwrap();
        }

        let (page, total) = store
            .list_open_drafts(DraftQuery {
                offset: 1,
                limit: 2,
                idle_before: None,
            })
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].user_id, "u1");

        let (stale, total) = store
            .list_open_drafts(DraftQuery {
                offset: 0,
                limit: 10,
                idle_before: Some(Utc::now() - chrono::Duration::hours(24)),
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(stale.iter().all(|d| d.user_id == "u3" || d.user_id == "u4"));
    }
}
