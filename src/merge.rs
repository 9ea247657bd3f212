// src/merge.rs

//! Keyed merging of answer lists.
//!
//! Every function here keeps at most one answer per question id and preserves
//! the order in which question ids first appeared. They are pure, so a save
//! can be retried any number of times without corrupting stored state.

use crate::models::answer::Answer;

/// Records `incoming`, replacing an existing answer to the same question in
/// place or appending it.
pub fn merge(existing: &[Answer], incoming: Answer) -> Vec<Answer> {
    let mut merged = existing.to_vec();
    upsert(&mut merged, incoming);
    merged
}

/// Folds every answer of `incoming` into `existing`, last write wins.
pub fn merge_all(existing: &[Answer], incoming: &[Answer]) -> Vec<Answer> {
    let mut merged = existing.to_vec();
    for answer in incoming {
        upsert(&mut merged, answer.clone());
    }
    merged
}

/// Adds only the answers of `incoming` whose question is still unanswered.
/// Used for saves known to be older than what is already stored.
pub fn merge_missing(existing: &[Answer], incoming: &[Answer]) -> Vec<Answer> {
    let mut merged = existing.to_vec();
    for answer in incoming {
        if find(&merged, &answer.question_id).is_none() {
            merged.push(answer.clone());
        }
    }
    merged
}

/// Collapses duplicates of an arbitrary list.
pub fn dedupe(answers: &[Answer]) -> Vec<Answer> {
    merge_all(&[], answers)
}

/// Recorded score for `question_id`, if any.
pub fn find<'a>(answers: &'a [Answer], question_id: &str) -> Option<&'a Answer> {
    answers.iter().find(|a| a.question_id == question_id)
}

fn upsert(answers: &mut Vec<Answer>, incoming: Answer) {
    match answers
        .iter_mut()
        .find(|a| a.question_id == incoming.question_id)
    {
        Some(slot) => *slot = incoming,
        None => answers.push(incoming),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn list(pairs: &[(&str, i64)]) -> Vec<Answer> {
        pairs.iter().map(|(q, a)| Answer::new(*q, *a)).collect()
    }

    fn ids_unique(answers: &[Answer]) -> bool {
        let ids: HashSet<_> = answers.iter().map(|a| a.question_id.as_str()).collect();
        ids.len() == answers.len()
    }

    #[test]
    fn test_merge_appends_new_question() {
        let merged = merge(&list(&[("q1", 2)]), Answer::new("q2", 1));
        assert_eq!(merged, list(&[("q1", 2), ("q2", 1)]));
    }

    #[test]
    fn test_merge_replaces_in_place() {
        let merged = merge(&list(&[("q1", 2), ("q2", 1), ("q3", 3)]), Answer::new("q2", 0));
        assert_eq!(merged, list(&[("q1", 2), ("q2", 0), ("q3", 3)]));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let base = list(&[("q1", 2), ("q2", 1)]);
        for incoming in [Answer::new("q2", 3), Answer::new("q9", 0)] {
            let once = merge(&base, incoming.clone());
            let twice = merge(&once, incoming);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_zero_score_is_an_answer() {
        let merged = merge(&[], Answer::new("q1", 0));
        assert_eq!(find(&merged, "q1").map(|a| a.answer), Some(0));
        assert!(find(&merged, "q2").is_none());
    }

    #[test]
    fn test_merge_all_keeps_union_and_first_position() {
        let stored = list(&[("q1", 1), ("q2", 2)]);
        let partial = list(&[("q3", 3), ("q1", 0)]);
        let merged = merge_all(&stored, &partial);
        assert_eq!(merged, list(&[("q1", 0), ("q2", 2), ("q3", 3)]));
        assert!(ids_unique(&merged));
    }

    #[test]
    fn test_merge_missing_never_overwrites() {
        let stored = list(&[("q1", 1)]);
        let stale = list(&[("q1", 2), ("q2", 3)]);
        assert_eq!(merge_missing(&stored, &stale), list(&[("q1", 1), ("q2", 3)]));
    }

    #[test]
    fn test_dedupe_last_write_wins() {
        let deduped = dedupe(&list(&[("q1", 1), ("q2", 2), ("q1", 3), ("q1", 0)]));
        assert_eq!(deduped, list(&[("q1", 0), ("q2", 2)]));
    }
}
