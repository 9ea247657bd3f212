// src/handlers/questions.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::catalog::{Catalog, DEFAULT_LANGUAGE};

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    pub lang: Option<String>,
}

/// Returns the question tree for a language.
/// Unknown codes fall back to the default language.
pub async fn get_questions(
    State(catalog): State<Arc<Catalog>>,
    Query(query): Query<QuestionsQuery>,
) -> impl IntoResponse {
    let lang = query.lang.as_deref().unwrap_or(DEFAULT_LANGUAGE);
    Json(catalog.lookup(lang).clone())
}

/// Lists the languages a questionnaire is available in.
pub async fn list_languages(State(catalog): State<Arc<Catalog>>) -> impl IntoResponse {
    Json(json!({ "languages": catalog.languages() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_unknown_language_is_served_in_english() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let query = QuestionsQuery {
            lang: Some("de".to_string()),
        };

        let response = get_questions(State(catalog.clone()), Query(query))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = list_languages(State(catalog)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
