// src/catalog.rs

//! Read-only question catalog lookup, one catalog per language.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use crate::models::question::QuestionCatalog;

pub const DEFAULT_LANGUAGE: &str = "en";

const BUNDLED: &[(&str, &str, &str)] = &[
    ("en", "English", include_str!("../data/questions/en.json")),
    ("fr", "Français", include_str!("../data/questions/fr.json")),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse catalog '{language}': {source}")]
    Parse {
        language: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog '{language}' declares question '{question_id}' more than once")]
    DuplicateQuestion {
        language: String,
        question_id: String,
    },

    #[error("catalog '{language}' has question '{question_id}' without options")]
    NoOptions {
        language: String,
        question_id: String,
    },

    #[error("no catalog for default language '{0}'")]
    MissingDefault(String),
}

/// All catalogs known to the service.
#[derive(Debug, Clone)]
pub struct Catalog {
    catalogs: HashMap<String, QuestionCatalog>,
    names: BTreeMap<String, String>,
    fallback: QuestionCatalog,
}

impl Catalog {
    /// Loads the catalogs shipped under `data/questions`.
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut entries = Vec::with_capacity(BUNDLED.len());
        for (code, name, raw) in BUNDLED {
            let mut catalog: QuestionCatalog =
                serde_json::from_str(raw).map_err(|source| CatalogError::Parse {
                    language: code.to_string(),
                    source,
                })?;
            catalog.language = code.to_string();
            entries.push((name.to_string(), catalog));
        }
        Self::new(entries, DEFAULT_LANGUAGE)
    }

    /// Builds a catalog set from `(display name, catalog)` pairs.
    pub fn new(
        entries: impl IntoIterator<Item = (String, QuestionCatalog)>,
        default_language: &str,
    ) -> Result<Self, CatalogError> {
        let mut catalogs = HashMap::new();
        let mut names = BTreeMap::new();

        for (name, mut catalog) in entries {
            validate(&catalog)?;
            catalog.link_pillars();
            names.insert(catalog.language.clone(), name);
            catalogs.insert(catalog.language.clone(), catalog);
        }

        let fallback = catalogs
            .get(default_language)
            .cloned()
            .ok_or_else(|| CatalogError::MissingDefault(default_language.to_string()))?;

        Ok(Self {
            catalogs,
            names,
            fallback,
        })
    }

    /// Catalog for `language`, falling back to the default language for
    /// unknown codes.
    pub fn lookup(&self, language: &str) -> &QuestionCatalog {
        self.catalogs.get(language).unwrap_or(&self.fallback)
    }

    /// `code -> display name`, sorted by code.
    pub fn languages(&self) -> &BTreeMap<String, String> {
        &self.names
    }
}

fn validate(catalog: &QuestionCatalog) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for question in catalog.questions() {
        if !seen.insert(question.id.as_str()) {
            return Err(CatalogError::DuplicateQuestion {
                language: catalog.language.clone(),
                question_id: question.id.clone(),
            });
        }
        if question.options.is_empty() {
            return Err(CatalogError::NoOptions {
                language: catalog.language.clone(),
                question_id: question.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogs_load() {
        let catalog = Catalog::builtin().unwrap();
        let en = catalog.lookup("en");
        assert_eq!(en.pillars.len(), 9);
        assert_eq!(en.total_questions(), 15);
        assert_eq!(catalog.lookup("fr").total_questions(), 12);
        assert_eq!(catalog.languages().len(), 2);
    }

    #[test]
    fn test_questions_are_linked_to_pillars() {
        let catalog = Catalog::builtin().unwrap();
        let en = catalog.lookup("en");
        assert_eq!(en.question("f2").map(|q| q.pillar_id.as_str()), Some("finance"));
        assert_eq!(en.question_at(2).map(|q| q.id.as_str()), Some("o1"));
        assert_eq!(en.index_of("e1"), Some(14));
    }

    #[test]
    fn test_unknown_language_falls_back_to_default() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.lookup("de").language, "en");
        assert_eq!(catalog.lookup("fr").language, "fr");
        assert!(!catalog.languages().contains_key("de"));
    }

    #[test]
    fn test_duplicate_question_ids_are_rejected() {
        let raw = serde_json::json!({
            "language": "en",
            "pillars": [
                {"id": "a", "name": "A", "questions": [
                    {"id": "q1", "text": "?", "options": [{"label": "x", "score": 0}]}
                ]},
                {"id": "b", "name": "B", "questions": [
                    {"id": "q1", "text": "?", "options": [{"label": "x", "score": 0}]}
                ]}
            ]
        });
        let parsed: QuestionCatalog = serde_json::from_value(raw).unwrap();
        let err = Catalog::new([("English".to_string(), parsed)], "en").unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateQuestion { .. }));
    }
}
