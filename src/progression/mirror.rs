// src/progression/mirror.rs

//! Local copy of a session, kept only to survive restarts and outages.
//!
//! The server stays authoritative. A session must behave the same with no
//! mirror at all.

use std::{
    fs, io,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{answer::Answer, assessment::CompletedAssessment, question::Question};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("mirror I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("mirror record is unreadable: {0}")]
    Format(#[from] serde_json::Error),
}

/// Everything needed to rebuild a session locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorRecord {
    pub user: String,
    pub language: String,
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub assessment: Option<CompletedAssessment>,
    #[serde(default)]
    pub assessment_id: Option<Uuid>,
    #[serde(default)]
    pub resume_token: Option<String>,
    #[serde(default)]
    pub seq: i64,
}

pub trait Mirror: Send + Sync {
    fn load(&self) -> Result<Option<MirrorRecord>, MirrorError>;
    fn store(&self, record: &MirrorRecord) -> Result<(), MirrorError>;
    fn clear(&self) -> Result<(), MirrorError>;
}

/// Single JSON file holding the current record.
#[derive(Debug, Clone)]
pub struct FileMirror {
    path: PathBuf,
}

impl FileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Mirror for FileMirror {
    fn load(&self) -> Result<Option<MirrorRecord>, MirrorError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, record: &MirrorRecord) -> Result<(), MirrorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves a torn record.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(record)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), MirrorError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
