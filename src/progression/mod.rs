// src/progression/mod.rs

//! Client-side progression through a questionnaire.

pub mod api;
pub mod http;
pub mod machine;
pub mod mirror;
pub mod session;

pub use api::{ApiError, AssessmentApi};
pub use http::HttpApi;
pub use machine::{Effect, Event, Phase, ProgressionState, Snapshot, TransitionError, reduce};
pub use mirror::{FileMirror, Mirror, MirrorRecord};
pub use session::{AssessmentSession, SessionError};
