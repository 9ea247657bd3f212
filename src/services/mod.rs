// src/services/mod.rs

pub mod drafts;

pub use drafts::DraftService;
