// src/handlers/mod.rs

pub mod admin;
pub mod assessments;
pub mod drafts;
pub mod questions;
