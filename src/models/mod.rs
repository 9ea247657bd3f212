// src/models/mod.rs

pub mod answer;
pub mod assessment;
pub mod draft;
pub mod question;
