// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{catalog::Catalog, config::Config, services::DraftService};

#[derive(Clone)]
pub struct AppState {
    pub drafts: DraftService,
    pub catalog: Arc<Catalog>,
    pub config: Config,
}

impl FromRef<AppState> for DraftService {
    fn from_ref(state: &AppState) -> Self {
        state.drafts.clone()
    }
}

impl FromRef<AppState> for Arc<Catalog> {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
