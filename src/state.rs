//! Shared application state for all routes.

use crate::config::{ResolvedEntity, ResolvedModel, Settings};
use crate::error::{AppError, ConfigError};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub model: Arc<ResolvedModel>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(pool: PgPool, model: ResolvedModel, settings: Settings) -> Self {
        AppState {
            pool,
            model: Arc::new(model),
            settings: Arc::new(settings),
        }
    }

    /// Entity by path segment; a missing entity is a model bug, not a client error.
    pub fn entity(&self, path: &str) -> Result<&ResolvedEntity, AppError> {
        self.model.entity_by_path(path).ok_or_else(|| {
            AppError::Config(ConfigError::MissingReference {
                kind: "entity",
                id: path.to_string(),
            })
        })
    }
}
