//! CRM feature pack: contacts, companies, deals, activities, pipeline stages, personal notes,
//! webhooks, reports and data export over PostgreSQL, served as an axum router.

pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_model, ResolvedEntity, ResolvedModel, Settings};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use routes::{app, common_routes, crm_routes};
pub use state::AppState;
pub use store::{ensure_database_exists, seed_pipeline_stages};
