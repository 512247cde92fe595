//! Router assembly.

mod common;
mod crm;

pub use common::common_routes;
pub use crm::{crm_routes, MAX_BODY_BYTES};

use crate::state::AppState;
use axum::Router;

/// Health routes at the root, CRM routes under `/api`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api", crm_routes(state))
}
