//! CRM resource routes. Static segments (`/deals/reassign`, `/pipeline-stages/reorder`) win over `/:id`.

use crate::handlers::{
    activities, api_keys, companies, contacts, data_export, deals, personal_notes, pipeline_stages, reports, webhooks,
};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn crm_routes(state: AppState) -> Router {
    Router::new()
        .route("/contacts", get(contacts::list).post(contacts::create))
        .route(
            "/contacts/:id",
            get(contacts::read).put(contacts::update).delete(contacts::delete),
        )
        .route("/companies", get(companies::list).post(companies::create))
        .route(
            "/companies/:id",
            get(companies::read).put(companies::update).delete(companies::delete),
        )
        .route("/deals", get(deals::list).post(deals::create))
        .route("/deals/reassign", post(deals::reassign))
        .route("/deals/:id", get(deals::read).put(deals::update).delete(deals::delete))
        .route("/activities", get(activities::list).post(activities::create))
        .route(
            "/activities/:id",
            get(activities::read).put(activities::update).delete(activities::delete),
        )
        .route(
            "/pipeline-stages",
            get(pipeline_stages::list).post(pipeline_stages::create),
        )
        .route("/pipeline-stages/reorder", put(pipeline_stages::reorder))
        .route(
            "/pipeline-stages/:id",
            get(pipeline_stages::read)
                .put(pipeline_stages::update)
                .delete(pipeline_stages::delete),
        )
        .route(
            "/personal-notes",
            get(personal_notes::list).post(personal_notes::create),
        )
        .route(
            "/personal-notes/:id",
            get(personal_notes::read)
                .put(personal_notes::update)
                .delete(personal_notes::delete),
        )
        .route(
            "/webhooks",
            get(webhooks::list)
                .post(webhooks::create)
                .put(webhooks::update_by_body)
                .delete(webhooks::delete_by_query),
        )
        .route(
            "/webhooks/:id",
            get(webhooks::read).put(webhooks::update).delete(webhooks::delete),
        )
        .route("/api-keys", get(api_keys::list).post(api_keys::create))
        .route("/api-keys/:id", axum::routing::delete(api_keys::delete))
        .route("/metrics", get(reports::metrics))
        .route("/reports/acv", get(reports::acv))
        .route("/reports/close-rate", get(reports::close_rate))
        .route("/reports/sales-cycle", get(reports::sales_cycle))
        .route("/reports/pipeline-health", get(reports::pipeline_health))
        .route("/data-export", get(data_export::export))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
