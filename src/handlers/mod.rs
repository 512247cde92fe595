//! HTTP handlers, one module per CRM resource.

pub mod activities;
pub mod api_keys;
pub mod common;
pub mod companies;
pub mod contacts;
pub mod data_export;
pub mod deals;
pub mod personal_notes;
pub mod pipeline_stages;
pub mod reports;
pub mod webhooks;
