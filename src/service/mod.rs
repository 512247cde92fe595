//! Services: generic CRUD, request validation, API keys, reporting aggregates.

mod crud;
mod validation;
pub mod api_keys;
pub mod reports;

pub use crud::{to_api, CrudService, Page};
pub use validation::{is_canonical_uuid, RequestValidator};
