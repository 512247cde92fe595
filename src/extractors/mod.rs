//! Request extractors: session user, bearer token, JSON body.

mod bearer;
mod json;
mod user;

pub use bearer::BearerToken;
pub use json::JsonBody;
pub use user::{SessionUser, USER_ID_HEADER};
