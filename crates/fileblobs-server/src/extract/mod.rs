//! HTTP request extractors.
//!
//! Every extractor rejects with the server's JSON [`Error`] so clients see a
//! uniform error body regardless of which part of the request was invalid.
//!
//! [`Error`]: crate::handler::Error

pub mod auth;
pub mod reject;

pub use crate::extract::auth::{
    AuthSource, AuthState, Capabilities, Capability, IdentityClaims, Principal, Role,
    SESSION_COOKIE,
};
pub use crate::extract::reject::{Form, FormOrJson, Json, Path, Query, ValidateJson};
pub use crate::{TRACING_TARGET_AUTHENTICATION, TRACING_TARGET_AUTHORIZATION};
