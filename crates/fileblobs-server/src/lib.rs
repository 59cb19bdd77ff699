#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;

pub mod extract;
pub mod handler;
pub mod middleware;
pub mod service;

pub use crate::error::{BoxedError, Error, ErrorKind, Result};

/// Tracing target for authentication.
pub const TRACING_TARGET_AUTHENTICATION: &str = "fileblobs_server::extract::authentication";

/// Tracing target for authorization.
pub const TRACING_TARGET_AUTHORIZATION: &str = "fileblobs_server::extract::authorization";
