//! HTTP server startup and graceful shutdown.

mod error;
mod http_server;
mod shutdown;

pub use error::{Result, ServerError};
pub use http_server::serve;
use shutdown::shutdown_signal;
