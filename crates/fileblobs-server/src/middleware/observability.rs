//! Request ids, sensitive header redaction and request tracing.

use axum::Router;
use axum::http::header;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Header carrying the request id.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extension trait for `axum::`[`Router`] to apply observability middleware.
pub trait RouterObservabilityExt<S> {
    /// Assigns (or keeps) an `x-request-id`, echoes it on the response,
    /// redacts `Authorization` and `Cookie` and traces every request.
    fn with_observability(self) -> Self;
}

impl<S> RouterObservabilityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability(self) -> Self {
        self.layer(PropagateRequestIdLayer::new(
            header::HeaderName::from_static(REQUEST_ID_HEADER),
        ))
        .layer(SetSensitiveRequestHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(
            header::HeaderName::from_static(REQUEST_ID_HEADER),
            MakeRequestUuid,
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use axum_test::TestServer;

    use super::*;

    #[tokio::test]
    async fn request_id_is_generated_and_propagated() -> anyhow::Result<()> {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .with_observability();
        let server = TestServer::new(router)?;

        let response = server.get("/").await;
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let response = server
            .get("/")
            .add_header(REQUEST_ID_HEADER, "abc-123")
            .await;
        assert_eq!(response.header(REQUEST_ID_HEADER), "abc-123");
        Ok(())
    }
}
