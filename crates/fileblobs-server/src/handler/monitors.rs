//! Liveness endpoint.

use axum::Router;
use axum::routing::get;

use super::response::Health;
use crate::extract::Json;
use crate::service::ServiceState;

#[tracing::instrument(skip_all)]
async fn health() -> Json<Health> {
    Json(Health::default())
}

/// Returns a [`Router`] with the health route.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use crate::handler::test::create_test_context;

    #[tokio::test]
    async fn health_is_public() -> anyhow::Result<()> {
        let context = create_test_context().await?;

        let response = context.server.get("/health").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
        Ok(())
    }
}
