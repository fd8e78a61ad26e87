pub mod api;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use sqlx::PgPool;

use crate::models::store::VacancyStore;
use crate::sources::SourceRegistry;

/// Shared handler state: the source registry and the vacancy store.
#[derive(Clone)]
pub struct AppState {
    pub sources: Arc<SourceRegistry>,
    pub store: Arc<dyn VacancyStore>,
}

/// `/healthz` liveness and `/readyz` database readiness endpoints.
pub fn health_router(pool: PgPool) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(pool)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(pool): State<PgPool>) -> (StatusCode, &'static str) {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!("Database not ready: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "not ready")
        }
    }
}
