use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use dirtybox_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: CheckResult,
    pub message_log: CheckResult,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// Readiness needs the migrated message log, not just a reachable database:
/// without the turn table the webhook cannot reconstruct any funnel state.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let message_log = message_log_check(&state.db_pool).await;
    let ready = database.status == "ready" && message_log.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        message_log,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> CheckResult {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => CheckResult { status: "ready", detail: "database reachable".to_owned() },
        Err(error) => {
            CheckResult { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn message_log_check(pool: &DbPool) -> CheckResult {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversation_turns")
        .fetch_one(pool)
        .await
    {
        Ok(turns) => CheckResult { status: "ready", detail: format!("{turns} turns logged") },
        Err(error) => {
            CheckResult { status: "degraded", detail: format!("message log unavailable: {error}") }
        }
    }
}
