use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{sql_query, RunQueryDsl};
use serde_json::json;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database = match state.db() {
        Ok(mut conn) => match sql_query("SELECT 1").execute(&mut conn) {
            Ok(_) => "connected".to_string(),
            Err(err) => {
                tracing::error!(error = %err, "health check query failed");
                "unavailable".to_string()
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "health check could not get a connection");
            "unavailable".to_string()
        }
    };

    let status = if database == "connected" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "success": status == StatusCode::OK,
            "message": if status == StatusCode::OK { "ok" } else { "database unavailable" },
            "data": { "database": database },
        })),
    )
}
