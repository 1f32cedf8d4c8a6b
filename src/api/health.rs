use axum::response::Json;
use serde_json::{Value, json};

use crate::config::APP_NAME;

/// Liveness probe of the redirect listener.
pub async fn health() -> Json<Value> {
    Json(json!({
        "service": APP_NAME,
        "status": "waiting-for-callback",
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().timestamp(),
    }))
}
