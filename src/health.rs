use axum::Json;
use serde_json::{json, Value};

/// GET /health
///
/// Liveness probe; reports the service name and version.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
