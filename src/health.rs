use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Minimal liveness probe: a fixed "ok" status plus the session gauge.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let config = state.get_config();

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": "speech-relay-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "sessions": {
            "active": state.limiter().active(),
            "max": state.limiter().max_sessions()
        }
    }))
}
