use axum::Json;
use serde_json::{Value, json};

/// `GET /` service banner.
pub async fn banner() -> Json<Value> {
    Json(json!({
        "message": "Pharmacy directory API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "pharmacies": "/api/pharmacies",
            "scrape": "/api/scrape",
            "search": "/api/pharmacies/search",
            "stats": "/api/stats",
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
