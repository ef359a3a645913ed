// handlers/public/root.rs - GET / service information

use axum::response::Json;
use serde_json::{json, Value};

/**
 * GET / - Service name, version and route map
 */
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "INSS API",
            "version": version,
            "description": "Benefit-balance records gated by per-IP access grants",
            "endpoints": {
                "home": "/ (public)",
                "test": "/test (public - database connectivity)",
                "limit": "/api/limit (public - remaining quota for the caller IP)",
                "records": "/api/insert, /api/delete, /api/download, /api/query-inss (active grant)",
                "auth_ips": "/api/auth-ips[/:id] (admin allowlist)",
            }
        }
    }))
}
