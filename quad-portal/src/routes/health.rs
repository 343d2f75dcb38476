use axum::Json;
use quad_shared::types::api::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("quad-portal", env!("CARGO_PKG_VERSION")))
}
