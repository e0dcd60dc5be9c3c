mod join;
mod link;

pub use join::*;
pub use link::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/platform/update", post(handle_platform_update))
        .route("/platform/links/{token}/validity", get(check_link_validity))
        .route("/link/request", post(request_linking_code))
        .route("/link/verify", post(verify_linking_code))
}
