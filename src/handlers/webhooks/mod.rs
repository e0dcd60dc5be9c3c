mod payment;

pub use payment::*;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/hooks/payment/{tenant_id}", post(handle_payment_webhook))
}
