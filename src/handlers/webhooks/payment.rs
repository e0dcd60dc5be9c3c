//! Payment-provider webhook: the "payment succeeded" fact that starts the
//! whole issuance pipeline.
//!
//! Providers retry on 5xx, so a row that simply is not there gets a 200 and
//! a log line; retrying will not make it appear. Signature failures are the
//! exception: those are 401 so a misconfigured secret is loud.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::db::{AppState, queries};
use crate::models::PurchaseStatus;
use crate::workflow;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct PaymentEvent {
    event: String,
    purchase_id: String,
}

pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = match headers.get("x-signature").and_then(|v| v.to_str().ok()) {
        Some(s) => s.to_string(),
        None => return (StatusCode::BAD_REQUEST, "Missing x-signature header"),
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let tenant = match queries::get_tenant_by_id(&conn, &tenant_id) {
        Ok(Some(t)) => t,
        Ok(None) => return (StatusCode::OK, "Unknown tenant"),
        Err(e) => {
            tracing::error!("DB error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let Some(secret_blob) = tenant.webhook_secret.as_deref() else {
        return (StatusCode::OK, "Webhook not configured");
    };
    let secret = match state.master_key.decrypt(&tenant.id, secret_blob) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("webhook secret decrypt failed for tenant {}: {}", tenant.id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error");
        }
    };

    if !verify_signature(&secret, &body, &signature) {
        return (StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let event: PaymentEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("failed to parse payment webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    let purchase = match queries::get_purchase_by_id(&conn, &event.purchase_id) {
        Ok(Some(p)) if p.tenant_id == tenant.id => p,
        Ok(_) => {
            tracing::warn!(
                "payment event for unknown purchase {} (tenant {})",
                event.purchase_id,
                tenant.id
            );
            return (StatusCode::OK, "Unknown purchase");
        }
        Err(e) => {
            tracing::error!("DB error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    match event.event.as_str() {
        "payment.succeeded" => {
            if let Err(e) = queries::set_purchase_status(&conn, &purchase.id, PurchaseStatus::Success)
            {
                tracing::error!("failed to mark purchase {} successful: {}", purchase.id, e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
            }
            tracing::info!("purchase {} marked successful", purchase.id);

            // Gate + issue. An incomplete workflow here is normal: the next
            // prerequisite event re-runs this path.
            match workflow::issue_if_ready(
                &conn,
                &state.bot,
                &purchase.subscriber_id,
                Some(&purchase.id),
            )
            .await
            {
                Ok(readiness) if readiness.issued => (StatusCode::OK, "Links issued"),
                Ok(readiness) if !readiness.missing_steps.is_empty() => {
                    (StatusCode::OK, "Awaiting prerequisites")
                }
                Ok(_) => (StatusCode::OK, "Recorded, delivery pending"),
                Err(e) => {
                    // The success fact is persisted; delivery remains
                    // recoverable through the admin sweep.
                    tracing::error!("issuance after payment {} failed: {}", purchase.id, e);
                    (StatusCode::OK, "Recorded, delivery pending")
                }
            }
        }
        "payment.failed" => {
            if let Err(e) = queries::set_purchase_status(&conn, &purchase.id, PurchaseStatus::Failed)
            {
                tracing::error!("failed to mark purchase {} failed: {}", purchase.id, e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
            }
            (StatusCode::OK, "Recorded")
        }
        _ => (StatusCode::OK, "Event ignored"),
    }
}

fn verify_signature(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex.trim()) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    expected.as_slice().ct_eq(provided.as_slice()).into()
}
