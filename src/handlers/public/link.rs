//! Subscriber ↔ messaging-identity linking.
//!
//! A subscriber proves control of a messaging account by echoing back a
//! short-lived code the bot sends there. Codes are stored hashed with a
//! 5-minute TTL so verification works on any instance and survives
//! restarts. A successful link immediately retries the subscriber's
//! undelivered purchases.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::crypto::hash_secret;
use crate::db::{AppState, queries};
use crate::delivery;
use crate::error::{AppError, Result};
use crate::messaging::JoinLinkProvider;

const LINKING_CODE_TTL_MINUTES: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub tenant_id: String,
    pub phone: String,
    pub messaging_id: String,
}

#[derive(Debug, Serialize)]
pub struct LinkRequestResponse {
    pub link_id: String,
    pub expires_in: i64,
}

pub async fn request_linking_code(
    State(state): State<AppState>,
    Json(input): Json<LinkRequest>,
) -> Result<Json<LinkRequestResponse>> {
    let conn = state.db.get()?;

    let subscriber = queries::get_subscriber_by_phone(&conn, &input.tenant_id, &input.phone)?
        .ok_or_else(|| AppError::NotFound("No subscriber with this phone number".into()))?;

    // One messaging identity maps to at most one subscriber.
    if let Some(existing) = queries::get_subscriber_by_messaging_id(&conn, &input.messaging_id)? {
        if existing.id != subscriber.id {
            return Err(AppError::Conflict(
                "This messaging account is already linked to another subscriber".into(),
            ));
        }
    }

    let (code_record, code) =
        queries::create_linking_code(&conn, &subscriber.id, &input.messaging_id)?;

    let text = format!(
        "Your account linking code is {}. It expires in {} minutes. \
         If you didn't request this, ignore this message.",
        code, LINKING_CODE_TTL_MINUTES
    );
    if let Err(e) = state.bot.send_message(&input.messaging_id, &text).await {
        // The subscriber can still receive the code out of band.
        tracing::warn!("could not deliver linking code to {}: {}", input.messaging_id, e);
    }

    Ok(Json(LinkRequestResponse {
        link_id: code_record.id,
        expires_in: LINKING_CODE_TTL_MINUTES * 60,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LinkVerify {
    pub link_id: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct LinkVerifyResponse {
    pub linked: bool,
    pub subscriber_id: String,
    pub retried_deliveries: usize,
}

pub async fn verify_linking_code(
    State(state): State<AppState>,
    Json(input): Json<LinkVerify>,
) -> Result<Json<LinkVerifyResponse>> {
    let conn = state.db.get()?;

    let record = queries::get_linking_code_by_id(&conn, &input.link_id)?
        .ok_or_else(|| AppError::NotFound("Link request not found or expired".into()))?;

    if record.used {
        return Err(AppError::BadRequest("Linking code already used".into()));
    }
    if Utc::now().timestamp() > record.expires_at {
        return Err(AppError::BadRequest(
            "Linking code has expired. Request a new one.".into(),
        ));
    }
    if hash_secret(&input.code) != record.code_hash {
        return Err(AppError::BadRequest("Invalid linking code".into()));
    }

    queries::link_messaging_identity(&conn, &record.subscriber_id, &record.messaging_id)?;
    queries::mark_linking_code_used(&conn, &record.id)?;

    tracing::info!(
        "linked messaging identity {} to subscriber {}",
        record.messaging_id,
        record.subscriber_id
    );

    // Purchases that succeeded before the identity existed can now be
    // delivered; failures here stay recoverable via the admin sweep.
    let mut retried = 0;
    let undelivered = queries::list_undelivered_for_subscriber(&conn, &record.subscriber_id)?;
    for purchase in undelivered {
        match delivery::deliver_missing(&conn, &state.bot, &record.subscriber_id, &purchase.id)
            .await
        {
            Ok(_) => retried += 1,
            Err(e) => {
                tracing::warn!(
                    "post-link delivery retry failed for purchase {}: {}",
                    purchase.id,
                    e
                );
            }
        }
    }

    Ok(Json(LinkVerifyResponse {
        linked: true,
        subscriber_id: record.subscriber_id,
        retried_deliveries: retried,
    }))
}
