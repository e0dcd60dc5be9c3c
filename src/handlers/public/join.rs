//! Inbound platform updates: join requests against issued links, and
//! membership changes that may trigger recovery.
//!
//! The platform retries updates it could not deliver, so this endpoint
//! answers 200 even when an update is ignored or a downstream step fails;
//! everything actionable is in the logs and the ledger.

use axum::{Json, extract::Path, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::membership;
use crate::messaging::JoinLinkProvider;
use crate::models::LeaveReason;

#[derive(Debug, Deserialize)]
pub struct PlatformUpdate {
    #[serde(default)]
    pub chat_join_request: Option<ChatJoinRequest>,
    #[serde(default)]
    pub chat_member: Option<ChatMemberUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: ChatRef,
    pub from: UserRef,
    #[serde(default)]
    pub invite_link: Option<InviteLinkRef>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMemberUpdate {
    pub chat: ChatRef,
    pub new_chat_member: ChatMemberState,
}

#[derive(Debug, Deserialize)]
pub struct ChatMemberState {
    pub status: String,
    pub user: UserRef,
}

#[derive(Debug, Deserialize)]
pub struct ChatRef {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UserRef {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct InviteLinkRef {
    pub invite_link: String,
}

pub async fn handle_platform_update(
    State(state): State<AppState>,
    Json(update): Json<PlatformUpdate>,
) -> Json<Value> {
    if let Some(join) = update.chat_join_request {
        handle_join_request(&state, join).await;
        return Json(json!({ "ok": true, "handled": "chat_join_request" }));
    }

    if let Some(member) = update.chat_member {
        handle_member_update(&state, member).await;
        return Json(json!({ "ok": true, "handled": "chat_member" }));
    }

    Json(json!({ "ok": true, "handled": "ignored" }))
}

/// Validate and atomically consume the link behind a join request, then
/// approve or decline on the platform.
async fn handle_join_request(state: &AppState, join: ChatJoinRequest) {
    let channel_id = join.chat.id.to_string();
    let user_id = join.from.id.to_string();

    let Some(invite) = join.invite_link else {
        tracing::warn!("join request without invite link in channel {}", channel_id);
        decline(state, &channel_id, &user_id).await;
        return;
    };

    let token = invite
        .invite_link
        .rsplit('/')
        .next()
        .unwrap_or(invite.invite_link.as_str())
        .to_string();

    // The consume is the admission decision: one compare-and-swap against
    // the ledger. A replayed or shared link loses the race and is declined.
    let consumed = {
        let conn = match state.db.get() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("db unavailable during join request: {}", e);
                return;
            }
        };
        match queries::consume_link(&conn, &token, &user_id) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("consume failed for token {}: {}", token, e);
                false
            }
        }
    };

    if !consumed {
        tracing::info!(
            "denied join for user {} in channel {}: token invalid or already used",
            user_id,
            channel_id
        );
        decline(state, &channel_id, &user_id).await;
        return;
    }

    if let Err(e) = state.bot.approve_join(&channel_id, &user_id).await {
        // The ledger entry stays consumed: the subscriber can retry the
        // join request and the platform remembers the approval state, but
        // the link can never admit anyone else.
        tracing::error!(
            "approve failed for user {} in channel {}: {}",
            user_id,
            channel_id,
            e
        );
        return;
    }

    tracing::info!("approved join for user {} in channel {}", user_id, channel_id);

    // Used links are revoked platform-side so the URL stops resolving.
    if let Err(e) = state.bot.revoke_join_link(&channel_id, &invite.invite_link).await {
        tracing::warn!("revoke failed for used link in channel {}: {}", channel_id, e);
    }
}

async fn handle_member_update(state: &AppState, member: ChatMemberUpdate) {
    let reason = match member.new_chat_member.status.as_str() {
        "left" => LeaveReason::Left,
        "kicked" => LeaveReason::Kicked,
        "banned" => LeaveReason::Banned,
        // Joins and promotions are not this engine's business.
        _ => return,
    };

    let channel_id = member.chat.id.to_string();
    let user_id = member.new_chat_member.user.id.to_string();

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("db unavailable during member update: {}", e);
            return;
        }
    };

    match membership::record_leave(&conn, &state.bot, &channel_id, &user_id, reason).await {
        Ok(outcome) => {
            tracing::info!(
                "membership update processed for user {} in channel {}: {:?}",
                user_id,
                channel_id,
                std::mem::discriminant(&outcome)
            );
        }
        Err(e) => {
            tracing::error!(
                "membership recovery failed for user {} in channel {}: {}",
                user_id,
                channel_id,
                e
            );
        }
    }
}

async fn decline(state: &AppState, channel_id: &str, user_id: &str) {
    if let Err(e) = state.bot.decline_join(channel_id, user_id).await {
        tracing::warn!("decline failed for user {} in channel {}: {}", user_id, channel_id, e);
    }
}

#[derive(Debug, Serialize)]
pub struct ValidityResponse {
    pub valid: bool,
}

/// Read-only validity probe: a link is valid iff it exists and is
/// unconsumed. No time window is applied on this path.
pub async fn check_link_validity(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ValidityResponse>> {
    let conn = state.db.get()?;
    let valid = queries::get_unconsumed_link_by_token(&conn, &token)?.is_some();
    Ok(Json(ValidityResponse { valid }))
}
