//! Membership recovery: reacts to a subscriber leaving a channel while
//! still entitled and hands them one short-lived way back in.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::db::queries::NewMembershipEvent;
use crate::error::Result;
use crate::issuer::{self, IssueRequest};
use crate::messaging::JoinLinkProvider;
use crate::models::{AccessLink, LeaveReason, MembershipEvent, Purchase, PurchaseStatus};

/// Re-entry window for recovery links. Deliberately short and independent
/// of the remaining subscription.
const RECOVERY_WINDOW_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LeaveOutcome {
    /// The messaging identity is not linked to any subscriber.
    UnknownSubscriber,
    /// The subscriber holds no active entitlement for this channel.
    NoEntitlement,
    /// Leave recorded; no automatic recovery for kicked/banned, which may
    /// signal a policy violation and needs a human decision.
    Recorded { event: MembershipEvent },
    /// Voluntary leave while entitled: one recovery link minted.
    Recovered {
        event: MembershipEvent,
        link: AccessLink,
    },
    /// Leave recorded but the recovery mint failed; a later delivery sweep
    /// or manual regeneration picks this up.
    RecoveryFailed { event: MembershipEvent },
}

/// Handle a channel-leave notification from the platform.
///
/// Voluntary departures with an active entitlement get exactly one recovery
/// link: prior pending links for that channel are soft-expired first, then
/// a fresh link is minted with a 7-day soft expiry.
pub async fn record_leave<P: JoinLinkProvider>(
    conn: &Connection,
    provider: &P,
    channel_external_id: &str,
    messaging_id: &str,
    reason: LeaveReason,
) -> Result<LeaveOutcome> {
    let Some(subscriber) = queries::get_subscriber_by_messaging_id(conn, messaging_id)? else {
        tracing::info!(
            "leave from unlinked messaging identity {} in channel {}",
            messaging_id,
            channel_external_id
        );
        return Ok(LeaveOutcome::UnknownSubscriber);
    };

    let Some(entitlement) = find_active_entitlement(conn, &subscriber.id, channel_external_id)?
    else {
        tracing::info!(
            "no active entitlement for subscriber {} in channel {}",
            subscriber.id,
            channel_external_id
        );
        return Ok(LeaveOutcome::NoEntitlement);
    };

    let can_rejoin = reason == LeaveReason::Left;

    if !can_rejoin {
        let event = queries::record_membership_event(
            conn,
            &NewMembershipEvent {
                tenant_id: &entitlement.tenant_id,
                subscriber_id: &subscriber.id,
                messaging_id,
                channel_external_id,
                reason,
                purchase_id: Some(&entitlement.id),
                can_rejoin: false,
                recovered: false,
            },
        )?;
        tracing::warn!(
            "subscriber {} was {} from channel {} while entitled; manual review required",
            subscriber.id,
            reason.as_ref(),
            channel_external_id
        );
        return Ok(LeaveOutcome::Recorded { event });
    }

    // Old pending links for this channel stop counting as delivered so the
    // recovery link below is the one way back in.
    queries::soft_expire_pending_links(conn, &subscriber.id, channel_external_id)?;

    let req = IssueRequest {
        tenant_id: entitlement.tenant_id.clone(),
        subscriber_id: subscriber.id.clone(),
        bundle_id: entitlement.bundle_id.clone(),
        duration_seconds: RECOVERY_WINDOW_SECONDS,
        purchase_id: Some(entitlement.id.clone()),
        plan_id: entitlement.plan_id.clone(),
        only_channel: Some(channel_external_id.to_string()),
        recovery: true,
        link_expires_at: Some(Utc::now().timestamp() + RECOVERY_WINDOW_SECONDS),
    };
    let outcome = issuer::issue(conn, provider, &req).await?;
    let recovered = outcome.success_count > 0;

    let event = queries::record_membership_event(
        conn,
        &NewMembershipEvent {
            tenant_id: &entitlement.tenant_id,
            subscriber_id: &subscriber.id,
            messaging_id,
            channel_external_id,
            reason,
            purchase_id: Some(&entitlement.id),
            can_rejoin: true,
            recovered,
        },
    )?;

    match outcome.generated.into_iter().next() {
        Some(link) if recovered => Ok(LeaveOutcome::Recovered { event, link }),
        _ => {
            tracing::error!(
                "recovery mint failed for subscriber {} in channel {}",
                subscriber.id,
                channel_external_id
            );
            Ok(LeaveOutcome::RecoveryFailed { event })
        }
    }
}

/// The purchase backing a subscriber's current access to a channel: a
/// consumed, not-soft-expired link whose purchase succeeded and has not
/// expired.
pub fn find_active_entitlement(
    conn: &Connection,
    subscriber_id: &str,
    channel_external_id: &str,
) -> Result<Option<Purchase>> {
    let now = Utc::now().timestamp();
    let links = queries::list_consumed_links_for_channel(conn, subscriber_id, channel_external_id)?;

    for link in links {
        let Some(purchase_id) = link.purchase_id.as_deref() else {
            continue;
        };
        if let Some(purchase) = queries::get_purchase_by_id(conn, purchase_id)? {
            let unexpired = purchase.expires_at.map(|e| e > now).unwrap_or(true);
            if purchase.status == PurchaseStatus::Success && unexpired {
                return Ok(Some(purchase));
            }
        }
    }
    Ok(None)
}
