//! The link issuer: mints one single-use join link per active destination
//! channel and writes it through the consumption ledger.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::messaging::JoinLinkProvider;
use crate::models::{AccessLink, NewAccessLink};
use crate::notify;

/// What to issue. `only_channel` narrows a bundle to a single channel
/// (membership recovery); `link_expires_at` puts a soft expiry on the new
/// links (normal issuance leaves it unset, and a link is honorable until used).
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub tenant_id: String,
    pub subscriber_id: String,
    pub bundle_id: String,
    pub duration_seconds: i64,
    pub purchase_id: Option<String>,
    pub plan_id: Option<String>,
    pub only_channel: Option<String>,
    pub recovery: bool,
    pub link_expires_at: Option<i64>,
}

impl IssueRequest {
    /// Plain bundle issuance for a purchase.
    pub fn for_purchase(
        tenant_id: &str,
        subscriber_id: &str,
        bundle_id: &str,
        duration_seconds: i64,
        purchase_id: Option<&str>,
        plan_id: Option<&str>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            subscriber_id: subscriber_id.to_string(),
            bundle_id: bundle_id.to_string(),
            duration_seconds,
            purchase_id: purchase_id.map(String::from),
            plan_id: plan_id.map(String::from),
            only_channel: None,
            recovery: false,
            link_expires_at: None,
        }
    }
}

/// One channel's mint failure. Isolated: never aborts the rest of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelIssueError {
    pub channel_external_id: String,
    pub channel_title: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct IssueOutcome {
    pub generated: Vec<AccessLink>,
    pub errors: Vec<ChannelIssueError>,
    pub success_count: usize,
    pub error_count: usize,
}

/// Mint and persist links for every targeted active channel.
///
/// When the request references a purchase carrying an expiry, each link's
/// recorded duration becomes the remaining entitlement (`expiry - now`)
/// rather than the stale nominal value; an already-elapsed expiry falls
/// back to the nominal duration. A channel that already holds a pending
/// link for this subscriber and purchase is not minted again.
pub async fn issue<P: JoinLinkProvider>(
    conn: &Connection,
    provider: &P,
    req: &IssueRequest,
) -> Result<IssueOutcome> {
    let bundle = queries::get_bundle_by_id(conn, &req.bundle_id)?
        .ok_or_else(|| AppError::NotFound("Bundle not found".into()))?;

    let mut channels = queries::list_active_channels(conn, &bundle.id)?;
    if let Some(only) = &req.only_channel {
        channels.retain(|c| c.external_id == *only);
    }
    if channels.is_empty() {
        return Err(AppError::BadRequest("Bundle has no active channels".into()));
    }

    let duration_seconds = effective_duration(conn, req)?;

    let mut generated: Vec<AccessLink> = Vec::new();
    let mut errors: Vec<ChannelIssueError> = Vec::new();

    for channel in &channels {
        if !req.recovery {
            if let Some(existing) = queries::get_pending_link(
                conn,
                &req.subscriber_id,
                req.purchase_id.as_deref(),
                &channel.external_id,
            )? {
                generated.push(existing);
                continue;
            }
        }

        let minted = match provider.create_join_link(&channel.external_id).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(
                    "mint failed for channel {} ({}): {}",
                    channel.title,
                    channel.external_id,
                    e
                );
                errors.push(ChannelIssueError {
                    channel_external_id: channel.external_id.clone(),
                    channel_title: channel.title.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let new = NewAccessLink {
            token: &minted.token,
            link: &minted.link,
            tenant_id: &req.tenant_id,
            subscriber_id: &req.subscriber_id,
            purchase_id: req.purchase_id.as_deref(),
            plan_id: req.plan_id.as_deref(),
            bundle_id: &bundle.id,
            channel_external_id: &channel.external_id,
            channel_title: &channel.title,
            duration_seconds,
            expires_at: req.link_expires_at,
            recovery: req.recovery,
        };

        match queries::insert_access_link(conn, &new) {
            Ok(link) => generated.push(link),
            Err(e) => {
                tracing::error!(
                    "failed to persist link for channel {}: {}",
                    channel.external_id,
                    e
                );
                errors.push(ChannelIssueError {
                    channel_external_id: channel.external_id.clone(),
                    channel_title: channel.title.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "issued {} link(s), {} error(s) for subscriber {} in bundle {}",
        generated.len(),
        errors.len(),
        req.subscriber_id,
        bundle.id
    );

    // Notification is best-effort; persisted links are never rolled back
    // over a webhook hiccup.
    if !generated.is_empty() {
        if let Some(tenant) = queries::get_tenant_by_id(conn, &req.tenant_id)? {
            notify::dispatch_issued_links(
                &tenant,
                &req.subscriber_id,
                req.purchase_id.as_deref(),
                &generated,
            )
            .await;
        }
    }

    let success_count = generated.len();
    let error_count = errors.len();
    Ok(IssueOutcome {
        generated,
        errors,
        success_count,
        error_count,
    })
}

/// Remaining entitlement when the purchase has an expiry, else the nominal
/// request duration.
fn effective_duration(conn: &Connection, req: &IssueRequest) -> Result<i64> {
    let Some(purchase_id) = req.purchase_id.as_deref() else {
        return Ok(req.duration_seconds);
    };
    let Some(purchase) = queries::get_purchase_by_id(conn, purchase_id)? else {
        return Ok(req.duration_seconds);
    };
    let Some(expires_at) = purchase.expires_at else {
        return Ok(req.duration_seconds);
    };

    let remaining = expires_at - Utc::now().timestamp();
    if remaining > 0 {
        Ok(remaining)
    } else {
        Ok(req.duration_seconds)
    }
}
