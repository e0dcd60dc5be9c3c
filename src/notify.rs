//! Best-effort notification dispatch.
//!
//! After a batch of links is issued we POST a summary to the tenant's
//! configured webhook so their own delivery channel (email, SMS, dashboard)
//! can pick it up. Dispatch never blocks or unwinds issuance: a failure is
//! logged and the links stay persisted.

use reqwest::Client;
use serde::Serialize;

use crate::models::{AccessLink, Tenant};

/// Outcome of a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyResult {
    /// Payload accepted by the tenant's webhook
    Delivered,
    /// Tenant has no notify_url configured
    Disabled,
    /// Request failed or webhook answered non-2xx (already logged)
    Failed,
}

#[derive(Debug, Serialize)]
struct LinkSummary<'a> {
    channel_external_id: &'a str,
    channel_title: &'a str,
    link: &'a str,
    recovery: bool,
}

#[derive(Debug, Serialize)]
struct IssuedLinksPayload<'a> {
    event: &'static str,
    tenant_id: &'a str,
    subscriber_id: &'a str,
    purchase_id: Option<&'a str>,
    links: Vec<LinkSummary<'a>>,
}

/// POST the issued links to the tenant's webhook, if one is configured.
pub async fn dispatch_issued_links(
    tenant: &Tenant,
    subscriber_id: &str,
    purchase_id: Option<&str>,
    links: &[AccessLink],
) -> NotifyResult {
    let Some(url) = tenant.notify_url.as_deref() else {
        return NotifyResult::Disabled;
    };
    if links.is_empty() {
        return NotifyResult::Disabled;
    }

    let payload = IssuedLinksPayload {
        event: "access_links.issued",
        tenant_id: &tenant.id,
        subscriber_id,
        purchase_id,
        links: links
            .iter()
            .map(|l| LinkSummary {
                channel_external_id: &l.channel_external_id,
                channel_title: &l.channel_title,
                link: &l.link,
                recovery: l.recovery,
            })
            .collect(),
    };

    match Client::new().post(url).json(&payload).send().await {
        Ok(response) if response.status().is_success() => NotifyResult::Delivered,
        Ok(response) => {
            tracing::warn!(
                "notification webhook for tenant {} answered {}",
                tenant.id,
                response.status()
            );
            NotifyResult::Failed
        }
        Err(e) => {
            tracing::warn!("notification webhook for tenant {} unreachable: {}", tenant.id, e);
            NotifyResult::Failed
        }
    }
}
