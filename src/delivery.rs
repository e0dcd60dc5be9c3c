//! Delivery verification and recovery: reconciles what a purchase should
//! have produced (one link per active channel) against what the ledger
//! actually holds, and re-invokes the issuer for the shortfall.

use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;
use strum::AsRefStr;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::issuer::{self, ChannelIssueError, IssueRequest};
use crate::messaging::JoinLinkProvider;
use crate::models::{DeliveryStatus, PurchaseStatus};

/// Snapshot of a purchase's delivery state. An issued-but-unconsumed link
/// still counts as delivered; only a passed soft expiry removes a link from
/// the count.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub purchase_id: String,
    pub subscriber_id: String,
    pub expected_links: i64,
    pub actual_links: i64,
    pub delivery_complete: bool,
}

/// Compare expected (active channels in the purchase's bundle) against
/// actual (non-soft-expired links for the subscriber+purchase pair).
/// A purchase that never reached SUCCESS expects nothing and verifies
/// complete.
pub fn verify(
    conn: &Connection,
    subscriber_id: &str,
    purchase_id: &str,
) -> Result<DeliveryReport> {
    let purchase = queries::get_purchase_by_id(conn, purchase_id)?
        .ok_or_else(|| AppError::NotFound("Purchase not found".into()))?;

    if purchase.subscriber_id != subscriber_id {
        return Err(AppError::NotFound("Purchase not found".into()));
    }

    if purchase.status != PurchaseStatus::Success {
        return Ok(DeliveryReport {
            purchase_id: purchase.id,
            subscriber_id: subscriber_id.to_string(),
            expected_links: 0,
            actual_links: 0,
            delivery_complete: true,
        });
    }

    let expected = queries::count_active_channels(conn, &purchase.bundle_id)?;
    let actual = queries::count_deliverable_links(conn, subscriber_id, purchase_id)?;

    Ok(DeliveryReport {
        purchase_id: purchase.id,
        subscriber_id: subscriber_id.to_string(),
        expected_links: expected,
        actual_links: actual,
        delivery_complete: actual >= expected,
    })
}

#[derive(Debug, Serialize)]
pub struct DeliveryOutcome {
    pub report: DeliveryReport,
    pub already_complete: bool,
    pub issued: usize,
    pub errors: Vec<ChannelIssueError>,
    pub delivery_status: DeliveryStatus,
}

/// Idempotent recovery: re-verify, mint only the shortfall, re-verify, and
/// record the outcome on the purchase. Calling this again after a fully
/// successful run creates nothing.
pub async fn deliver_missing<P: JoinLinkProvider>(
    conn: &Connection,
    provider: &P,
    subscriber_id: &str,
    purchase_id: &str,
) -> Result<DeliveryOutcome> {
    let report = verify(conn, subscriber_id, purchase_id)?;

    if report.delivery_complete {
        // Normalize the recorded status for purchases that were delivered
        // through another path before this one ran.
        if report.expected_links > 0 {
            queries::set_delivery_status(conn, purchase_id, DeliveryStatus::Completed)?;
        }
        return Ok(DeliveryOutcome {
            report,
            already_complete: true,
            issued: 0,
            errors: Vec::new(),
            delivery_status: DeliveryStatus::Completed,
        });
    }

    let purchase = queries::get_purchase_by_id(conn, purchase_id)?
        .ok_or_else(|| AppError::NotFound("Purchase not found".into()))?;

    queries::mark_delivery_attempt(conn, purchase_id)?;

    let req = IssueRequest::for_purchase(
        &purchase.tenant_id,
        subscriber_id,
        &purchase.bundle_id,
        purchase.duration_seconds,
        Some(purchase_id),
        purchase.plan_id.as_deref(),
    );
    let outcome = issuer::issue(conn, provider, &req).await?;

    let final_report = verify(conn, subscriber_id, purchase_id)?;
    let delivery_status = if final_report.delivery_complete {
        DeliveryStatus::Completed
    } else {
        DeliveryStatus::Failed
    };
    queries::set_delivery_status(conn, purchase_id, delivery_status)?;

    Ok(DeliveryOutcome {
        report: final_report,
        already_complete: false,
        issued: outcome.success_count,
        errors: outcome.errors,
        delivery_status,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BulkItemStatus {
    Completed,
    AlreadyComplete,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct BulkItemResult {
    pub purchase_id: String,
    pub status: BulkItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub issued: usize,
}

#[derive(Debug, Serialize)]
pub struct BulkOutcome {
    pub total: usize,
    pub completed: usize,
    pub already_complete: usize,
    pub failed: usize,
    pub details: Vec<BulkItemResult>,
}

/// Sequentially verify-and-deliver a list of purchases, pausing between
/// items so the platform's rate limits survive an admin sweep. One item's
/// failure never aborts the batch.
pub async fn deliver_bulk<P: JoinLinkProvider>(
    conn: &Connection,
    provider: &P,
    purchase_ids: &[String],
    delay: Duration,
) -> BulkOutcome {
    let mut outcome = BulkOutcome {
        total: purchase_ids.len(),
        completed: 0,
        already_complete: 0,
        failed: 0,
        details: Vec::with_capacity(purchase_ids.len()),
    };

    for (i, purchase_id) in purchase_ids.iter().enumerate() {
        let item = deliver_one(conn, provider, purchase_id).await;
        match &item.status {
            BulkItemStatus::Completed => outcome.completed += 1,
            BulkItemStatus::AlreadyComplete => outcome.already_complete += 1,
            BulkItemStatus::Failed => outcome.failed += 1,
        }
        outcome.details.push(item);

        if i + 1 < purchase_ids.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::info!(
        "bulk delivery: {} completed, {} already complete, {} failed of {}",
        outcome.completed,
        outcome.already_complete,
        outcome.failed,
        outcome.total
    );
    outcome
}

async fn deliver_one<P: JoinLinkProvider>(
    conn: &Connection,
    provider: &P,
    purchase_id: &str,
) -> BulkItemResult {
    let purchase = match queries::get_purchase_by_id(conn, purchase_id) {
        Ok(Some(p)) => p,
        Ok(None) => {
            return BulkItemResult {
                purchase_id: purchase_id.to_string(),
                status: BulkItemStatus::Failed,
                error: Some("Purchase not found".into()),
                issued: 0,
            };
        }
        Err(e) => {
            return BulkItemResult {
                purchase_id: purchase_id.to_string(),
                status: BulkItemStatus::Failed,
                error: Some(e.to_string()),
                issued: 0,
            };
        }
    };

    match deliver_missing(conn, provider, &purchase.subscriber_id, purchase_id).await {
        Ok(result) if result.already_complete => BulkItemResult {
            purchase_id: purchase_id.to_string(),
            status: BulkItemStatus::AlreadyComplete,
            error: None,
            issued: 0,
        },
        Ok(result) if result.delivery_status == DeliveryStatus::Completed => BulkItemResult {
            purchase_id: purchase_id.to_string(),
            status: BulkItemStatus::Completed,
            error: None,
            issued: result.issued,
        },
        Ok(result) => BulkItemResult {
            purchase_id: purchase_id.to_string(),
            status: BulkItemStatus::Failed,
            error: result.errors.first().map(|e| e.error.clone()),
            issued: result.issued,
        },
        Err(e) => {
            tracing::error!("bulk delivery failed for purchase {}: {}", purchase_id, e);
            BulkItemResult {
                purchase_id: purchase_id.to_string(),
                status: BulkItemStatus::Failed,
                error: Some(e.to_string()),
                issued: 0,
            }
        }
    }
}
