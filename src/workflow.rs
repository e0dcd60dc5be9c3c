//! The workflow gate: decides whether every tenant-configured prerequisite
//! for a purchase is satisfied before any access link may be minted.

use rusqlite::Connection;
use serde::Serialize;
use strum::AsRefStr;

use crate::db::queries;
use crate::delivery::{self, DeliveryOutcome};
use crate::error::{AppError, Result};
use crate::messaging::JoinLinkProvider;
use crate::models::{Bundle, Purchase, PurchaseStatus, Subscriber};

/// A prerequisite step a bundle can demand before access is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WorkflowStep {
    IdentityVerification,
    Contract,
}

/// Derived, never persisted: the gate's verdict for one purchase.
#[derive(Debug, Serialize)]
pub struct WorkflowStatus {
    pub all_steps_complete: bool,
    pub missing_steps: Vec<WorkflowStep>,
    #[serde(skip_serializing)]
    pub subscriber: Subscriber,
    #[serde(skip_serializing)]
    pub purchase: Purchase,
    pub bundle_id: Option<String>,
}

/// Evaluate the gate for a subscriber.
///
/// With no explicit purchase id the most recent successful purchase is
/// used, falling back to the most recent pending one. A bundle toggle left
/// unset counts as required; trial bundles waive both steps. Side-effect
/// free.
pub fn evaluate(
    conn: &Connection,
    subscriber_id: &str,
    purchase_id: Option<&str>,
) -> Result<WorkflowStatus> {
    let subscriber = queries::get_subscriber_by_id(conn, subscriber_id)?
        .ok_or_else(|| AppError::NotFound("Subscriber not found".into()))?;

    let purchase = match purchase_id {
        Some(id) => queries::get_purchase_by_id(conn, id)?
            .ok_or_else(|| AppError::NotFound("Purchase not found".into()))?,
        None => {
            let latest =
                queries::latest_purchase_by_status(conn, subscriber_id, PurchaseStatus::Success)?;
            match latest {
                Some(p) => p,
                None => queries::latest_purchase_by_status(
                    conn,
                    subscriber_id,
                    PurchaseStatus::Pending,
                )?
                .ok_or_else(|| AppError::NotFound("No purchase found for subscriber".into()))?,
            }
        }
    };

    // A purchase whose bundle row has gone missing degrades to the strictest
    // reading: both steps required.
    let bundle: Option<Bundle> = queries::get_bundle_by_id(conn, &purchase.bundle_id)?;
    let (identity_required, contract_required) = match &bundle {
        Some(b) => (b.identity_required(), b.contract_required()),
        None => (true, true),
    };

    let mut missing_steps = Vec::new();
    if identity_required && !subscriber.identity_verified {
        missing_steps.push(WorkflowStep::IdentityVerification);
    }
    if contract_required && !subscriber.contract_signed {
        missing_steps.push(WorkflowStep::Contract);
    }

    Ok(WorkflowStatus {
        all_steps_complete: missing_steps.is_empty(),
        missing_steps,
        subscriber,
        bundle_id: bundle.map(|b| b.id),
        purchase,
    })
}

/// Result of a prerequisite-completion trigger.
#[derive(Debug, Serialize)]
pub struct IssueReadiness {
    pub issued: bool,
    pub missing_steps: Vec<WorkflowStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryOutcome>,
}

/// Run the gate and, when every step is satisfied and the payment has
/// succeeded, deliver whatever links are still missing for the purchase.
///
/// An incomplete gate is a normal "not yet"; the next prerequisite event
/// re-triggers this path. Going through the delivery verifier (rather than
/// minting directly) makes a crash-then-retry sequence converge instead of
/// double-issuing.
pub async fn issue_if_ready<P: JoinLinkProvider>(
    conn: &Connection,
    provider: &P,
    subscriber_id: &str,
    purchase_id: Option<&str>,
) -> Result<IssueReadiness> {
    let status = evaluate(conn, subscriber_id, purchase_id)?;

    if !status.all_steps_complete {
        tracing::info!(
            "not issuing for subscriber {}: missing steps {:?}",
            subscriber_id,
            status.missing_steps
        );
        return Ok(IssueReadiness {
            issued: false,
            missing_steps: status.missing_steps,
            delivery: None,
        });
    }

    if status.purchase.status != PurchaseStatus::Success {
        return Ok(IssueReadiness {
            issued: false,
            missing_steps: Vec::new(),
            delivery: None,
        });
    }

    let outcome =
        delivery::deliver_missing(conn, provider, subscriber_id, &status.purchase.id).await?;

    Ok(IssueReadiness {
        issued: outcome.issued > 0 || outcome.already_complete,
        missing_steps: Vec::new(),
        delivery: Some(outcome),
    })
}
