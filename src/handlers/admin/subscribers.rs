use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::middleware::TenantContext;
use crate::models::{AccessLink, CreateSubscriber, MembershipEvent, Subscriber};
use crate::workflow::{self, IssueReadiness, WorkflowStatus};

pub async fn create_subscriber(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(input): Json<CreateSubscriber>,
) -> Result<Json<Subscriber>> {
    let conn = state.db.get()?;
    let subscriber = queries::create_subscriber(&conn, &ctx.tenant.id, &input)?;
    Ok(Json(subscriber))
}

#[derive(Debug, Deserialize)]
pub struct CompleteStepBody {
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

/// A prerequisite-completion event from the identity or e-signature
/// provider: record the flag, then run the gate and deliver if everything
/// is now satisfied.
pub async fn complete_step(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path((subscriber_id, step)): Path<(String, String)>,
    Json(body): Json<CompleteStepBody>,
) -> Result<Json<IssueReadiness>> {
    let conn = state.db.get()?;
    owned_subscriber(&conn, &ctx, &subscriber_id)?;

    let (identity, contract) = match step.as_str() {
        "identity-verification" => (Some(body.completed), None),
        "contract" => (None, Some(body.completed)),
        _ => {
            return Err(AppError::BadRequest(
                "Unknown step. Expected 'identity-verification' or 'contract'".into(),
            ));
        }
    };
    queries::set_workflow_flags(&conn, &subscriber_id, identity, contract)?;

    if !body.completed {
        return Ok(Json(IssueReadiness {
            issued: false,
            missing_steps: Vec::new(),
            delivery: None,
        }));
    }

    // Subscribers without any purchase yet just get the flag recorded.
    match workflow::issue_if_ready(&conn, &state.bot, &subscriber_id, None).await {
        Ok(readiness) => Ok(Json(readiness)),
        Err(AppError::NotFound(_)) => Ok(Json(IssueReadiness {
            issued: false,
            missing_steps: Vec::new(),
            delivery: None,
        })),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkflowQuery {
    #[serde(default)]
    pub purchase_id: Option<String>,
}

pub async fn get_workflow_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(subscriber_id): Path<String>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<WorkflowStatus>> {
    let conn = state.db.get()?;
    owned_subscriber(&conn, &ctx, &subscriber_id)?;
    let status = workflow::evaluate(&conn, &subscriber_id, query.purchase_id.as_deref())?;
    Ok(Json(status))
}

pub async fn list_links(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(subscriber_id): Path<String>,
) -> Result<Json<Vec<AccessLink>>> {
    let conn = state.db.get()?;
    owned_subscriber(&conn, &ctx, &subscriber_id)?;
    Ok(Json(queries::list_links_for_subscriber(&conn, &subscriber_id)?))
}

pub async fn list_membership_events(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(subscriber_id): Path<String>,
) -> Result<Json<Vec<MembershipEvent>>> {
    let conn = state.db.get()?;
    owned_subscriber(&conn, &ctx, &subscriber_id)?;
    Ok(Json(queries::list_membership_events(&conn, &subscriber_id)?))
}

pub(super) fn owned_subscriber(
    conn: &rusqlite::Connection,
    ctx: &TenantContext,
    subscriber_id: &str,
) -> Result<Subscriber> {
    let subscriber = queries::get_subscriber_by_id(conn, subscriber_id)?
        .ok_or_else(|| AppError::NotFound("Subscriber not found".into()))?;
    if subscriber.tenant_id != ctx.tenant.id {
        return Err(AppError::NotFound("Subscriber not found".into()));
    }
    Ok(subscriber)
}
