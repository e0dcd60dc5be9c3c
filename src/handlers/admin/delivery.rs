use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::delivery::{self, BulkOutcome, DeliveryOutcome, DeliveryReport};
use crate::error::{AppError, Result};
use crate::middleware::TenantContext;
use crate::models::Purchase;

#[derive(Debug, Deserialize)]
pub struct DeliveryQuery {
    pub subscriber_id: String,
    pub purchase_id: String,
}

pub async fn verify_delivery(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<DeliveryQuery>,
) -> Result<Json<DeliveryReport>> {
    let conn = state.db.get()?;
    owned_purchase(&conn, &ctx, &query.purchase_id)?;
    let report = delivery::verify(&conn, &query.subscriber_id, &query.purchase_id)?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct DeliverBody {
    pub subscriber_id: String,
    pub purchase_id: String,
}

pub async fn deliver_missing(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<DeliverBody>,
) -> Result<Json<DeliveryOutcome>> {
    let conn = state.db.get()?;
    owned_purchase(&conn, &ctx, &body.purchase_id)?;
    let outcome =
        delivery::deliver_missing(&conn, &state.bot, &body.subscriber_id, &body.purchase_id)
            .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct BulkBody {
    pub purchase_ids: Vec<String>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

pub async fn deliver_bulk(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<BulkBody>,
) -> Result<Json<BulkOutcome>> {
    let conn = state.db.get()?;

    // Foreign ids are skipped up front rather than failing mid-batch.
    let mut owned = Vec::with_capacity(body.purchase_ids.len());
    for id in &body.purchase_ids {
        if owned_purchase(&conn, &ctx, id).is_ok() {
            owned.push(id.clone());
        }
    }

    let delay = Duration::from_millis(body.delay_ms.unwrap_or(state.bulk_delay_ms));
    let outcome = delivery::deliver_bulk(&conn, &state.bot, &owned, delay).await;
    Ok(Json(outcome))
}

pub async fn list_pending_delivery(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<Vec<Purchase>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_purchases_pending_delivery(
        &conn,
        &ctx.tenant.id,
        100,
    )?))
}

fn owned_purchase(
    conn: &rusqlite::Connection,
    ctx: &TenantContext,
    purchase_id: &str,
) -> Result<Purchase> {
    let purchase = queries::get_purchase_by_id(conn, purchase_id)?
        .ok_or_else(|| AppError::NotFound("Purchase not found".into()))?;
    if purchase.tenant_id != ctx.tenant.id {
        return Err(AppError::NotFound("Purchase not found".into()));
    }
    Ok(purchase)
}
