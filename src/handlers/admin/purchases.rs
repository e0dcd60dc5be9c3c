use axum::{
    Extension, Json,
    extract::State,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::middleware::TenantContext;
use crate::models::{CreatePurchase, Purchase};

use super::owned_subscriber;

/// Record a checkout: a pending purchase with its duration normalized and
/// its entitlement expiry fixed. Status changes arrive later through the
/// payment webhook.
pub async fn create_purchase(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(input): Json<CreatePurchase>,
) -> Result<Json<Purchase>> {
    let conn = state.db.get()?;

    owned_subscriber(&conn, &ctx, &input.subscriber_id)?;

    let bundle = queries::get_bundle_by_id(&conn, &input.bundle_id)?
        .ok_or_else(|| AppError::NotFound("Bundle not found".into()))?;
    if bundle.tenant_id != ctx.tenant.id {
        return Err(AppError::NotFound("Bundle not found".into()));
    }

    let purchase = queries::create_purchase(&conn, &ctx.tenant.id, &input)?;
    Ok(Json(purchase))
}
