use axum::{
    Extension, Json,
    extract::{Path, State},
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::middleware::TenantContext;
use crate::models::{Bundle, Channel, CreateBundle, CreateChannel, UpdateBundleRequirements};

pub async fn create_bundle(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(input): Json<CreateBundle>,
) -> Result<Json<Bundle>> {
    let conn = state.db.get()?;
    let bundle = queries::create_bundle(&conn, &ctx.tenant.id, &input)?;
    Ok(Json(bundle))
}

pub async fn get_bundle(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(bundle_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let bundle = owned_bundle(&conn, &ctx, &bundle_id)?;
    let channels = queries::list_channels(&conn, &bundle.id)?;
    Ok(Json(serde_json::json!({
        "bundle": bundle,
        "channels": channels,
    })))
}

pub async fn add_channel(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(bundle_id): Path<String>,
    Json(input): Json<CreateChannel>,
) -> Result<Json<Channel>> {
    let conn = state.db.get()?;
    let bundle = owned_bundle(&conn, &ctx, &bundle_id)?;
    let channel = queries::add_channel(&conn, &bundle.id, &input)?;
    Ok(Json(channel))
}

pub async fn update_requirements(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(bundle_id): Path<String>,
    Json(input): Json<UpdateBundleRequirements>,
) -> Result<Json<Bundle>> {
    let conn = state.db.get()?;
    let bundle = owned_bundle(&conn, &ctx, &bundle_id)?;
    queries::update_bundle_requirements(&conn, &bundle.id, &input)?;
    let updated = queries::get_bundle_by_id(&conn, &bundle.id)?
        .ok_or_else(|| AppError::Internal("Bundle vanished during update".into()))?;
    Ok(Json(updated))
}

fn owned_bundle(
    conn: &rusqlite::Connection,
    ctx: &TenantContext,
    bundle_id: &str,
) -> Result<Bundle> {
    let bundle = queries::get_bundle_by_id(conn, bundle_id)?
        .ok_or_else(|| AppError::NotFound("Bundle not found".into()))?;
    if bundle.tenant_id != ctx.tenant.id {
        return Err(AppError::NotFound("Bundle not found".into()));
    }
    Ok(bundle)
}
