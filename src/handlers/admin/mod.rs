mod bundles;
mod delivery;
mod purchases;
mod subscribers;

pub use bundles::*;
pub use delivery::*;
pub use purchases::*;
pub use subscribers::*;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::db::AppState;
use crate::middleware::tenant_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/bundles", post(create_bundle))
        .route("/admin/bundles/{bundle_id}", get(get_bundle))
        .route("/admin/bundles/{bundle_id}/channels", post(add_channel))
        .route(
            "/admin/bundles/{bundle_id}/requirements",
            put(update_requirements),
        )
        .route("/admin/subscribers", post(create_subscriber))
        .route(
            "/admin/subscribers/{subscriber_id}/steps/{step}",
            post(complete_step),
        )
        .route(
            "/admin/subscribers/{subscriber_id}/workflow",
            get(get_workflow_status),
        )
        .route("/admin/subscribers/{subscriber_id}/links", get(list_links))
        .route(
            "/admin/subscribers/{subscriber_id}/membership-events",
            get(list_membership_events),
        )
        .route("/admin/purchases", post(create_purchase))
        .route("/admin/delivery/verify", get(verify_delivery))
        .route("/admin/delivery/deliver", post(deliver_missing))
        .route("/admin/delivery/bulk", post(deliver_bulk))
        .route("/admin/delivery/pending", get(list_pending_delivery))
        .layer(middleware::from_fn_with_state(state, tenant_auth))
}
