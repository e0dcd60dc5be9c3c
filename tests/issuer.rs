//! Link issuer tests: per-channel isolation, inactive-channel exclusion,
//! duplicate-mint idempotency, and entitlement-aware durations.

mod common;
use common::*;

use gatepass::db::queries;
use gatepass::error::AppError;
use gatepass::issuer::{self, IssueRequest};
use gatepass::models::*;

#[tokio::test]
async fn test_issues_one_link_per_active_channel() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15552001");
    let bundle = create_test_bundle(&conn, &tenant.id, "Trio", 3);
    let purchase = create_success_purchase(&conn, &tenant.id, &subscriber.id, &bundle.id, 86400);

    let provider = MockProvider::new();
    let req = IssueRequest::for_purchase(
        &tenant.id,
        &subscriber.id,
        &bundle.id,
        86400,
        Some(&purchase.id),
        Some("plan-basic"),
    );
    let outcome = issuer::issue(&conn, &provider, &req).await.unwrap();

    assert_eq!(outcome.success_count, 3);
    assert_eq!(outcome.error_count, 0);

    let links = queries::list_links_for_purchase(&conn, &subscriber.id, &purchase.id).unwrap();
    assert_eq!(links.len(), 3);
    let mut channels: Vec<_> = links.iter().map(|l| l.channel_external_id.clone()).collect();
    channels.sort();
    assert_eq!(channels, vec!["chan-0", "chan-1", "chan-2"]);
    assert!(links.iter().all(|l| !l.consumed && l.expires_at.is_none()));
}

#[tokio::test]
async fn test_single_channel_failure_is_isolated() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15552002");
    let bundle = create_test_bundle(&conn, &tenant.id, "Quad", 4);
    let purchase = create_success_purchase(&conn, &tenant.id, &subscriber.id, &bundle.id, 86400);

    let provider = MockProvider::new();
    provider.fail_channel("chan-2");

    let req = IssueRequest::for_purchase(
        &tenant.id,
        &subscriber.id,
        &bundle.id,
        86400,
        Some(&purchase.id),
        None,
    );
    let outcome = issuer::issue(&conn, &provider, &req).await.unwrap();

    assert_eq!(outcome.success_count, 3);
    assert_eq!(outcome.error_count, 1);
    assert_eq!(outcome.errors[0].channel_external_id, "chan-2");

    let links = queries::list_links_for_purchase(&conn, &subscriber.id, &purchase.id).unwrap();
    assert_eq!(links.len(), 3);
    assert!(
        links.iter().all(|l| l.channel_external_id != "chan-2"),
        "the failed channel must not get a row"
    );
}

#[tokio::test]
async fn test_inactive_channels_are_excluded() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15552003");
    let bundle = create_test_bundle(&conn, &tenant.id, "Mixed", 2);
    queries::add_channel(
        &conn,
        &bundle.id,
        &CreateChannel {
            external_id: "chan-dormant".into(),
            title: "Dormant".into(),
            active: false,
        },
    )
    .unwrap();
    let purchase = create_success_purchase(&conn, &tenant.id, &subscriber.id, &bundle.id, 86400);

    let provider = MockProvider::new();
    let req = IssueRequest::for_purchase(
        &tenant.id,
        &subscriber.id,
        &bundle.id,
        86400,
        Some(&purchase.id),
        None,
    );
    let outcome = issuer::issue(&conn, &provider, &req).await.unwrap();

    assert_eq!(outcome.success_count, 2);
    assert!(
        outcome
            .generated
            .iter()
            .all(|l| l.channel_external_id != "chan-dormant")
    );
}

#[tokio::test]
async fn test_reissue_reuses_pending_links() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15552004");
    let bundle = create_test_bundle(&conn, &tenant.id, "Pair", 2);
    let purchase = create_success_purchase(&conn, &tenant.id, &subscriber.id, &bundle.id, 86400);

    let provider = MockProvider::new();
    let req = IssueRequest::for_purchase(
        &tenant.id,
        &subscriber.id,
        &bundle.id,
        86400,
        Some(&purchase.id),
        None,
    );

    let first = issuer::issue(&conn, &provider, &req).await.unwrap();
    assert_eq!(first.success_count, 2);
    assert_eq!(provider.mint_count(), 2);

    // Duplicate issuance: same pending slots, no new mints, no new rows.
    let second = issuer::issue(&conn, &provider, &req).await.unwrap();
    assert_eq!(second.success_count, 2);
    assert_eq!(provider.mint_count(), 2);

    let links = queries::list_links_for_purchase(&conn, &subscriber.id, &purchase.id).unwrap();
    assert_eq!(links.len(), 2);
}

#[tokio::test]
async fn test_consumed_link_frees_the_pending_slot() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15552005");
    let bundle = create_test_bundle(&conn, &tenant.id, "Solo", 1);
    let purchase = create_success_purchase(&conn, &tenant.id, &subscriber.id, &bundle.id, 86400);

    let provider = MockProvider::new();
    let req = IssueRequest::for_purchase(
        &tenant.id,
        &subscriber.id,
        &bundle.id,
        86400,
        Some(&purchase.id),
        None,
    );

    let first = issuer::issue(&conn, &provider, &req).await.unwrap();
    queries::consume_link(&conn, &first.generated[0].token, "user-1").unwrap();

    // A consumed link no longer occupies the pending slot; regeneration
    // mints a fresh one instead of resurrecting the old.
    let second = issuer::issue(&conn, &provider, &req).await.unwrap();
    assert_eq!(second.success_count, 1);
    assert_ne!(second.generated[0].token, first.generated[0].token);

    let links = queries::list_links_for_purchase(&conn, &subscriber.id, &purchase.id).unwrap();
    assert_eq!(links.len(), 2);
}

#[tokio::test]
async fn test_duration_tracks_remaining_entitlement() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15552006");
    let bundle = create_test_bundle(&conn, &tenant.id, "Clocked", 1);
    // 90-day purchase: remaining is close to nominal right after checkout.
    let purchase =
        create_success_purchase(&conn, &tenant.id, &subscriber.id, &bundle.id, 90 * 86400);

    let provider = MockProvider::new();
    // Deliberately stale nominal duration.
    let req = IssueRequest::for_purchase(
        &tenant.id,
        &subscriber.id,
        &bundle.id,
        86400,
        Some(&purchase.id),
        None,
    );
    let outcome = issuer::issue(&conn, &provider, &req).await.unwrap();

    let recorded = outcome.generated[0].duration_seconds;
    let expected = purchase.expires_at.unwrap() - now();
    assert!(
        (recorded - expected).abs() <= 2,
        "link duration {recorded} should track remaining entitlement {expected}"
    );
}

#[tokio::test]
async fn test_elapsed_entitlement_falls_back_to_nominal() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15552007");
    let bundle = create_test_bundle(&conn, &tenant.id, "Lapsed", 1);
    let purchase = create_success_purchase(&conn, &tenant.id, &subscriber.id, &bundle.id, 86400);

    // Push the expiry into the past.
    conn.execute(
        "UPDATE purchases SET expires_at = ?1 WHERE id = ?2",
        rusqlite::params![now() - 100, &purchase.id],
    )
    .unwrap();

    let provider = MockProvider::new();
    let req = IssueRequest::for_purchase(
        &tenant.id,
        &subscriber.id,
        &bundle.id,
        3600,
        Some(&purchase.id),
        None,
    );
    let outcome = issuer::issue(&conn, &provider, &req).await.unwrap();

    // Fallback, not failure.
    assert_eq!(outcome.success_count, 1);
    assert_eq!(outcome.generated[0].duration_seconds, 3600);
}

#[tokio::test]
async fn test_bundle_without_active_channels_is_rejected() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15552008");
    let bundle = create_test_bundle(&conn, &tenant.id, "Empty", 0);

    let provider = MockProvider::new();
    let req =
        IssueRequest::for_purchase(&tenant.id, &subscriber.id, &bundle.id, 86400, None, None);

    assert!(matches!(
        issuer::issue(&conn, &provider, &req).await,
        Err(AppError::BadRequest(_))
    ));
}
