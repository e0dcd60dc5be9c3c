//! HTTP-level tests: routing, auth, the platform webhook's consume path,
//! and the signed payment webhook.

mod common;
use common::*;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tower::ServiceExt;

use gatepass::db::queries;
use gatepass::issuer::{self, IssueRequest};
use gatepass::models::*;

type HmacSha256 = Hmac<Sha256>;

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_json_request(
    method: &str,
    uri: &str,
    api_key: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = public_app(create_test_state());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_admin_routes_require_api_key() {
    let app = public_app(create_test_state());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/admin/bundles",
            serde_json::json!({ "name": "Nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/admin/bundles",
            "gp_not_a_real_key",
            serde_json::json!({ "name": "Nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_setup_and_prerequisite_flow() {
    let state = create_test_state();
    let api_key = {
        let conn = state.db.get().unwrap();
        create_test_tenant(&conn, &state.master_key).1
    };
    let app = public_app(state);

    // Bundle with one channel.
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/admin/bundles",
            &api_key,
            serde_json::json!({ "name": "Premium", "require_contract": false }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bundle = body_json(response).await;
    let bundle_id = bundle["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/admin/bundles/{bundle_id}/channels"),
            &api_key,
            serde_json::json!({ "external_id": "-1001", "title": "Main" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Subscriber and a pending purchase with a free-text duration.
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/admin/subscribers",
            &api_key,
            serde_json::json!({ "name": "Asha", "phone": "+15559001" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let subscriber = body_json(response).await;
    let subscriber_id = subscriber["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/admin/purchases",
            &api_key,
            serde_json::json!({
                "subscriber_id": subscriber_id,
                "bundle_id": bundle_id,
                "amount": 9900,
                "duration": "3 months",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let purchase = body_json(response).await;
    assert_eq!(purchase["status"], "pending");
    assert_eq!(purchase["duration_seconds"], 90 * 86400);

    // Identity verified while payment is still pending: flag recorded,
    // nothing issued.
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            &format!("/admin/subscribers/{subscriber_id}/steps/identity-verification"),
            &api_key,
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let readiness = body_json(response).await;
    assert_eq!(readiness["issued"], false);

    // Contract requirement was toggled off, so the gate only wanted
    // identity verification.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/admin/subscribers/{subscriber_id}/workflow"))
                .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await;
    assert_eq!(status["all_steps_complete"], true);

    let response = app
        .oneshot(json_request("POST", "/admin/bundles", serde_json::json!({"name": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_step_name_is_rejected() {
    let state = create_test_state();
    let (api_key, subscriber_id) = {
        let conn = state.db.get().unwrap();
        let (tenant, key) = create_test_tenant(&conn, &state.master_key);
        let sub = create_test_subscriber(&conn, &tenant.id, "+15559002");
        (key, sub.id)
    };
    let app = public_app(state);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            &format!("/admin/subscribers/{subscriber_id}/steps/vibes"),
            &api_key,
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validity_endpoint_tracks_consumption() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15559003");
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
    let outcome = issuer::issue(&conn, &provider, &req).await.unwrap();
    let token = outcome.generated[0].token.clone();
    drop(conn);
    let app = public_app(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/platform/links/{token}/validity"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await["valid"], true);

    {
        let conn = state.db.get().unwrap();
        queries::consume_link(&conn, &token, "tg-1").unwrap();
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/platform/links/{token}/validity"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await["valid"], false);
}

#[tokio::test]
async fn test_join_request_consumes_the_link() {
    let state = create_test_state();
    let conn = state.db.get().unwrap();
    let (tenant, _) = create_test_tenant(&conn, &state.master_key);
    let subscriber = create_test_subscriber(&conn, &tenant.id, "+15559004");
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
    let outcome = issuer::issue(&conn, &provider, &req).await.unwrap();
    let token = outcome.generated[0].token.clone();
    let link_url = outcome.generated[0].link.clone();
    drop(conn);
    let app = public_app(state.clone());

    // The platform always gets a 200, even though the follow-up approve
    // call cannot reach a live bot here.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/platform/update",
            serde_json::json!({
                "chat_join_request": {
                    "chat": { "id": -1001 },
                    "from": { "id": 777 },
                    "invite_link": { "invite_link": link_url },
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let link = queries::get_link_by_token(&conn, &token).unwrap().unwrap();
    assert!(link.consumed);
    assert_eq!(link.consumed_by.as_deref(), Some("777"));

    // A second join request on the same link finds nothing to consume.
    let response = app
        .oneshot(json_request(
            "POST",
            "/platform/update",
            serde_json::json!({
                "chat_join_request": {
                    "chat": { "id": -1001 },
                    "from": { "id": 888 },
                    "invite_link": { "invite_link": link.link },
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reloaded = queries::get_link_by_token(&conn, &token).unwrap().unwrap();
    assert_eq!(reloaded.consumed_by.as_deref(), Some("777"));
}

#[tokio::test]
async fn test_payment_webhook_verifies_signature_and_marks_success() {
    let state = create_test_state();
    let (tenant_id, purchase_id) = {
        let conn = state.db.get().unwrap();
        let (tenant, _) = create_test_tenant(&conn, &state.master_key);
        let subscriber = create_test_subscriber(&conn, &tenant.id, "+15559005");
        let bundle = create_test_bundle(&conn, &tenant.id, "Premium", 1);
        let purchase = create_test_purchase(&conn, &tenant.id, &subscriber.id, &bundle.id, 86400);
        (tenant.id, purchase.id)
    };
    let app = public_app(state.clone());

    let body = serde_json::json!({
        "event": "payment.succeeded",
        "purchase_id": purchase_id,
    })
    .to_string();

    // Tampered signature first.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/hooks/payment/{tenant_id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-signature", "deadbeef")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    {
        let conn = state.db.get().unwrap();
        let purchase = queries::get_purchase_by_id(&conn, &purchase_id).unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Pending);
    }

    // Properly signed with the fixture secret.
    let mut mac = HmacSha256::new_from_slice(b"whsec_test").unwrap();
    mac.update(body.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/hooks/payment/{tenant_id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let purchase = queries::get_purchase_by_id(&conn, &purchase_id).unwrap().unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Success);

    // Prerequisites are still open, so success alone must not mint links.
    let links = queries::list_links_for_purchase(&conn, &purchase.subscriber_id, &purchase_id)
        .unwrap();
    assert!(links.is_empty());
}

#[tokio::test]
async fn test_payment_webhook_tolerates_unknown_purchase() {
    let state = create_test_state();
    let tenant_id = {
        let conn = state.db.get().unwrap();
        create_test_tenant(&conn, &state.master_key).0.id
    };
    let app = public_app(state);

    let body = serde_json::json!({
        "event": "payment.succeeded",
        "purchase_id": "no-such-purchase",
    })
    .to_string();
    let mut mac = HmacSha256::new_from_slice(b"whsec_test").unwrap();
    mac.update(body.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    // Providers retry on 5xx; a missing row is acknowledged instead.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/hooks/payment/{tenant_id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_linking_code_flow() {
    let state = create_test_state();
    let (tenant_id, subscriber_id) = {
        let conn = state.db.get().unwrap();
        let (tenant, _) = create_test_tenant(&conn, &state.master_key);
        let sub = create_test_subscriber(&conn, &tenant.id, "+15559006");
        (tenant.id, sub.id)
    };
    let app = public_app(state.clone());

    // Requesting a code succeeds even though the bot is unreachable; code
    // delivery is best-effort.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/link/request",
            serde_json::json!({
                "tenant_id": tenant_id,
                "phone": "+15559006",
                "messaging_id": "tg-5151",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["expires_in"], 300);
    let link_id = body["link_id"].as_str().unwrap().to_string();

    // Wrong code.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/link/verify",
            serde_json::json!({ "link_id": link_id, "code": "000000" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Mint a code directly so the plaintext is known, then verify it.
    let (record, code) = {
        let conn = state.db.get().unwrap();
        queries::create_linking_code(&conn, &subscriber_id, "tg-5151").unwrap()
    };
    let response = app
        .oneshot(json_request(
            "POST",
            "/link/verify",
            serde_json::json!({ "link_id": record.id, "code": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["linked"], true);

    let conn = state.db.get().unwrap();
    let subscriber = queries::get_subscriber_by_id(&conn, &subscriber_id).unwrap().unwrap();
    assert_eq!(subscriber.messaging_id.as_deref(), Some("tg-5151"));
}

#[tokio::test]
async fn test_linking_rejects_identity_owned_by_another_subscriber() {
    let state = create_test_state();
    let tenant_id = {
        let conn = state.db.get().unwrap();
        let (tenant, _) = create_test_tenant(&conn, &state.master_key);
        let owner = create_test_subscriber(&conn, &tenant.id, "+15559007");
        queries::link_messaging_identity(&conn, &owner.id, "tg-taken").unwrap();
        create_test_subscriber(&conn, &tenant.id, "+15559008");
        tenant.id
    };
    let app = public_app(state);

    let response = app
        .oneshot(json_request(
            "POST",
            "/link/request",
            serde_json::json!({
                "tenant_id": tenant_id,
                "phone": "+15559008",
                "messaging_id": "tg-taken",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
