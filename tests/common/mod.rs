//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use rusqlite::Connection;

use gatepass::crypto::MasterKey;
use gatepass::db::{self, AppState, DbPool, queries};
use gatepass::duration::DurationInput;
use gatepass::error::{AppError, Result};
use gatepass::messaging::{BotClient, JoinLinkProvider, MintedLink};
use gatepass::models::*;

/// File-backed pool in a temp directory; SQLite in-memory databases are
/// per-connection, which defeats pooling.
pub fn create_test_pool() -> DbPool {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("gatepass.db");
    let pool = db::open_pool(path.to_str().expect("utf-8 temp path")).expect("open pool");
    // Keep the directory alive for the duration of the test run.
    let _ = dir.keep();
    pool
}

pub fn create_test_state() -> AppState {
    AppState {
        db: create_test_pool(),
        master_key: MasterKey::generate(),
        // Unroutable: handler paths that touch the bot are expected to
        // degrade, not to reach a live platform.
        bot: BotClient::new("http://127.0.0.1:1", "test-token"),
        bulk_delay_ms: 0,
    }
}

pub fn public_app(state: AppState) -> axum::Router {
    gatepass::handlers::app(state)
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Fixtures ============

pub fn create_test_tenant(conn: &Connection, master_key: &MasterKey) -> (Tenant, String) {
    queries::create_tenant(
        conn,
        &CreateTenant {
            name: "Test Tenant".into(),
            notify_url: None,
            webhook_secret: Some("whsec_test".into()),
        },
        master_key,
    )
    .expect("create tenant")
}

pub fn create_test_subscriber(conn: &Connection, tenant_id: &str, phone: &str) -> Subscriber {
    queries::create_subscriber(
        conn,
        tenant_id,
        &CreateSubscriber {
            name: "Test Subscriber".into(),
            phone: phone.into(),
        },
    )
    .expect("create subscriber")
}

/// Bundle with `channel_count` active channels ("chan-0", "chan-1", ...).
pub fn create_test_bundle(
    conn: &Connection,
    tenant_id: &str,
    name: &str,
    channel_count: usize,
) -> Bundle {
    let bundle = queries::create_bundle(
        conn,
        tenant_id,
        &CreateBundle {
            name: name.into(),
            trial: false,
            require_identity: None,
            require_contract: None,
        },
    )
    .expect("create bundle");

    for i in 0..channel_count {
        queries::add_channel(
            conn,
            &bundle.id,
            &CreateChannel {
                external_id: format!("chan-{i}"),
                title: format!("Channel {i}"),
                active: true,
            },
        )
        .expect("add channel");
    }

    bundle
}

pub fn create_test_purchase(
    conn: &Connection,
    tenant_id: &str,
    subscriber_id: &str,
    bundle_id: &str,
    duration_seconds: i64,
) -> Purchase {
    queries::create_purchase(
        conn,
        tenant_id,
        &CreatePurchase {
            subscriber_id: subscriber_id.into(),
            bundle_id: bundle_id.into(),
            plan_id: Some("plan-basic".into()),
            amount: 4999,
            duration: DurationInput::Seconds(duration_seconds),
        },
    )
    .expect("create purchase")
}

pub fn create_success_purchase(
    conn: &Connection,
    tenant_id: &str,
    subscriber_id: &str,
    bundle_id: &str,
    duration_seconds: i64,
) -> Purchase {
    let purchase =
        create_test_purchase(conn, tenant_id, subscriber_id, bundle_id, duration_seconds);
    queries::set_purchase_status(conn, &purchase.id, PurchaseStatus::Success)
        .expect("mark success");
    queries::get_purchase_by_id(conn, &purchase.id)
        .expect("reload purchase")
        .expect("purchase exists")
}

/// Subscriber with both workflow flags complete.
pub fn complete_all_steps(conn: &Connection, subscriber_id: &str) {
    queries::set_workflow_flags(conn, subscriber_id, Some(true), Some(true))
        .expect("set workflow flags");
}

// ============ Mock join-link provider ============

/// Deterministic provider: mints unique fake links, counts calls, and can
/// be told to refuse specific channels.
pub struct MockProvider {
    counter: AtomicUsize,
    fail_channels: Mutex<HashSet<String>>,
    pub revoked: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            fail_channels: Mutex::new(HashSet::new()),
            revoked: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_channel(&self, external_id: &str) {
        self.fail_channels
            .lock()
            .unwrap()
            .insert(external_id.to_string());
    }

    pub fn mint_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

impl JoinLinkProvider for MockProvider {
    async fn create_join_link(&self, channel_external_id: &str) -> Result<MintedLink> {
        if self
            .fail_channels
            .lock()
            .unwrap()
            .contains(channel_external_id)
        {
            return Err(AppError::Internal("mint refused by platform".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(MintedLink::from_link(format!(
            "https://msg.example/+join{n:08}"
        )))
    }

    async fn revoke_join_link(&self, _channel_external_id: &str, link: &str) -> Result<()> {
        self.revoked.lock().unwrap().push(link.to_string());
        Ok(())
    }

    async fn approve_join(&self, _channel_external_id: &str, _user_id: &str) -> Result<()> {
        Ok(())
    }

    async fn decline_join(&self, _channel_external_id: &str, _user_id: &str) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, _user_id: &str, _text: &str) -> Result<()> {
        Ok(())
    }
}
