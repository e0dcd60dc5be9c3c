pub mod from_row;
pub mod queries;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::crypto::MasterKey;
use crate::error::Result;
use crate::messaging::BotClient;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub master_key: MasterKey,
    pub bot: BotClient,
    /// Inter-item pause for bulk delivery recovery (external rate limits).
    pub bulk_delay_ms: u64,
}

/// Open a pooled connection to the SQLite database at `path` and make sure
/// the schema exists.
pub fn open_pool(path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });
    let pool = r2d2::Pool::new(manager)?;
    init_db(&pool.get()?)?;
    Ok(pool)
}

/// Create all tables and indexes. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            api_key_hash TEXT NOT NULL UNIQUE,
            webhook_secret BLOB,
            notify_url TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS subscribers (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            identity_verified INTEGER NOT NULL DEFAULT 0,
            contract_signed INTEGER NOT NULL DEFAULT 0,
            messaging_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (tenant_id, phone)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS ux_subscribers_messaging
            ON subscribers(messaging_id) WHERE messaging_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS bundles (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            name TEXT NOT NULL,
            trial INTEGER NOT NULL DEFAULT 0,
            require_identity INTEGER,
            require_contract INTEGER,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS channels (
            id TEXT PRIMARY KEY,
            bundle_id TEXT NOT NULL REFERENCES bundles(id),
            external_id TEXT NOT NULL,
            title TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            added_at INTEGER NOT NULL,
            UNIQUE (bundle_id, external_id)
        );

        CREATE TABLE IF NOT EXISTS purchases (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            subscriber_id TEXT NOT NULL REFERENCES subscribers(id),
            bundle_id TEXT NOT NULL REFERENCES bundles(id),
            plan_id TEXT,
            amount INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            duration_seconds INTEGER NOT NULL,
            expires_at INTEGER,
            delivery_status TEXT NOT NULL DEFAULT 'pending',
            delivery_attempts INTEGER NOT NULL DEFAULT 0,
            last_delivery_attempt INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_purchases_subscriber
            ON purchases(subscriber_id, status, created_at);

        CREATE TABLE IF NOT EXISTS access_links (
            id TEXT PRIMARY KEY,
            token TEXT NOT NULL UNIQUE,
            link TEXT NOT NULL,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            subscriber_id TEXT NOT NULL REFERENCES subscribers(id),
            purchase_id TEXT REFERENCES purchases(id),
            plan_id TEXT,
            bundle_id TEXT NOT NULL REFERENCES bundles(id),
            channel_external_id TEXT NOT NULL,
            channel_title TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL,
            consumed INTEGER NOT NULL DEFAULT 0,
            consumed_by TEXT,
            consumed_at INTEGER,
            expires_at INTEGER,
            recovery INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS ux_access_links_pending
            ON access_links(subscriber_id, purchase_id, channel_external_id)
            WHERE consumed = 0 AND expires_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_access_links_subscriber_channel
            ON access_links(subscriber_id, channel_external_id);
        CREATE INDEX IF NOT EXISTS idx_access_links_purchase
            ON access_links(subscriber_id, purchase_id);

        CREATE TABLE IF NOT EXISTS linking_codes (
            id TEXT PRIMARY KEY,
            code_hash TEXT NOT NULL UNIQUE,
            subscriber_id TEXT NOT NULL REFERENCES subscribers(id),
            messaging_id TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            used INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_linking_codes_expiry
            ON linking_codes(expires_at);

        CREATE TABLE IF NOT EXISTS membership_events (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            subscriber_id TEXT NOT NULL,
            messaging_id TEXT NOT NULL,
            channel_external_id TEXT NOT NULL,
            reason TEXT NOT NULL,
            purchase_id TEXT,
            can_rejoin INTEGER NOT NULL DEFAULT 0,
            recovered INTEGER NOT NULL DEFAULT 0,
            left_at INTEGER NOT NULL
        );",
    )?;
    Ok(())
}
