//! Row-to-struct mapping and small query helpers.
//!
//! Each model lists its columns once as a `*_COLS` constant; SELECTs are
//! built from those constants so the `FromRow` index positions stay honest.

use rusqlite::{Connection, Params, Row};

use crate::error::Result;
use crate::models::*;

pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

pub fn query_one<T: FromRow, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params, |row| T::from_row(row))?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub const TENANT_COLS: &str = "id, name, api_key_hash, webhook_secret, notify_url, created_at";

impl FromRow for Tenant {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Tenant {
            id: row.get(0)?,
            name: row.get(1)?,
            api_key_hash: row.get(2)?,
            webhook_secret: row.get(3)?,
            notify_url: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

pub const SUBSCRIBER_COLS: &str =
    "id, tenant_id, name, phone, identity_verified, contract_signed, messaging_id, created_at, updated_at";

impl FromRow for Subscriber {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Subscriber {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            name: row.get(2)?,
            phone: row.get(3)?,
            identity_verified: row.get::<_, i32>(4)? != 0,
            contract_signed: row.get::<_, i32>(5)? != 0,
            messaging_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

pub const BUNDLE_COLS: &str =
    "id, tenant_id, name, trial, require_identity, require_contract, created_at";

impl FromRow for Bundle {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Bundle {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            name: row.get(2)?,
            trial: row.get::<_, i32>(3)? != 0,
            require_identity: row.get::<_, Option<i32>>(4)?.map(|v| v != 0),
            require_contract: row.get::<_, Option<i32>>(5)?.map(|v| v != 0),
            created_at: row.get(6)?,
        })
    }
}

pub const CHANNEL_COLS: &str = "id, bundle_id, external_id, title, active, added_at";

impl FromRow for Channel {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Channel {
            id: row.get(0)?,
            bundle_id: row.get(1)?,
            external_id: row.get(2)?,
            title: row.get(3)?,
            active: row.get::<_, i32>(4)? != 0,
            added_at: row.get(5)?,
        })
    }
}

pub const PURCHASE_COLS: &str =
    "id, tenant_id, subscriber_id, bundle_id, plan_id, amount, status, duration_seconds, \
     expires_at, delivery_status, delivery_attempts, last_delivery_attempt, created_at";

impl FromRow for Purchase {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Purchase {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            subscriber_id: row.get(2)?,
            bundle_id: row.get(3)?,
            plan_id: row.get(4)?,
            amount: row.get(5)?,
            status: row.get::<_, String>(6)?.parse().unwrap(),
            duration_seconds: row.get(7)?,
            expires_at: row.get(8)?,
            delivery_status: row.get::<_, String>(9)?.parse().unwrap(),
            delivery_attempts: row.get(10)?,
            last_delivery_attempt: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

pub const ACCESS_LINK_COLS: &str =
    "id, token, link, tenant_id, subscriber_id, purchase_id, plan_id, bundle_id, \
     channel_external_id, channel_title, duration_seconds, consumed, consumed_by, \
     consumed_at, expires_at, recovery, created_at";

impl FromRow for AccessLink {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AccessLink {
            id: row.get(0)?,
            token: row.get(1)?,
            link: row.get(2)?,
            tenant_id: row.get(3)?,
            subscriber_id: row.get(4)?,
            purchase_id: row.get(5)?,
            plan_id: row.get(6)?,
            bundle_id: row.get(7)?,
            channel_external_id: row.get(8)?,
            channel_title: row.get(9)?,
            duration_seconds: row.get(10)?,
            consumed: row.get::<_, i32>(11)? != 0,
            consumed_by: row.get(12)?,
            consumed_at: row.get(13)?,
            expires_at: row.get(14)?,
            recovery: row.get::<_, i32>(15)? != 0,
            created_at: row.get(16)?,
        })
    }
}

pub const LINKING_CODE_COLS: &str =
    "id, code_hash, subscriber_id, messaging_id, expires_at, used, created_at";

impl FromRow for LinkingCode {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LinkingCode {
            id: row.get(0)?,
            code_hash: row.get(1)?,
            subscriber_id: row.get(2)?,
            messaging_id: row.get(3)?,
            expires_at: row.get(4)?,
            used: row.get::<_, i32>(5)? != 0,
            created_at: row.get(6)?,
        })
    }
}

pub const MEMBERSHIP_EVENT_COLS: &str =
    "id, tenant_id, subscriber_id, messaging_id, channel_external_id, reason, \
     purchase_id, can_rejoin, recovered, left_at";

impl FromRow for MembershipEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(MembershipEvent {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            subscriber_id: row.get(2)?,
            messaging_id: row.get(3)?,
            channel_external_id: row.get(4)?,
            reason: row.get::<_, String>(5)?.parse().unwrap(),
            purchase_id: row.get(6)?,
            can_rejoin: row.get::<_, i32>(7)? != 0,
            recovered: row.get::<_, i32>(8)? != 0,
            left_at: row.get(9)?,
        })
    }
}
