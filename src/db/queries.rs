use chrono::Utc;
use rusqlite::{Connection, params, types::Value};
use uuid::Uuid;

use crate::crypto::{MasterKey, hash_secret};
use crate::error::Result;
use crate::models::*;

use super::from_row::{
    ACCESS_LINK_COLS, BUNDLE_COLS, CHANNEL_COLS, LINKING_CODE_COLS, MEMBERSHIP_EVENT_COLS,
    PURCHASE_COLS, SUBSCRIBER_COLS, TENANT_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builder for dynamic UPDATE statements with optional fields.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Tenants ============

/// Generate a tenant API key with gp_ prefix
pub fn generate_api_key() -> String {
    format!("gp_{}", Uuid::new_v4().to_string().replace("-", ""))
}

/// Create a tenant. Returns the record and the plaintext API key (shown
/// once; only its hash is stored). The webhook secret, when provided, is
/// envelope-encrypted under the new tenant's id.
pub fn create_tenant(
    conn: &Connection,
    input: &CreateTenant,
    master_key: &MasterKey,
) -> Result<(Tenant, String)> {
    let id = gen_id();
    let now = now();
    let api_key = generate_api_key();
    let api_key_hash = hash_secret(&api_key);

    let webhook_secret: Option<Vec<u8>> = input
        .webhook_secret
        .as_deref()
        .map(|s| master_key.encrypt(&id, s.as_bytes()))
        .transpose()?;

    conn.execute(
        "INSERT INTO tenants (id, name, api_key_hash, webhook_secret, notify_url, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, &input.name, &api_key_hash, &webhook_secret, &input.notify_url, now],
    )?;

    Ok((
        Tenant {
            id,
            name: input.name.clone(),
            api_key_hash,
            webhook_secret,
            notify_url: input.notify_url.clone(),
            created_at: now,
        },
        api_key,
    ))
}

pub fn get_tenant_by_id(conn: &Connection, id: &str) -> Result<Option<Tenant>> {
    query_one(
        conn,
        &format!("SELECT {} FROM tenants WHERE id = ?1", TENANT_COLS),
        &[&id],
    )
}

pub fn get_tenant_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<Tenant>> {
    let hash = hash_secret(api_key);
    query_one(
        conn,
        &format!("SELECT {} FROM tenants WHERE api_key_hash = ?1", TENANT_COLS),
        &[&hash],
    )
}

// ============ Subscribers ============

pub fn create_subscriber(
    conn: &Connection,
    tenant_id: &str,
    input: &CreateSubscriber,
) -> Result<Subscriber> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO subscribers (id, tenant_id, name, phone, identity_verified, contract_signed, messaging_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, 0, NULL, ?5, ?6)",
        params![&id, tenant_id, &input.name, &input.phone, now, now],
    )?;

    Ok(Subscriber {
        id,
        tenant_id: tenant_id.to_string(),
        name: input.name.clone(),
        phone: input.phone.clone(),
        identity_verified: false,
        contract_signed: false,
        messaging_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_subscriber_by_id(conn: &Connection, id: &str) -> Result<Option<Subscriber>> {
    query_one(
        conn,
        &format!("SELECT {} FROM subscribers WHERE id = ?1", SUBSCRIBER_COLS),
        &[&id],
    )
}

pub fn get_subscriber_by_phone(
    conn: &Connection,
    tenant_id: &str,
    phone: &str,
) -> Result<Option<Subscriber>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscribers WHERE tenant_id = ?1 AND phone = ?2",
            SUBSCRIBER_COLS
        ),
        params![tenant_id, phone],
    )
}

pub fn get_subscriber_by_messaging_id(
    conn: &Connection,
    messaging_id: &str,
) -> Result<Option<Subscriber>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscribers WHERE messaging_id = ?1",
            SUBSCRIBER_COLS
        ),
        &[&messaging_id],
    )
}

/// Flip workflow completion flags. `None` leaves a flag untouched.
pub fn set_workflow_flags(
    conn: &Connection,
    id: &str,
    identity_verified: Option<bool>,
    contract_signed: Option<bool>,
) -> Result<bool> {
    UpdateBuilder::new("subscribers", id)
        .with_updated_at()
        .set_opt("identity_verified", identity_verified.map(|v| v as i32))
        .set_opt("contract_signed", contract_signed.map(|v| v as i32))
        .execute(conn)
}

/// Attach a messaging identity to a subscriber (linking-code flow).
pub fn link_messaging_identity(
    conn: &Connection,
    subscriber_id: &str,
    messaging_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE subscribers SET messaging_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![messaging_id, now(), subscriber_id],
    )?;
    Ok(affected > 0)
}

// ============ Bundles & Channels ============

pub fn create_bundle(conn: &Connection, tenant_id: &str, input: &CreateBundle) -> Result<Bundle> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO bundles (id, tenant_id, name, trial, require_identity, require_contract, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            tenant_id,
            &input.name,
            input.trial as i32,
            input.require_identity.map(|v| v as i32),
            input.require_contract.map(|v| v as i32),
            now
        ],
    )?;

    Ok(Bundle {
        id,
        tenant_id: tenant_id.to_string(),
        name: input.name.clone(),
        trial: input.trial,
        require_identity: input.require_identity,
        require_contract: input.require_contract,
        created_at: now,
    })
}

pub fn get_bundle_by_id(conn: &Connection, id: &str) -> Result<Option<Bundle>> {
    query_one(
        conn,
        &format!("SELECT {} FROM bundles WHERE id = ?1", BUNDLE_COLS),
        &[&id],
    )
}

pub fn update_bundle_requirements(
    conn: &Connection,
    id: &str,
    input: &UpdateBundleRequirements,
) -> Result<bool> {
    UpdateBuilder::new("bundles", id)
        .set_opt("trial", input.trial.map(|v| v as i32))
        .set_opt("require_identity", input.require_identity.map(|v| v as i32))
        .set_opt("require_contract", input.require_contract.map(|v| v as i32))
        .execute(conn)
}

pub fn add_channel(conn: &Connection, bundle_id: &str, input: &CreateChannel) -> Result<Channel> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO channels (id, bundle_id, external_id, title, active, added_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, bundle_id, &input.external_id, &input.title, input.active as i32, now],
    )?;

    Ok(Channel {
        id,
        bundle_id: bundle_id.to_string(),
        external_id: input.external_id.clone(),
        title: input.title.clone(),
        active: input.active,
        added_at: now,
    })
}

pub fn list_channels(conn: &Connection, bundle_id: &str) -> Result<Vec<Channel>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM channels WHERE bundle_id = ?1 ORDER BY added_at",
            CHANNEL_COLS
        ),
        &[&bundle_id],
    )
}

pub fn list_active_channels(conn: &Connection, bundle_id: &str) -> Result<Vec<Channel>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM channels WHERE bundle_id = ?1 AND active = 1 ORDER BY added_at",
            CHANNEL_COLS
        ),
        &[&bundle_id],
    )
}

pub fn count_active_channels(conn: &Connection, bundle_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM channels WHERE bundle_id = ?1 AND active = 1",
        params![bundle_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

// ============ Purchases ============

/// Create a purchase at checkout time. The entitlement expiry is fixed here
/// (purchase time + normalized duration) and never silently recomputed.
pub fn create_purchase(
    conn: &Connection,
    tenant_id: &str,
    input: &CreatePurchase,
) -> Result<Purchase> {
    let id = gen_id();
    let now = now();
    let duration_seconds = input.duration.normalize();
    let expires_at = now + duration_seconds;

    conn.execute(
        "INSERT INTO purchases (id, tenant_id, subscriber_id, bundle_id, plan_id, amount, status, duration_seconds, expires_at, delivery_status, delivery_attempts, last_delivery_attempt, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, 'pending', 0, NULL, ?9)",
        params![
            &id,
            tenant_id,
            &input.subscriber_id,
            &input.bundle_id,
            &input.plan_id,
            input.amount,
            duration_seconds,
            expires_at,
            now
        ],
    )?;

    Ok(Purchase {
        id,
        tenant_id: tenant_id.to_string(),
        subscriber_id: input.subscriber_id.clone(),
        bundle_id: input.bundle_id.clone(),
        plan_id: input.plan_id.clone(),
        amount: input.amount,
        status: PurchaseStatus::Pending,
        duration_seconds,
        expires_at: Some(expires_at),
        delivery_status: DeliveryStatus::Pending,
        delivery_attempts: 0,
        last_delivery_attempt: None,
        created_at: now,
    })
}

pub fn get_purchase_by_id(conn: &Connection, id: &str) -> Result<Option<Purchase>> {
    query_one(
        conn,
        &format!("SELECT {} FROM purchases WHERE id = ?1", PURCHASE_COLS),
        &[&id],
    )
}

/// Most recent purchase for a subscriber in the given status.
pub fn latest_purchase_by_status(
    conn: &Connection,
    subscriber_id: &str,
    status: PurchaseStatus,
) -> Result<Option<Purchase>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM purchases WHERE subscriber_id = ?1 AND status = ?2 ORDER BY created_at DESC LIMIT 1",
            PURCHASE_COLS
        ),
        params![subscriber_id, status.as_ref()],
    )
}

pub fn set_purchase_status(conn: &Connection, id: &str, status: PurchaseStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE purchases SET status = ?1 WHERE id = ?2",
        params![status.as_ref(), id],
    )?;
    Ok(affected > 0)
}

/// Record the start of a delivery attempt: in_progress, attempts + 1.
pub fn mark_delivery_attempt(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE purchases SET delivery_status = 'in_progress', delivery_attempts = delivery_attempts + 1, last_delivery_attempt = ?1 WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(())
}

pub fn set_delivery_status(conn: &Connection, id: &str, status: DeliveryStatus) -> Result<()> {
    conn.execute(
        "UPDATE purchases SET delivery_status = ?1 WHERE id = ?2",
        params![status.as_ref(), id],
    )?;
    Ok(())
}

/// Successful purchases whose link delivery never completed (admin sweep).
pub fn list_purchases_pending_delivery(
    conn: &Connection,
    tenant_id: &str,
    limit: i64,
) -> Result<Vec<Purchase>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM purchases WHERE tenant_id = ?1 AND status = 'success' AND delivery_status != 'completed' ORDER BY created_at DESC LIMIT ?2",
            PURCHASE_COLS
        ),
        params![tenant_id, limit],
    )
}

/// Successful, undelivered purchases for one subscriber (retried after the
/// subscriber links a messaging identity).
pub fn list_undelivered_for_subscriber(
    conn: &Connection,
    subscriber_id: &str,
) -> Result<Vec<Purchase>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM purchases WHERE subscriber_id = ?1 AND status = 'success' AND delivery_status != 'completed' ORDER BY created_at DESC",
            PURCHASE_COLS
        ),
        &[&subscriber_id],
    )
}

// ============ Access Links ============

/// Look up a still-pending link (unconsumed, no soft expiry) for a
/// subscriber/purchase/channel triple. This is the pre-mint reuse check
/// that makes duplicate issuance a no-op.
pub fn get_pending_link(
    conn: &Connection,
    subscriber_id: &str,
    purchase_id: Option<&str>,
    channel_external_id: &str,
) -> Result<Option<AccessLink>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM access_links WHERE subscriber_id = ?1 AND purchase_id IS ?2 AND channel_external_id = ?3 AND consumed = 0 AND expires_at IS NULL",
            ACCESS_LINK_COLS
        ),
        params![subscriber_id, purchase_id, channel_external_id],
    )
}

/// Persist a freshly minted link. Uses INSERT OR IGNORE against the pending
/// uniqueness index; on conflict the already-pending row is returned, so a
/// racing duplicate mint degrades to a no-op.
pub fn insert_access_link(conn: &Connection, new: &NewAccessLink<'_>) -> Result<AccessLink> {
    let id = gen_id();
    let now = now();

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO access_links (id, token, link, tenant_id, subscriber_id, purchase_id, plan_id, bundle_id, channel_external_id, channel_title, duration_seconds, consumed, consumed_by, consumed_at, expires_at, recovery, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, NULL, NULL, ?12, ?13, ?14)",
        params![
            &id,
            new.token,
            new.link,
            new.tenant_id,
            new.subscriber_id,
            new.purchase_id,
            new.plan_id,
            new.bundle_id,
            new.channel_external_id,
            new.channel_title,
            new.duration_seconds,
            new.expires_at,
            new.recovery as i32,
            now
        ],
    )?;

    if inserted == 0 {
        // Lost a race against another mint for the same pending slot; hand
        // back whichever row won.
        return get_pending_link(
            conn,
            new.subscriber_id,
            new.purchase_id,
            new.channel_external_id,
        )?
        .ok_or_else(|| {
            crate::error::AppError::Conflict("concurrent issuance for this channel".into())
        });
    }

    Ok(AccessLink {
        id,
        token: new.token.to_string(),
        link: new.link.to_string(),
        tenant_id: new.tenant_id.to_string(),
        subscriber_id: new.subscriber_id.to_string(),
        purchase_id: new.purchase_id.map(String::from),
        plan_id: new.plan_id.map(String::from),
        bundle_id: new.bundle_id.to_string(),
        channel_external_id: new.channel_external_id.to_string(),
        channel_title: new.channel_title.to_string(),
        duration_seconds: new.duration_seconds,
        consumed: false,
        consumed_by: None,
        consumed_at: None,
        expires_at: new.expires_at,
        recovery: new.recovery,
        created_at: now,
    })
}

pub fn get_link_by_token(conn: &Connection, token: &str) -> Result<Option<AccessLink>> {
    query_one(
        conn,
        &format!("SELECT {} FROM access_links WHERE token = ?1", ACCESS_LINK_COLS),
        &[&token],
    )
}

/// Read-only validity check: a link is honorable iff it exists and has not
/// been consumed. Deliberately no time-based check here; issuance and first
/// use can legitimately be far apart.
pub fn get_unconsumed_link_by_token(
    conn: &Connection,
    token: &str,
) -> Result<Option<AccessLink>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM access_links WHERE token = ?1 AND consumed = 0",
            ACCESS_LINK_COLS
        ),
        &[&token],
    )
}

/// Atomically consume a link: one compare-and-swap statement that finds the
/// unconsumed row and marks it consumed in the same step. Returns false when
/// no unconsumed row matched, in which case the caller must deny the join.
/// Two racing consumers of the same token can never both see `true`.
pub fn consume_link(conn: &Connection, token: &str, consumer_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE access_links SET consumed = 1, consumed_by = ?2, consumed_at = ?3 WHERE token = ?1 AND consumed = 0",
        params![token, consumer_id, now()],
    )?;
    Ok(affected > 0)
}

pub fn list_links_for_purchase(
    conn: &Connection,
    subscriber_id: &str,
    purchase_id: &str,
) -> Result<Vec<AccessLink>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM access_links WHERE subscriber_id = ?1 AND purchase_id = ?2 ORDER BY created_at",
            ACCESS_LINK_COLS
        ),
        params![subscriber_id, purchase_id],
    )
}

pub fn list_links_for_subscriber(
    conn: &Connection,
    subscriber_id: &str,
) -> Result<Vec<AccessLink>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM access_links WHERE subscriber_id = ?1 ORDER BY created_at DESC",
            ACCESS_LINK_COLS
        ),
        &[&subscriber_id],
    )
}

/// Links that count toward delivery for a purchase: soft expiry (if any)
/// has not passed; consumption state is irrelevant on this path.
pub fn count_deliverable_links(
    conn: &Connection,
    subscriber_id: &str,
    purchase_id: &str,
) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM access_links WHERE subscriber_id = ?1 AND purchase_id = ?2 AND (expires_at IS NULL OR expires_at > ?3)",
        params![subscriber_id, purchase_id, now()],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Soft-expire every pending link a subscriber holds for one channel.
/// Denies delivery accounting without touching the consumption flag.
pub fn soft_expire_pending_links(
    conn: &Connection,
    subscriber_id: &str,
    channel_external_id: &str,
) -> Result<usize> {
    let now = now();
    let affected = conn.execute(
        "UPDATE access_links SET expires_at = ?3 WHERE subscriber_id = ?1 AND channel_external_id = ?2 AND consumed = 0 AND (expires_at IS NULL OR expires_at > ?3)",
        params![subscriber_id, channel_external_id, now],
    )?;
    Ok(affected)
}

/// Consumed links for a subscriber+channel whose soft expiry has not passed,
/// newest first. Feed for the entitlement lookup in membership recovery.
pub fn list_consumed_links_for_channel(
    conn: &Connection,
    subscriber_id: &str,
    channel_external_id: &str,
) -> Result<Vec<AccessLink>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM access_links WHERE subscriber_id = ?1 AND channel_external_id = ?2 AND consumed = 1 AND (expires_at IS NULL OR expires_at > ?3) ORDER BY created_at DESC",
            ACCESS_LINK_COLS
        ),
        params![subscriber_id, channel_external_id, now()],
    )
}

// ============ Linking Codes ============

const LINKING_CODE_TTL_SECONDS: i64 = 5 * 60;

fn generate_linking_code() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(100000..1000000))
}

/// Create a linking code for a subscriber/messaging-identity pair. Returns
/// the record and the plaintext code (sent to the messaging identity; only
/// the hash is stored).
pub fn create_linking_code(
    conn: &Connection,
    subscriber_id: &str,
    messaging_id: &str,
) -> Result<(LinkingCode, String)> {
    let id = gen_id();
    let code = generate_linking_code();
    let code_hash = hash_secret(&code);
    let now = now();
    let expires_at = now + LINKING_CODE_TTL_SECONDS;

    conn.execute(
        "INSERT INTO linking_codes (id, code_hash, subscriber_id, messaging_id, expires_at, used, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![&id, &code_hash, subscriber_id, messaging_id, expires_at, now],
    )?;

    Ok((
        LinkingCode {
            id,
            code_hash,
            subscriber_id: subscriber_id.to_string(),
            messaging_id: messaging_id.to_string(),
            expires_at,
            used: false,
            created_at: now,
        },
        code,
    ))
}

pub fn get_linking_code_by_id(conn: &Connection, id: &str) -> Result<Option<LinkingCode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM linking_codes WHERE id = ?1", LINKING_CODE_COLS),
        &[&id],
    )
}

pub fn mark_linking_code_used(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("UPDATE linking_codes SET used = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn cleanup_expired_linking_codes(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM linking_codes WHERE expires_at < ?1 OR used = 1",
        params![now()],
    )?;
    Ok(deleted)
}

// ============ Membership Events ============

pub struct NewMembershipEvent<'a> {
    pub tenant_id: &'a str,
    pub subscriber_id: &'a str,
    pub messaging_id: &'a str,
    pub channel_external_id: &'a str,
    pub reason: LeaveReason,
    pub purchase_id: Option<&'a str>,
    pub can_rejoin: bool,
    pub recovered: bool,
}

pub fn record_membership_event(
    conn: &Connection,
    new: &NewMembershipEvent<'_>,
) -> Result<MembershipEvent> {
    let id = gen_id();
    let left_at = now();

    conn.execute(
        "INSERT INTO membership_events (id, tenant_id, subscriber_id, messaging_id, channel_external_id, reason, purchase_id, can_rejoin, recovered, left_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            &id,
            new.tenant_id,
            new.subscriber_id,
            new.messaging_id,
            new.channel_external_id,
            new.reason.as_ref(),
            new.purchase_id,
            new.can_rejoin as i32,
            new.recovered as i32,
            left_at
        ],
    )?;

    Ok(MembershipEvent {
        id,
        tenant_id: new.tenant_id.to_string(),
        subscriber_id: new.subscriber_id.to_string(),
        messaging_id: new.messaging_id.to_string(),
        channel_external_id: new.channel_external_id.to_string(),
        reason: new.reason,
        purchase_id: new.purchase_id.map(String::from),
        can_rejoin: new.can_rejoin,
        recovered: new.recovered,
        left_at,
    })
}

pub fn list_membership_events(
    conn: &Connection,
    subscriber_id: &str,
) -> Result<Vec<MembershipEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM membership_events WHERE subscriber_id = ?1 ORDER BY left_at DESC",
            MEMBERSHIP_EVENT_COLS
        ),
        &[&subscriber_id],
    )
}
