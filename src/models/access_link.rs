use serde::Serialize;

/// A single-use join token tied to one subscriber, one channel and one
/// purchase. Rows are retained indefinitely for audit; the only mutation a
/// link ever sees is the one-way unconsumed → consumed transition (plus an
/// optional soft expiry that denies delivery accounting, not validation).
#[derive(Debug, Clone, Serialize)]
pub struct AccessLink {
    pub id: String,
    /// Opaque token extracted from the join URL; globally unique.
    pub token: String,
    /// Full join URL as minted by the platform.
    pub link: String,
    pub tenant_id: String,
    pub subscriber_id: String,
    pub purchase_id: Option<String>,
    pub plan_id: Option<String>,
    pub bundle_id: String,
    pub channel_external_id: String,
    pub channel_title: String,
    /// Informational: entitlement seconds at mint time.
    pub duration_seconds: i64,
    pub consumed: bool,
    pub consumed_by: Option<String>,
    pub consumed_at: Option<i64>,
    /// Soft expiry. None for normal issuance; recovery links always carry one.
    pub expires_at: Option<i64>,
    /// Set on links minted by membership recovery.
    pub recovery: bool,
    pub created_at: i64,
}

/// Insert payload for the Issuer.
#[derive(Debug, Clone)]
pub struct NewAccessLink<'a> {
    pub token: &'a str,
    pub link: &'a str,
    pub tenant_id: &'a str,
    pub subscriber_id: &'a str,
    pub purchase_id: Option<&'a str>,
    pub plan_id: Option<&'a str>,
    pub bundle_id: &'a str,
    pub channel_external_id: &'a str,
    pub channel_title: &'a str,
    pub duration_seconds: i64,
    pub expires_at: Option<i64>,
    pub recovery: bool,
}
