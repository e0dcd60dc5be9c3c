use serde::{Deserialize, Serialize};

/// An owning tenant: a seller operating one or more channel bundles.
/// Admin endpoints authenticate as a tenant via bearer API key.
#[derive(Debug, Clone, Serialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    /// Payment-webhook signing secret, envelope-encrypted at rest.
    #[serde(skip_serializing)]
    pub webhook_secret: Option<Vec<u8>>,
    /// Where issued-link notifications are POSTed (None = disabled).
    pub notify_url: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    #[serde(default)]
    pub notify_url: Option<String>,
    /// Plaintext payment-webhook secret; encrypted before storage.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}
