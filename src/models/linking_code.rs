use serde::Serialize;

/// Short-lived code proving control of a messaging identity during account
/// linking. Stored hashed with a 5-minute TTL so any instance can verify it
/// and restarts lose nothing.
#[derive(Debug, Clone, Serialize)]
pub struct LinkingCode {
    pub id: String,
    #[serde(skip_serializing)]
    pub code_hash: String,
    pub subscriber_id: String,
    pub messaging_id: String,
    pub expires_at: i64,
    pub used: bool,
    pub created_at: i64,
}
