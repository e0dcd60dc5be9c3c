use serde::{Deserialize, Serialize};

/// A purchasing identity. Workflow completion flags live here; the
/// identity-verification and e-signature providers only ever flip them.
#[derive(Debug, Clone, Serialize)]
pub struct Subscriber {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: String,
    pub identity_verified: bool,
    pub contract_signed: bool,
    /// Linked external messaging identity (set via the linking-code flow).
    pub messaging_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriber {
    pub name: String,
    pub phone: String,
}
