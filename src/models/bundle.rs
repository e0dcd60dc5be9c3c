use serde::{Deserialize, Serialize};

/// A sellable collection of destination channels with shared access rules.
///
/// The step toggles are tri-state: `None` means the tenant never configured
/// the toggle, which counts as required (fail-closed).
#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Trial bundles waive identity verification and contract signing
    /// regardless of the toggles below.
    pub trial: bool,
    pub require_identity: Option<bool>,
    pub require_contract: Option<bool>,
    pub created_at: i64,
}

impl Bundle {
    pub fn identity_required(&self) -> bool {
        !self.trial && self.require_identity.unwrap_or(true)
    }

    pub fn contract_required(&self) -> bool {
        !self.trial && self.require_contract.unwrap_or(true)
    }
}

/// A destination channel inside a bundle. `external_id` is the stable
/// platform chat id; inactive channels are excluded from issuance.
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    pub id: String,
    pub bundle_id: String,
    pub external_id: String,
    pub title: String,
    pub active: bool,
    pub added_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateBundle {
    pub name: String,
    #[serde(default)]
    pub trial: bool,
    #[serde(default)]
    pub require_identity: Option<bool>,
    #[serde(default)]
    pub require_contract: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChannel {
    pub external_id: String,
    pub title: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateBundleRequirements {
    #[serde(default)]
    pub trial: Option<bool>,
    #[serde(default)]
    pub require_identity: Option<bool>,
    #[serde(default)]
    pub require_contract: Option<bool>,
}
