use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Why a member stopped being in a channel, as reported by the platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveReason {
    Left,
    Kicked,
    Banned,
}

/// Audit record of a channel departure observed while the subscriber was
/// still entitled. `recovered` marks events that produced a recovery link.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipEvent {
    pub id: String,
    pub tenant_id: String,
    pub subscriber_id: String,
    pub messaging_id: String,
    pub channel_external_id: String,
    pub reason: LeaveReason,
    pub purchase_id: Option<String>,
    pub can_rejoin: bool,
    pub recovered: bool,
    pub left_at: i64,
}
