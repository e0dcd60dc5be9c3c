use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::duration::DurationInput;

/// One payment for one bundle by one subscriber. Rows are never deleted;
/// `expires_at` is stamped when the payment first succeeds and only changes
/// through explicit regeneration.
#[derive(Debug, Clone, Serialize)]
pub struct Purchase {
    pub id: String,
    pub tenant_id: String,
    pub subscriber_id: String,
    pub bundle_id: String,
    pub plan_id: Option<String>,
    /// Amount in minor currency units.
    pub amount: i64,
    pub status: PurchaseStatus,
    pub duration_seconds: i64,
    pub expires_at: Option<i64>,
    pub delivery_status: DeliveryStatus,
    pub delivery_attempts: i64,
    pub last_delivery_attempt: Option<i64>,
    pub created_at: i64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Success,
    Failed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchase {
    pub subscriber_id: String,
    pub bundle_id: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    pub amount: i64,
    /// Seconds or free text ("3 months", "1 year"); normalized on create.
    pub duration: DurationInput,
}
