use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// key: a2p-profile -> reconciled registration state, one row per user
///
/// `messaging_ready` is a cached derivation of brand + campaign approval and
/// is recomputed on every reconciliation pass. `approval_notified_at` is the
/// durable gate for the one-time approval fee; once set it is never cleared.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct A2pProfile {
    pub id: Uuid,
    pub user_id: i32,
    pub brand_sid: Option<String>,
    pub messaging_service_sid: Option<String>,
    pub campaign_sid: Option<String>,
    pub brand_status: Option<String>,
    pub campaign_status: Option<String>,
    pub messaging_ready: bool,
    pub approval_notified_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// key: a2p-candidate -> registry-fetched campaign record (never persisted)
///
/// Resubmission can leave several of these behind for one brand; only one is
/// canonical at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateRecord {
    pub campaign_sid: Option<String>,
    pub messaging_service_sid: Option<String>,
    pub brand_sid: Option<String>,
    pub status: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CandidateRecord {
    /// Registry payloads are inconsistent about the status field name;
    /// resubmitted records have been observed carrying any of these.
    pub fn from_value(value: &Value) -> Self {
        let status = ["campaign_status", "status", "state"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str))
            .filter(|raw| !raw.trim().is_empty())
            .map(str::to_string);
        Self {
            campaign_sid: string_field(value, "campaign_sid"),
            messaging_service_sid: string_field(value, "messaging_service_sid"),
            brand_sid: string_field(value, "brand_sid"),
            status,
            last_updated: value
                .get("date_updated")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse().ok()),
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|raw| !raw.trim().is_empty())
        .map(str::to_string)
}

/// key: a2p-sync-outcome -> what one reconciliation pass decided
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub profile_id: Uuid,
    pub brand_status: Option<String>,
    pub campaign_status: Option<String>,
    pub messaging_ready: bool,
    pub switched_campaign: bool,
    pub first_ready: bool,
}
