use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Activity event kinds. The numeric encoding is part of the stored format.
pub const ACTIVITY_JOIN: i32 = 1;
pub const ACTIVITY_SENT: i32 = 2;
pub const ACTIVITY_RECEIVED: i32 = 3;

/// One entry in an account's append-only activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    #[serde(rename = "type")]
    pub kind: i32,
    pub args: serde_json::Value,
    pub date: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn join(username: &str) -> Self {
        ActivityEvent {
            kind: ACTIVITY_JOIN,
            args: serde_json::json!({ "user": username }),
            date: Utc::now(),
        }
    }

    pub fn sent(from: &str, to: &str, amount: Decimal) -> Self {
        ActivityEvent {
            kind: ACTIVITY_SENT,
            args: serde_json::json!({ "from": from, "to": to, "amount": amount }),
            date: Utc::now(),
        }
    }

    pub fn received(from: &str, to: &str, amount: Decimal) -> Self {
        ActivityEvent {
            kind: ACTIVITY_RECEIVED,
            args: serde_json::json!({ "from": from, "to": to, "amount": amount }),
            date: Utc::now(),
        }
    }
}

/// A user's ledger record. `username` is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub username: String,
    pub balance: Decimal,
    pub identity_hash: String,
    pub social_id: Option<String>,
    pub bio: String,
    pub country: String,
    pub join_date: DateTime<Utc>,
    pub activity: Json<Vec<ActivityEvent>>,
    pub warning: Option<String>,
}

/// Singleton system-wide transfer lock. A missing row means unlocked.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GlobalLock {
    pub is_locked: bool,
    pub lock_message: String,
}

impl Default for GlobalLock {
    fn default() -> Self {
        GlobalLock {
            is_locked: false,
            lock_message: String::new(),
        }
    }
}

/// Registration / login request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct VerifyRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 4, max = 64))]
    pub code: String,
}

/// Funds transfer request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct TransferRequest {
    #[validate(length(min = 1, max = 50))]
    pub sender: String,
    #[validate(length(min = 1, max = 50))]
    pub recipient: String,
    pub amount: Decimal,
}

/// Mining credit request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct MineRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(range(min = 1))]
    pub elapsed_seconds: u64,
}

/// Administrative warning request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct WarnRequest {
    #[validate(length(min = 1, max = 50))]
    pub admin: String,
    #[validate(length(min = 1, max = 50))]
    pub target: String,
    #[validate(length(min = 1, max = 500))]
    pub message: String,
}

/// Administrative global-lock request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct LockRequest {
    #[validate(length(min = 1, max = 50))]
    pub admin: String,
    pub is_locked: bool,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub lock_message: String,
}

/// Holder-initiated warning dismissal
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct DismissWarningRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
}

/// Holder-initiated account deletion
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct DeleteAccountRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
}

/// Holder-initiated profile edit; only descriptive metadata.
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

/// Registration / login response
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub created: bool,
    pub message: String,
    pub account: Account,
}

/// Transfer response
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    pub success: bool,
    pub new_balance: Decimal,
}

/// Mining response
#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub reward: Decimal,
    pub new_balance: Decimal,
}

/// One leaderboard row, ordered by balance descending.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct LeaderboardEntry {
    pub username: String,
    pub balance: Decimal,
    pub country: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_event_encoding() {
        let event = ActivityEvent::join("Alice");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], 1);
        assert_eq!(value["args"]["user"], "Alice");
        assert!(value["date"].is_string());
    }

    #[test]
    fn test_global_lock_default_is_unlocked() {
        let lock = GlobalLock::default();
        assert!(!lock.is_locked);
        assert!(lock.lock_message.is_empty());
    }
}
