use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{CacheData, StoreError};
use crate::userdb::UserId;

/// Engine state carried from a ceremony begin to its finish, never inspected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CeremonyState(pub serde_json::Value);

/// A pending registration or login ceremony.
#[derive(Debug, Clone, PartialEq)]
pub struct CeremonySession {
    pub token: String,
    pub owner: UserId,
    pub state: CeremonyState,
    pub expires_at: DateTime<Utc>,
}

impl CeremonySession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A session issued after a successful login.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub ttl: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct StoredSession {
    pub(super) user_id: UserId,
    pub(super) expires_at: DateTime<Utc>,
    pub(super) ttl: u64,
}

impl TryFrom<&StoredSession> for CacheData {
    type Error = StoreError;

    fn try_from(data: &StoredSession) -> Result<Self, Self::Error> {
        Ok(Self {
            value: serde_json::to_string(data)?,
        })
    }
}

impl TryFrom<CacheData> for StoredSession {
    type Error = StoreError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        Ok(serde_json::from_str(&data.value)?)
    }
}
