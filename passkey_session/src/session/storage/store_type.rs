use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;

use crate::session::types::{CeremonySession, CeremonyState};
use crate::storage::{DataStore, StoreError, TableNames};
use crate::userdb::UserId;

use super::postgres::*;
use super::sqlite::*;

/// Durable mapping from ceremony token to its pending session.
///
/// At most one session exists per owner; saving a new one replaces the old.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &CeremonySession) -> Result<(), StoreError>;

    /// Returns the session regardless of its expiry.
    async fn fetch(&self, token: &str) -> Result<Option<CeremonySession>, StoreError>;

    /// Remove and return the session in one step, so only one caller can
    /// claim a token. Expiry is not checked.
    async fn take(&self, token: &str) -> Result<Option<CeremonySession>, StoreError>;

    /// Deleting an absent token succeeds.
    async fn delete(&self, token: &str) -> Result<(), StoreError>;

    /// Delete every session that expired at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Debug, FromRow)]
pub(super) struct SessionRow {
    pub(super) token: String,
    pub(super) user_id: Vec<u8>,
    pub(super) session_data: Vec<u8>,
    pub(super) expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for CeremonySession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            token: row.token,
            owner: UserId::new(row.user_id),
            state: CeremonyState(serde_json::from_slice(&row.session_data)?),
            expires_at: row.expires_at,
        })
    }
}

/// Ceremony session store on the configured SQL backend.
pub struct SqlSessionStore {
    store: Arc<dyn DataStore>,
    tables: TableNames,
}

impl SqlSessionStore {
    pub fn new(store: Arc<dyn DataStore>, tables: TableNames) -> Self {
        Self { store, tables }
    }

    /// Create the sessions table if missing and validate its columns.
    ///
    /// The users table must exist first, sessions reference it.
    pub async fn init(&self) -> Result<(), StoreError> {
        let tables = &self.tables;

        match (self.store.as_sqlite(), self.store.as_postgres()) {
            (Some(pool), _) => {
                create_sessions_table_sqlite(pool, tables).await?;
                validate_sessions_table_sqlite(pool, &tables.sessions).await
            }
            (_, Some(pool)) => {
                create_sessions_table_postgres(pool, tables).await?;
                validate_sessions_table_postgres(pool, &tables.sessions).await
            }
            _ => Err(StoreError::Config("Unsupported database type".to_string())),
        }
    }
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    #[tracing::instrument(skip(self, session), fields(user_id = %session.owner))]
    async fn save(&self, session: &CeremonySession) -> Result<(), StoreError> {
        let table = self.tables.sessions.as_str();
        let data = serde_json::to_vec(&session.state)?;

        if let Some(pool) = self.store.as_sqlite() {
            upsert_session_sqlite(pool, table, session, &data).await
        } else if let Some(pool) = self.store.as_postgres() {
            upsert_session_postgres(pool, table, session, &data).await
        } else {
            Err(StoreError::Config("Unsupported database type".to_string()))
        }
    }

    async fn fetch(&self, token: &str) -> Result<Option<CeremonySession>, StoreError> {
        let table = self.tables.sessions.as_str();

        let row = if let Some(pool) = self.store.as_sqlite() {
            get_session_sqlite(pool, table, token).await?
        } else if let Some(pool) = self.store.as_postgres() {
            get_session_postgres(pool, table, token).await?
        } else {
            return Err(StoreError::Config("Unsupported database type".to_string()));
        };

        row.map(CeremonySession::try_from).transpose()
    }

    async fn take(&self, token: &str) -> Result<Option<CeremonySession>, StoreError> {
        let table = self.tables.sessions.as_str();

        let row = if let Some(pool) = self.store.as_sqlite() {
            take_session_sqlite(pool, table, token).await?
        } else if let Some(pool) = self.store.as_postgres() {
            take_session_postgres(pool, table, token).await?
        } else {
            return Err(StoreError::Config("Unsupported database type".to_string()));
        };

        row.map(CeremonySession::try_from).transpose()
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        let table = self.tables.sessions.as_str();

        if let Some(pool) = self.store.as_sqlite() {
            delete_session_sqlite(pool, table, token).await
        } else if let Some(pool) = self.store.as_postgres() {
            delete_session_postgres(pool, table, token).await
        } else {
            Err(StoreError::Config("Unsupported database type".to_string()))
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let table = self.tables.sessions.as_str();

        let purged = if let Some(pool) = self.store.as_sqlite() {
            purge_expired_sqlite(pool, table, now).await?
        } else if let Some(pool) = self.store.as_postgres() {
            purge_expired_postgres(pool, table, now).await?
        } else {
            return Err(StoreError::Config("Unsupported database type".to_string()));
        };

        if purged > 0 {
            tracing::info!(purged, "Purged expired ceremony sessions");
        }
        Ok(purged)
    }
}
