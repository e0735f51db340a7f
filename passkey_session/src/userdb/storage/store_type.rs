use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;

use crate::storage::{DataStore, StoreError, TableNames};
use crate::userdb::types::{Credential, UserId, UserIdentity};

use super::postgres::*;
use super::sqlite::*;

/// Durable mapping from user identity to display metadata and credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create a new account. Fails with `AlreadyExists` when the name is taken.
    async fn create_user(&self, name: &str) -> Result<UserIdentity, StoreError>;

    async fn get_user_by_name(&self, name: &str) -> Result<UserIdentity, StoreError>;

    /// Resolve the owner of a ceremony session. `NotFound` for orphans.
    async fn get_user_by_credential_owner(&self, id: &UserId) -> Result<UserIdentity, StoreError>;

    /// Overwrite the stored credential list with `user.credentials`.
    async fn save_credentials(&self, user: &UserIdentity) -> Result<(), StoreError>;
}

/// Users row as stored in SQLite/PostgreSQL; credentials are a JSON blob
#[derive(Debug, FromRow)]
pub(super) struct UserRow {
    pub(super) id: Vec<u8>,
    pub(super) name: String,
    pub(super) display_name: String,
    pub(super) creds: Option<Vec<u8>>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserIdentity {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let credentials: Vec<Credential> = match row.creds.as_deref() {
            Some(bytes) if !bytes.is_empty() => serde_json::from_slice(bytes)?,
            _ => Vec::new(),
        };

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            display_name: row.display_name,
            credentials,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Maps a uniqueness violation on insert to a readable `AlreadyExists`
pub(super) fn map_insert_error(name: &str, err: sqlx::Error) -> StoreError {
    match StoreError::from(err) {
        StoreError::AlreadyExists(_) => StoreError::AlreadyExists(format!("user '{name}'")),
        other => other,
    }
}

/// Credential store on the configured SQL backend.
pub struct SqlUserStore {
    store: Arc<dyn DataStore>,
    tables: TableNames,
}

impl SqlUserStore {
    pub fn new(store: Arc<dyn DataStore>, tables: TableNames) -> Self {
        Self { store, tables }
    }

    /// Create the users table if missing and validate its columns.
    pub async fn init(&self) -> Result<(), StoreError> {
        let table = self.tables.users.as_str();

        match (self.store.as_sqlite(), self.store.as_postgres()) {
            (Some(pool), _) => {
                create_users_table_sqlite(pool, table).await?;
                validate_users_table_sqlite(pool, table).await
            }
            (_, Some(pool)) => {
                create_users_table_postgres(pool, table).await?;
                validate_users_table_postgres(pool, table).await
            }
            _ => Err(StoreError::Config("Unsupported database type".to_string())),
        }
    }
}

#[async_trait]
impl CredentialStore for SqlUserStore {
    #[tracing::instrument(skip(self))]
    async fn create_user(&self, name: &str) -> Result<UserIdentity, StoreError> {
        let user = UserIdentity::new(name);
        let table = self.tables.users.as_str();

        let result = if let Some(pool) = self.store.as_sqlite() {
            insert_user_sqlite(pool, table, &user).await
        } else if let Some(pool) = self.store.as_postgres() {
            insert_user_postgres(pool, table, &user).await
        } else {
            Err(StoreError::Config("Unsupported database type".to_string()))
        };

        match &result {
            Ok(()) => tracing::info!(user_id = %user.id, "User created"),
            Err(StoreError::AlreadyExists(_)) => {
                tracing::info!("User creation rejected: name already taken")
            }
            Err(e) => tracing::error!(error = %e, "User creation failed"),
        }

        result.map(|()| user)
    }

    #[tracing::instrument(skip(self))]
    async fn get_user_by_name(&self, name: &str) -> Result<UserIdentity, StoreError> {
        let table = self.tables.users.as_str();

        let row = if let Some(pool) = self.store.as_sqlite() {
            get_user_by_name_sqlite(pool, table, name).await?
        } else if let Some(pool) = self.store.as_postgres() {
            get_user_by_name_postgres(pool, table, name).await?
        } else {
            return Err(StoreError::Config("Unsupported database type".to_string()));
        };

        tracing::debug!(found = row.is_some(), "User lookup by name completed");
        row.ok_or_else(|| StoreError::NotFound(format!("user '{name}'")))?
            .try_into()
    }

    #[tracing::instrument(skip(self), fields(user_id = %id))]
    async fn get_user_by_credential_owner(&self, id: &UserId) -> Result<UserIdentity, StoreError> {
        let table = self.tables.users.as_str();

        let row = if let Some(pool) = self.store.as_sqlite() {
            get_user_by_id_sqlite(pool, table, id.as_bytes()).await?
        } else if let Some(pool) = self.store.as_postgres() {
            get_user_by_id_postgres(pool, table, id.as_bytes()).await?
        } else {
            return Err(StoreError::Config("Unsupported database type".to_string()));
        };

        tracing::debug!(found = row.is_some(), "User lookup by id completed");
        row.ok_or_else(|| StoreError::NotFound(format!("user {id}")))?
            .try_into()
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id, credentials = user.credentials.len()))]
    async fn save_credentials(&self, user: &UserIdentity) -> Result<(), StoreError> {
        let table = self.tables.users.as_str();
        let creds = serde_json::to_vec(&user.credentials)?;

        let affected = if let Some(pool) = self.store.as_sqlite() {
            update_credentials_sqlite(pool, table, user.id.as_bytes(), &creds).await?
        } else if let Some(pool) = self.store.as_postgres() {
            update_credentials_postgres(pool, table, user.id.as_bytes(), &creds).await?
        } else {
            return Err(StoreError::Config("Unsupported database type".to_string()));
        };

        if affected == 0 {
            return Err(StoreError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }
}
