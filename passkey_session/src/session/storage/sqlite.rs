use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

use crate::session::types::CeremonySession;
use crate::storage::{StoreError, TableNames, validate_sqlite_table_schema};

use super::store_type::SessionRow;

pub(super) async fn create_sessions_table_sqlite(
    pool: &Pool<Sqlite>,
    tables: &TableNames,
) -> Result<(), StoreError> {
    let (sessions, users) = (&tables.sessions, &tables.users);

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {sessions} (
            token TEXT PRIMARY KEY,
            user_id BLOB NOT NULL UNIQUE REFERENCES {users}(id) ON DELETE CASCADE,
            session_data BLOB NOT NULL,
            expires_at TIMESTAMP NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_sessions_table_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
) -> Result<(), StoreError> {
    let expected_columns = [
        ("token", "TEXT"),
        ("user_id", "BLOB"),
        ("session_data", "BLOB"),
        ("expires_at", "TIMESTAMP"),
    ];

    validate_sqlite_table_schema(pool, table_name, &expected_columns, StoreError::Storage).await
}

/// `INSERT OR REPLACE` drops any row colliding on the token or the owner
pub(super) async fn upsert_session_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    session: &CeremonySession,
    data: &[u8],
) -> Result<(), StoreError> {
    sqlx::query(&format!(
        r#"
        INSERT OR REPLACE INTO {table_name} (token, user_id, session_data, expires_at)
        VALUES (?, ?, ?, ?)
        "#
    ))
    .bind(&session.token)
    .bind(session.owner.as_bytes())
    .bind(data)
    .bind(session.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn get_session_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    token: &str,
) -> Result<Option<SessionRow>, StoreError> {
    Ok(sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        SELECT token, user_id, session_data, expires_at FROM {table_name} WHERE token = ?
        "#
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?)
}

/// `DELETE ... RETURNING` hands the row to exactly one concurrent caller
pub(super) async fn take_session_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    token: &str,
) -> Result<Option<SessionRow>, StoreError> {
    Ok(sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        DELETE FROM {table_name} WHERE token = ?
        RETURNING token, user_id, session_data, expires_at
        "#
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn delete_session_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    token: &str,
) -> Result<(), StoreError> {
    sqlx::query(&format!("DELETE FROM {table_name} WHERE token = ?"))
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

pub(super) async fn purge_expired_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let result = sqlx::query(&format!("DELETE FROM {table_name} WHERE expires_at <= ?"))
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
