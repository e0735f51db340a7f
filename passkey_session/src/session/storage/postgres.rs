use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::session::types::CeremonySession;
use crate::storage::{StoreError, TableNames, validate_postgres_table_schema};

use super::store_type::SessionRow;

pub(super) async fn create_sessions_table_postgres(
    pool: &Pool<Postgres>,
    tables: &TableNames,
) -> Result<(), StoreError> {
    let (sessions, users) = (&tables.sessions, &tables.users);

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {sessions} (
            token TEXT PRIMARY KEY,
            user_id BYTEA NOT NULL UNIQUE REFERENCES {users}(id) ON DELETE CASCADE,
            session_data BYTEA NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_sessions_table_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
) -> Result<(), StoreError> {
    let expected_columns = [
        ("token", "text"),
        ("user_id", "bytea"),
        ("session_data", "bytea"),
        ("expires_at", "timestamp with time zone"),
    ];

    validate_postgres_table_schema(pool, table_name, &expected_columns, StoreError::Storage).await
}

/// Replaces the owner's pending session, if any
pub(super) async fn upsert_session_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
    session: &CeremonySession,
    data: &[u8],
) -> Result<(), StoreError> {
    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (token, user_id, session_data, expires_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE SET
            token = EXCLUDED.token,
            session_data = EXCLUDED.session_data,
            expires_at = EXCLUDED.expires_at
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

pub(super) async fn get_session_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
    token: &str,
) -> Result<Option<SessionRow>, StoreError> {
    Ok(sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        SELECT token, user_id, session_data, expires_at FROM {table_name} WHERE token = $1
        "#
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?)
}

/// `DELETE ... RETURNING` hands the row to exactly one concurrent caller
pub(super) async fn take_session_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
    token: &str,
) -> Result<Option<SessionRow>, StoreError> {
    Ok(sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        DELETE FROM {table_name} WHERE token = $1
        RETURNING token, user_id, session_data, expires_at
        "#
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn delete_session_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
    token: &str,
) -> Result<(), StoreError> {
    sqlx::query(&format!("DELETE FROM {table_name} WHERE token = $1"))
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

pub(super) async fn purge_expired_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let result = sqlx::query(&format!("DELETE FROM {table_name} WHERE expires_at <= $1"))
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
