use sqlx::{Pool, Sqlite};

use crate::storage::{StoreError, validate_sqlite_table_schema};
use crate::userdb::types::UserIdentity;

use super::store_type::{UserRow, map_insert_error};

pub(super) async fn create_users_table_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
) -> Result<(), StoreError> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            creds BLOB,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_users_table_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
) -> Result<(), StoreError> {
    let expected_columns = [
        ("id", "BLOB"),
        ("name", "TEXT"),
        ("display_name", "TEXT"),
        ("creds", "BLOB"),
        ("created_at", "TIMESTAMP"),
        ("updated_at", "TIMESTAMP"),
    ];

    validate_sqlite_table_schema(pool, table_name, &expected_columns, StoreError::Storage).await
}

pub(super) async fn insert_user_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    user: &UserIdentity,
) -> Result<(), StoreError> {
    let creds = serde_json::to_vec(&user.credentials)?;

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, name, display_name, creds, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#
    ))
    .bind(user.id.as_bytes())
    .bind(&user.name)
    .bind(&user.display_name)
    .bind(creds)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .map_err(|e| map_insert_error(&user.name, e))?;

    Ok(())
}

pub(super) async fn get_user_by_name_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    name: &str,
) -> Result<Option<UserRow>, StoreError> {
    Ok(sqlx::query_as::<_, UserRow>(&format!(
        r#"
        SELECT id, name, display_name, creds, created_at, updated_at
        FROM {table_name} WHERE name = ?
        "#
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn get_user_by_id_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    id: &[u8],
) -> Result<Option<UserRow>, StoreError> {
    Ok(sqlx::query_as::<_, UserRow>(&format!(
        r#"
        SELECT id, name, display_name, creds, created_at, updated_at
        FROM {table_name} WHERE id = ?
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn update_credentials_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    id: &[u8],
    creds: &[u8],
) -> Result<u64, StoreError> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE {table_name} SET creds = ?, updated_at = ? WHERE id = ?
        "#
    ))
    .bind(creds)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
