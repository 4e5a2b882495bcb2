//! Role Repository

use sqlx::SqlitePool;

use crate::db::models::{Role, RoleCreate};
use crate::error::{AppError, AppResult};
use crate::utils::snowflake_id;
use crate::utils::validation::{MAX_NAME_LEN, validate_required_text};

pub async fn find_all(pool: &SqlitePool) -> AppResult<Vec<Role>> {
    let roles = sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(roles)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<Role>> {
    let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(role)
}

pub async fn find_by_name(pool: &SqlitePool, name: &str) -> AppResult<Option<Role>> {
    let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE name = ? LIMIT 1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(role)
}

pub async fn create(pool: &SqlitePool, data: RoleCreate) -> AppResult<Role> {
    validate_required_text(&data.name, "name", MAX_NAME_LEN)?;

    if find_by_name(pool, &data.name).await?.is_some() {
        return Err(AppError::conflict(format!(
            "Role '{}' already exists",
            data.name
        )));
    }

    let id = snowflake_id();
    sqlx::query("INSERT INTO roles (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(&data.name)
        .execute(pool)
        .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::Database("Failed to create role".into()))
}

pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<bool> {
    if find_by_id(pool, id).await?.is_none() {
        return Err(AppError::not_found("role", format!("Role {id} not found")));
    }

    sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(true)
}
