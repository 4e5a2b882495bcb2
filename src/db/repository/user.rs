//! User Repository
//!
//! CRUD plus the privileged identity mutations: role assignment, account
//! verification, and token lifecycle. Role loading is an explicit step
//! ([`load_with_roles`] / [`find_all_with_roles`]); a plain [`User`] fetched
//! here never carries a role snapshot, so the derived name list can never go
//! stale.

use sqlx::SqlitePool;

use super::role;
use crate::db::models::{Role, User, UserWithRoles};
use crate::error::{AppError, AppResult};
use crate::schema::ValidatedUser;
use crate::utils::{now_millis, snowflake_id};

const USER_SELECT: &str = "SELECT id, email, password, verified, verification_token, password_reset_token, tokens_revoked_at, created_at, updated_at FROM users";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<User>> {
    let sql = format!("{USER_SELECT} WHERE id = ?");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    let sql = format!("{USER_SELECT} WHERE email = ? LIMIT 1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_all(pool: &SqlitePool) -> AppResult<Vec<User>> {
    let sql = format!("{USER_SELECT} ORDER BY id");
    let users = sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?;
    Ok(users)
}

pub async fn find_page(pool: &SqlitePool, limit: i64, offset: i64) -> AppResult<(Vec<User>, i64)> {
    let sql = format!("{USER_SELECT} ORDER BY id LIMIT ? OFFSET ?");
    let users = sqlx::query_as::<_, User>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok((users, total))
}

/// The store assigns the id and a fresh verification token. Inbound role
/// references are not interpreted here; association rows only come from
/// [`assign_role`].
pub async fn create(pool: &SqlitePool, data: ValidatedUser) -> AppResult<User> {
    if find_by_email(pool, &data.email).await?.is_some() {
        return Err(AppError::conflict(format!(
            "Email '{}' already exists",
            data.email
        )));
    }

    let id = snowflake_id();
    let now = now_millis();
    let verification_token = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (id, email, password, verified, verification_token, password_reset_token, created_at, updated_at) VALUES (?1, ?2, ?3, 0, ?4, '', ?5, ?5)",
    )
    .bind(id)
    .bind(&data.email)
    .bind(data.password.as_deref().unwrap_or(""))
    .bind(&verification_token)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::Database("Failed to create user".into()))
}

/// The email is always written; the password only when the payload carries one.
pub async fn update(pool: &SqlitePool, id: i64, data: ValidatedUser) -> AppResult<User> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE users SET email = ?1, password = COALESCE(?2, password), updated_at = ?3 WHERE id = ?4",
    )
    .bind(&data.email)
    .bind(data.password.as_deref())
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(AppError::not_found("user", format!("User {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("user", format!("User {id} not found")))
}

pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<bool> {
    let rows = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(rows.rows_affected() > 0)
}

/// Load the current role set for a user and recompute the derived name list.
/// A user with no roles comes back with empty (not null) `roles` and
/// `role_names`.
pub async fn load_with_roles(pool: &SqlitePool, user: User) -> AppResult<UserWithRoles> {
    let roles = roles_for(pool, user.id).await?;
    Ok(UserWithRoles::new(user, roles))
}

pub async fn find_all_with_roles(pool: &SqlitePool) -> AppResult<Vec<UserWithRoles>> {
    let users = find_all(pool).await?;
    let mut loaded = Vec::with_capacity(users.len());
    for user in users {
        let roles = roles_for(pool, user.id).await?;
        loaded.push(UserWithRoles::new(user, roles));
    }
    Ok(loaded)
}

async fn roles_for(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<Role>> {
    let roles = sqlx::query_as::<_, Role>(
        "SELECT r.id, r.name FROM roles r JOIN user_role ur ON ur.role_id = r.id WHERE ur.user_id = ? ORDER BY r.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(roles)
}

/// Attach a role to a user by role name. No pre-check on the pair: the
/// composite primary key resolves a duplicate assign into a conflict,
/// never two rows.
pub async fn assign_role(pool: &SqlitePool, user_id: i64, role_name: &str) -> AppResult<()> {
    let role = role::find_by_name(pool, role_name)
        .await?
        .ok_or_else(|| AppError::not_found("role", format!("Role '{role_name}' not found")))?;

    let now = now_millis();
    sqlx::query(
        "INSERT INTO user_role (role_id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
    )
    .bind(role.id)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Detach a role from a user by role name. Removing a pair that does not
/// exist is a not-found error.
pub async fn unassign_role(pool: &SqlitePool, user_id: i64, role_name: &str) -> AppResult<()> {
    let role = role::find_by_name(pool, role_name)
        .await?
        .ok_or_else(|| AppError::not_found("role", format!("Role '{role_name}' not found")))?;

    let rows = sqlx::query("DELETE FROM user_role WHERE role_id = ? AND user_id = ?")
        .bind(role.id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if rows.rows_affected() == 0 {
        return Err(AppError::not_found(
            "user_role",
            format!("User {user_id} has no role '{role_name}'"),
        ));
    }
    Ok(())
}

/// Mark the account verified and clear its verification token in one
/// statement. Verifying an already verified user is a no-op, not an error.
pub async fn verify(pool: &SqlitePool, user_id: i64) -> AppResult<()> {
    let rows = sqlx::query(
        "UPDATE users SET verified = 1, verification_token = '', updated_at = ? WHERE id = ?",
    )
    .bind(now_millis())
    .bind(user_id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(AppError::not_found(
            "user",
            format!("User {user_id} not found"),
        ));
    }
    Ok(())
}

pub async fn issue_password_reset(pool: &SqlitePool, user_id: i64) -> AppResult<String> {
    let token = uuid::Uuid::new_v4().to_string();
    let rows = sqlx::query(
        "UPDATE users SET password_reset_token = ?1, updated_at = ?2 WHERE id = ?3",
    )
    .bind(&token)
    .bind(now_millis())
    .bind(user_id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(AppError::not_found(
            "user",
            format!("User {user_id} not found"),
        ));
    }
    Ok(token)
}

pub async fn clear_password_reset(pool: &SqlitePool, user_id: i64) -> AppResult<()> {
    let rows = sqlx::query(
        "UPDATE users SET password_reset_token = '', updated_at = ? WHERE id = ?",
    )
    .bind(now_millis())
    .bind(user_id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(AppError::not_found(
            "user",
            format!("User {user_id} not found"),
        ));
    }
    Ok(())
}

/// Invalidate every session token issued before now, returning the cutoff.
pub async fn revoke_tokens(pool: &SqlitePool, user_id: i64) -> AppResult<i64> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE users SET tokens_revoked_at = ?1, updated_at = ?1 WHERE id = ?2",
    )
    .bind(now)
    .bind(user_id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(AppError::not_found(
            "user",
            format!("User {user_id} not found"),
        ));
    }
    Ok(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::UserRole;
    use crate::schema::RolesInput;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Create an in-memory SQLite pool with the identity schema applied and
    /// two roles seeded.
    ///
    /// A single connection, or each pooled connection would see its own
    /// empty in-memory database.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        sqlx::query("INSERT INTO roles (id, name) VALUES (1, 'admin'), (2, 'editor')")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn payload(email: &str) -> ValidatedUser {
        ValidatedUser {
            id: None,
            email: email.into(),
            password: None,
            roles: RolesInput::Absent,
        }
    }

    fn payload_with_password(email: &str, password: &str) -> ValidatedUser {
        ValidatedUser {
            password: Some(password.into()),
            ..payload(email)
        }
    }

    async fn association_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_role")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_sets_defaults() {
        let pool = test_pool().await;
        let user = create(&pool, payload_with_password("a@b.com", "secret"))
            .await
            .unwrap();

        assert!(user.id > 0);
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.password, "secret");
        assert!(!user.verified);
        assert!(!user.verification_token.is_empty());
        assert_eq!(user.password_reset_token, "");
        assert_eq!(user.tokens_revoked_at, None);
        assert!(user.created_at > 0);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let pool = test_pool().await;
        create(&pool, payload("a@b.com")).await.unwrap();

        let err = create(&pool, payload("a@b.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let pool = test_pool().await;
        let created = create(&pool, payload("a@b.com")).await.unwrap();

        let found = find_by_email(&pool, "a@b.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(find_by_email(&pool, "x@y.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_page() {
        let pool = test_pool().await;
        for email in ["a@b.com", "b@b.com", "c@b.com"] {
            create(&pool, payload(email)).await.unwrap();
        }

        let (page, total) = find_page(&pool, 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 3);

        let (rest, total) = find_page(&pool, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_update_keeps_password_when_absent() {
        let pool = test_pool().await;
        let user = create(&pool, payload_with_password("a@b.com", "secret"))
            .await
            .unwrap();

        let updated = update(&pool, user.id, payload("new@b.com")).await.unwrap();
        assert_eq!(updated.email, "new@b.com");
        assert_eq!(updated.password, "secret");
        assert!(updated.updated_at >= user.updated_at);

        let updated = update(&pool, user.id, payload_with_password("new@b.com", "fresh"))
            .await
            .unwrap();
        assert_eq!(updated.password, "fresh");
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let pool = test_pool().await;
        let err = update(&pool, 999, payload("a@b.com")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "user", .. }));
    }

    #[tokio::test]
    async fn test_update_rejects_taken_email() {
        let pool = test_pool().await;
        create(&pool, payload("a@b.com")).await.unwrap();
        let other = create(&pool, payload("b@b.com")).await.unwrap();

        let err = update(&pool, other.id, payload("a@b.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_assign_role_and_load() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();

        assign_role(&pool, user.id, "admin").await.unwrap();
        let loaded = load_with_roles(&pool, user.clone()).await.unwrap();
        assert_eq!(loaded.role_names, vec!["admin"]);

        assign_role(&pool, user.id, "editor").await.unwrap();
        let loaded = load_with_roles(&pool, user).await.unwrap();
        assert_eq!(loaded.role_names, vec!["admin", "editor"]);
        assert_eq!(loaded.roles.len(), 2);
    }

    #[tokio::test]
    async fn test_assign_role_duplicate_conflicts() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();

        assign_role(&pool, user.id, "admin").await.unwrap();
        let err = assign_role(&pool, user.id, "admin").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(association_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_assign_role_stamps_association() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();
        assign_role(&pool, user.id, "admin").await.unwrap();

        let row = sqlx::query_as::<_, UserRole>(
            "SELECT role_id, user_id, created_at, updated_at FROM user_role WHERE user_id = ?",
        )
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row.role_id, 1);
        assert_eq!(row.user_id, user.id);
        assert!(row.created_at > 0);
        assert_eq!(row.created_at, row.updated_at);
    }

    #[tokio::test]
    async fn test_assign_role_unknown_role() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();

        let err = assign_role(&pool, user.id, "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "role", .. }));
    }

    #[tokio::test]
    async fn test_assign_role_missing_user() {
        let pool = test_pool().await;
        let err = assign_role(&pool, 999, "admin").await.unwrap_err();
        assert!(matches!(err, AppError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_unassign_role() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();
        assign_role(&pool, user.id, "admin").await.unwrap();

        unassign_role(&pool, user.id, "admin").await.unwrap();
        let loaded = load_with_roles(&pool, user.clone()).await.unwrap();
        assert!(loaded.roles.is_empty());
        assert!(loaded.role_names.is_empty());

        let err = unassign_role(&pool, user.id, "admin").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "user_role", .. }));
    }

    #[tokio::test]
    async fn test_load_with_roles_empty() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();

        let loaded = load_with_roles(&pool, user).await.unwrap();
        assert!(loaded.roles.is_empty());
        assert!(loaded.role_names.is_empty());
    }

    #[tokio::test]
    async fn test_role_names_never_stale() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();

        assign_role(&pool, user.id, "admin").await.unwrap();
        assert_eq!(
            load_with_roles(&pool, user.clone()).await.unwrap().role_names,
            vec!["admin"]
        );

        unassign_role(&pool, user.id, "admin").await.unwrap();
        assert!(
            load_with_roles(&pool, user).await.unwrap().role_names.is_empty()
        );
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();
        assert!(!user.verification_token.is_empty());

        verify(&pool, user.id).await.unwrap();
        let reloaded = find_by_id(&pool, user.id).await.unwrap().unwrap();
        assert!(reloaded.verified);
        assert_eq!(reloaded.verification_token, "");

        verify(&pool, user.id).await.unwrap();
        let reloaded = find_by_id(&pool, user.id).await.unwrap().unwrap();
        assert!(reloaded.verified);
        assert_eq!(reloaded.verification_token, "");
    }

    #[tokio::test]
    async fn test_verify_missing_user() {
        let pool = test_pool().await;
        let err = verify(&pool, 999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "user", .. }));
    }

    #[tokio::test]
    async fn test_delete_cascades_associations() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();
        assign_role(&pool, user.id, "admin").await.unwrap();
        assign_role(&pool, user.id, "editor").await.unwrap();
        assert_eq!(association_count(&pool).await, 2);

        assert!(delete(&pool, user.id).await.unwrap());
        assert_eq!(association_count(&pool).await, 0);
        assert!(find_by_id(&pool, user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_role_delete_cascades_associations() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();
        assign_role(&pool, user.id, "admin").await.unwrap();

        role::delete(&pool, 1).await.unwrap();
        assert_eq!(association_count(&pool).await, 0);
        // The user itself is untouched
        assert!(find_by_id(&pool, user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_password_reset_cycle() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();

        let token = issue_password_reset(&pool, user.id).await.unwrap();
        assert!(!token.is_empty());
        let reloaded = find_by_id(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_reset_token, token);

        clear_password_reset(&pool, user.id).await.unwrap();
        let reloaded = find_by_id(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_reset_token, "");
    }

    #[tokio::test]
    async fn test_revoke_tokens_sets_cutoff() {
        let pool = test_pool().await;
        let user = create(&pool, payload("a@b.com")).await.unwrap();
        assert_eq!(user.tokens_revoked_at, None);

        let cutoff = revoke_tokens(&pool, user.id).await.unwrap();
        let reloaded = find_by_id(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.tokens_revoked_at, Some(cutoff));
    }

    #[tokio::test]
    async fn test_find_all_with_roles() {
        let pool = test_pool().await;
        let alice = create(&pool, payload("alice@b.com")).await.unwrap();
        let bob = create(&pool, payload("bob@b.com")).await.unwrap();
        assign_role(&pool, alice.id, "admin").await.unwrap();
        assign_role(&pool, bob.id, "editor").await.unwrap();

        let all = find_all_with_roles(&pool).await.unwrap();
        assert_eq!(all.len(), 2);
        let by_email = |email: &str| {
            all.iter()
                .find(|u| u.user.email == email)
                .unwrap()
                .role_names
                .clone()
        };
        assert_eq!(by_email("alice@b.com"), vec!["admin"]);
        assert_eq!(by_email("bob@b.com"), vec!["editor"]);
    }
}
