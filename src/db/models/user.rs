//! User Model

use serde::{Deserialize, Serialize};

use super::Role;

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Opaque credential; views must never emit it
    pub password: String,
    pub verified: bool,
    /// Non-empty until the account is verified, then cleared to ""
    pub verification_token: String,
    pub password_reset_token: String,
    /// Session tokens issued before this instant are invalid
    pub tokens_revoked_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// User with its loaded role set (for detail views)
///
/// `role_names` is derived from `roles` at construction and is never
/// persisted. Only fetches that load the relation produce this type, so a
/// plain [`User`] never carries a stale name list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
    pub role_names: Vec<String>,
}

impl UserWithRoles {
    /// Attach a freshly loaded role snapshot, recomputing the name list
    pub fn new(user: User, roles: Vec<Role>) -> Self {
        let role_names = roles.iter().map(|role| role.name.clone()).collect();
        Self {
            user,
            roles,
            role_names,
        }
    }
}
