//! User-Role Association Model

use serde::{Deserialize, Serialize};

/// Association row between a user and a role.
///
/// There is no surrogate id; the (role_id, user_id) pair is the identity, so
/// the same role can never be attached to the same user twice.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRole {
    pub role_id: i64,
    pub user_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}
