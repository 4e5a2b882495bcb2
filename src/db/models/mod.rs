//! Database Models

pub mod role;
pub mod user;
pub mod user_role;

// Re-exports
pub use role::{Role, RoleCreate};
pub use user::{User, UserWithRoles};
pub use user_role::UserRole;
