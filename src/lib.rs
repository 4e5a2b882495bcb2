//! Role-scoped identity core for the Crab framework
//!
//! Users, roles, and their many-to-many association, composed as three
//! components: an inbound payload is checked by the [`schema`] validator,
//! persisted and loaded through the [`db`] store, and projected for the wire
//! by a named [`serializer`] view ("default" hides everything sensitive,
//! "superuser" additionally sees verification state).

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod serializer;
pub mod utils;

// Re-exports
pub use config::Config;
pub use db::DbService;
pub use db::models::{Role, RoleCreate, User, UserRole, UserWithRoles};
pub use error::{AppError, AppResult};
pub use schema::{RoleRef, RolesInput, ValidatedUser, validate_user};
pub use serializer::{RenderExtra, TopLevelLinks, TopLevelMeta, ViewRegistry};
