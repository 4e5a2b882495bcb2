//! Repository Module
//!
//! CRUD over the identity tables. Functions take the pool as their first
//! argument and return [`crate::error::AppResult`]; driver errors are
//! translated into the crate error taxonomy at this boundary, so callers
//! never see engine-specific failures.

// Identity
pub mod role;
pub mod user;
