//! User payload schema
//!
//! Accepts an arbitrary untyped payload intended to represent a user and
//! produces either a normalized [`ValidatedUser`] or a field-level
//! [`AppError::Validation`]. Validation is pure; it never touches storage.
//!
//! The `roles` field is deliberately permissive on the wire (callers send a
//! single reference object or a list of them) but is resolved here into the
//! tagged [`RolesInput`] so downstream code matches exhaustively instead of
//! duck-typing the shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::ValidateEmail;

use crate::error::{AppError, AppResult};
use crate::utils::validation::{
    MAX_EMAIL_LEN, MAX_PASSWORD_LEN, validate_optional_text, validate_required_text,
};

/// Role reference as accepted from a client: the id and nothing else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: i64,
}

/// Resolved shape of the inbound `roles` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolesInput {
    /// A single reference object: `{"id": 1}`
    Single(RoleRef),
    /// A list of reference objects: `[{"id": 1}, {"id": 2}]`
    List(Vec<RoleRef>),
    /// Field absent or null
    Absent,
}

impl RolesInput {
    /// Flatten to a reference slice, empty when absent
    pub fn refs(&self) -> &[RoleRef] {
        match self {
            RolesInput::Single(r) => std::slice::from_ref(r),
            RolesInput::List(items) => items,
            RolesInput::Absent => &[],
        }
    }
}

/// Normalized, type-checked user payload
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUser {
    /// Present only when the caller addresses an existing user
    pub id: Option<i64>,
    /// Trimmed and lowercased
    pub email: String,
    pub password: Option<String>,
    pub roles: RolesInput,
}

/// Validate a raw user payload.
///
/// - `id`: optional, numeric or numeric string, normalized to i64
/// - `email`: required, trimmed, lowercased, checked against the address grammar
/// - `password`: optional string
/// - `roles`: object, array, null, or absent
///
/// Unknown fields are ignored rather than rejected.
pub fn validate_user(payload: &Value) -> AppResult<ValidatedUser> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::validation("payload", "must be an object"))?;

    let id = match obj.get("id") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_id(value, "id")?),
    };

    let email = match obj.get("email") {
        Some(Value::String(raw)) => raw.trim().to_lowercase(),
        Some(Value::Null) | None => return Err(AppError::validation("email", "is required")),
        Some(_) => return Err(AppError::validation("email", "must be a string")),
    };
    validate_required_text(&email, "email", MAX_EMAIL_LEN)?;
    if !email.validate_email() {
        return Err(AppError::validation("email", "invalid-format"));
    }

    let password = match obj.get("password") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(AppError::validation("password", "must be a string")),
    };
    validate_optional_text(&password, "password", MAX_PASSWORD_LEN)?;

    let roles = parse_roles(obj.get("roles"))?;

    Ok(ValidatedUser {
        id,
        email,
        password,
        roles,
    })
}

fn parse_id(value: &Value, field: &str) -> AppResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| AppError::validation(field, "must be an integer")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| AppError::validation(field, "must be a numeric string")),
        _ => Err(AppError::validation(field, "must be a number or string")),
    }
}

fn parse_roles(value: Option<&Value>) -> AppResult<RolesInput> {
    match value {
        None | Some(Value::Null) => Ok(RolesInput::Absent),
        Some(single @ Value::Object(_)) => Ok(RolesInput::Single(parse_role_ref(single)?)),
        Some(Value::Array(items)) => {
            let refs = items
                .iter()
                .map(parse_role_ref)
                .collect::<AppResult<Vec<_>>>()?;
            Ok(RolesInput::List(refs))
        }
        Some(_) => Err(AppError::validation("roles", "must be an object or an array")),
    }
}

fn parse_role_ref(value: &Value) -> AppResult<RoleRef> {
    let id = value
        .get("id")
        .ok_or_else(|| AppError::validation("roles", "reference is missing 'id'"))?;
    Ok(RoleRef {
        id: parse_id(id, "roles")?,
    })
}
