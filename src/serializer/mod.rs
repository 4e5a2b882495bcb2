//! Resource serialization views
//!
//! Named, field-filtered projections of identity resources. A view declares
//! which internal fields are never emitted; everything else is converted to
//! the wire naming convention and wrapped in a `{ data, links?, meta? }`
//! document. Rendering is a pure projection over an already-loaded entity.
//!
//! The registry is built once with every known view and cannot be changed
//! afterwards; asking for an unregistered view is a configuration error, not
//! an empty result.

pub mod case;

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

pub const USER_RESOURCE: &str = "user";
pub const DEFAULT_VIEW: &str = "default";
pub const SUPERUSER_VIEW: &str = "superuser";

/// Fields a client is allowed to submit for a user, besides role references
const USER_DESERIALIZE_WHITELIST: &[&str] = &["id", "password", "email"];

/// The unprivileged projection: no credential, no tokens, no verification
/// state, no store-managed timestamps
const USER_DEFAULT_BLACKLIST: &[&str] = &[
    "password",
    "verification_token",
    "verified",
    "password_reset_token",
    "tokens_revoked_at",
    "created_at",
    "updated_at",
];

/// The privileged projection: verification state and revocation cutoff are
/// visible, the raw credential and reset token still never are
const USER_SUPERUSER_BLACKLIST: &[&str] = &[
    "password",
    "password_reset_token",
    "created_at",
    "updated_at",
];

/// Field-filtering rules for one named view of a resource
#[derive(Debug, Clone, Copy)]
struct ViewConfig {
    /// Internal (snake_case) field names never emitted by this view
    blacklist: &'static [&'static str],
}

/// Serialization policy for one resource: the inbound field whitelist plus
/// its named views. Both travel together so lookup and policy cannot diverge.
#[derive(Debug, Clone)]
struct ResourceConfig {
    deserialize_whitelist: &'static [&'static str],
    views: HashMap<&'static str, ViewConfig>,
}

/// Pagination links echoed into the top level of a rendered document.
/// Absent members are omitted from the output, not serialized as null.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopLevelLinks {
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Pagination metadata echoed into the top level of a rendered document
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TopLevelMeta {
    pub total: i64,
}

/// Caller-supplied pagination context; when a part is absent the rendered
/// document simply has no such section
#[derive(Debug, Clone, Default)]
pub struct RenderExtra {
    pub links: Option<TopLevelLinks>,
    pub meta: Option<TopLevelMeta>,
}

impl RenderExtra {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_meta(total: i64) -> Self {
        Self {
            links: None,
            meta: Some(TopLevelMeta { total }),
        }
    }
}

/// Registry of resource → serialization policy, fixed at startup
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    resources: HashMap<&'static str, ResourceConfig>,
}

impl ViewRegistry {
    /// Build the registry with every known resource and view; there is no way
    /// to register more afterwards.
    pub fn new() -> Self {
        let mut user_views = HashMap::new();
        user_views.insert(
            DEFAULT_VIEW,
            ViewConfig {
                blacklist: USER_DEFAULT_BLACKLIST,
            },
        );
        user_views.insert(
            SUPERUSER_VIEW,
            ViewConfig {
                blacklist: USER_SUPERUSER_BLACKLIST,
            },
        );

        let mut resources = HashMap::new();
        resources.insert(
            USER_RESOURCE,
            ResourceConfig {
                deserialize_whitelist: USER_DESERIALIZE_WHITELIST,
                views: user_views,
            },
        );
        Self { resources }
    }

    fn config(&self, resource: &str, view: &str) -> AppResult<ViewConfig> {
        self.resources
            .get(resource)
            .and_then(|entry| entry.views.get(view))
            .copied()
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "No view '{view}' registered for resource '{resource}'"
                ))
            })
    }

    /// Render one entity through the named view.
    pub fn render<T: Serialize>(
        &self,
        resource: &str,
        view: &str,
        entity: &T,
        extra: &RenderExtra,
    ) -> AppResult<Value> {
        let config = self.config(resource, view)?;
        let data = project(entity, config)?;
        Ok(wrap(data, extra))
    }

    /// Render a collection of entities through the named view.
    pub fn render_collection<T: Serialize>(
        &self,
        resource: &str,
        view: &str,
        entities: &[T],
        extra: &RenderExtra,
    ) -> AppResult<Value> {
        let config = self.config(resource, view)?;
        let data = entities
            .iter()
            .map(|entity| project(entity, config))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(wrap(Value::Array(data), extra))
    }

    /// Reconstruct an internal payload from an inbound wire document.
    ///
    /// Accepts either a bare object or one wrapped in `{ "data": ... }`. Keys
    /// are converted back to the internal convention, only whitelisted fields
    /// survive, and role references are reduced to `{id}`. Nothing else from
    /// the client is trusted.
    pub fn deserialize(&self, resource: &str, payload: &Value) -> AppResult<Value> {
        let entry = self.resources.get(resource).ok_or_else(|| {
            AppError::Configuration(format!("No resource '{resource}' registered"))
        })?;

        let body = payload.get("data").unwrap_or(payload);
        let obj = body
            .as_object()
            .ok_or_else(|| AppError::validation("payload", "must be an object"))?;

        let mut out = Map::new();
        for (key, value) in obj {
            let internal = case::camel_to_snake(key);
            if internal == "roles" {
                out.insert(internal, reduce_role_refs(value)?);
            } else if entry.deserialize_whitelist.contains(&internal.as_str()) {
                out.insert(internal, value.clone());
            }
        }
        Ok(Value::Object(out))
    }
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize the entity, drop blacklisted fields, convert the rest to the
/// wire naming convention.
fn project<T: Serialize>(entity: &T, config: ViewConfig) -> AppResult<Value> {
    let raw = serde_json::to_value(entity)
        .map_err(|e| AppError::Internal(format!("Failed to serialize resource: {e}")))?;
    let Value::Object(fields) = raw else {
        return Err(AppError::Internal(
            "Resource did not serialize to an object".into(),
        ));
    };

    let mut out = Map::with_capacity(fields.len());
    for (key, value) in fields {
        if config.blacklist.contains(&key.as_str()) {
            continue;
        }
        out.insert(case::snake_to_camel(&key), convert_keys(value));
    }
    Ok(Value::Object(out))
}

/// Recursively convert nested object keys; values are left untouched
fn convert_keys(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (case::snake_to_camel(&key), convert_keys(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(convert_keys).collect()),
        other => other,
    }
}

fn wrap(data: Value, extra: &RenderExtra) -> Value {
    let mut doc = Map::new();
    doc.insert("data".into(), data);
    if let Some(links) = &extra.links {
        doc.insert(
            "links".into(),
            serde_json::to_value(links).unwrap_or(Value::Null),
        );
    }
    if let Some(meta) = &extra.meta {
        doc.insert(
            "meta".into(),
            serde_json::to_value(meta).unwrap_or(Value::Null),
        );
    }
    Value::Object(doc)
}

/// Reduce inbound role references to their `{id}` form
fn reduce_role_refs(value: &Value) -> AppResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Object(_) => reduce_role_ref(value),
        Value::Array(items) => {
            let refs = items
                .iter()
                .map(reduce_role_ref)
                .collect::<AppResult<Vec<_>>>()?;
            Ok(Value::Array(refs))
        }
        _ => Err(AppError::validation("roles", "must be an object or an array")),
    }
}

fn reduce_role_ref(value: &Value) -> AppResult<Value> {
    let id = value
        .get("id")
        .cloned()
        .ok_or_else(|| AppError::validation("roles", "reference is missing 'id'"))?;
    let mut reduced = Map::new();
    reduced.insert("id".into(), id);
    Ok(Value::Object(reduced))
}
