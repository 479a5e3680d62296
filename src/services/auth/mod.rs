//! Pluggable authentication.
//!
//! Responsibility:
//! - `AuthStrategy`: decide whether a request may perform the requested accesses
//! - `Challenge`: failures that know how to render `WWW-Authenticate`
//! - Built-in strategies: `silly` (development), `htpasswd` (basic), `token` (bearer JWT)
//!
//! Strategies are built once at startup through the named registry in
//! `factory` and are read-only afterwards.
pub mod factory;
pub mod htpasswd;
pub mod silly;
pub mod token;

use std::fmt;

use async_trait::async_trait;
use axum::http::header::{HeaderValue, WWW_AUTHENTICATE};
use serde::Serialize;
use thiserror::Error;

use crate::context::{Context, ResponseHandle};

pub use factory::{build_auth_strategy, strategies, Parameters, StrategyError, StrategyRegistry};

/// A typed resource, e.g. `canary:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl Resource {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// One requested permission: an action on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Access {
    #[serde(flatten)]
    pub resource: Resource,
    pub action: String,
}

impl Access {
    pub fn new(resource: Resource, action: impl Into<String>) -> Self {
        Self {
            resource,
            action: action.into(),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.resource.kind, self.resource.name, self.action
        )
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
}

impl UserInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An authentication failure carrying `WWW-Authenticate` information.
pub trait Challenge: fmt::Debug + fmt::Display + Send + Sync {
    /// Value of the `WWW-Authenticate` header.
    fn header_value(&self) -> String;

    /// Must run before any body is written.
    fn set_headers(&self, w: &ResponseHandle) {
        match HeaderValue::from_str(&self.header_value()) {
            Ok(v) => w.set_header(WWW_AUTHENTICATE, v),
            Err(err) => tracing::error!(error = %err, "invalid challenge header"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Challenge(Box<dyn Challenge>),
    #[error("no request in context")]
    MissingRequest,
}

impl AuthError {
    pub fn challenge(c: impl Challenge + 'static) -> Self {
        Self::Challenge(Box::new(c))
    }

    pub fn as_challenge(&self) -> Option<&dyn Challenge> {
        match self {
            Self::Challenge(c) => Some(c.as_ref()),
            _ => None,
        }
    }
}

#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Authorize every access in `access`. On success the returned context
    /// carries the authenticated user.
    async fn authorized(&self, ctx: &Context, access: &[Access]) -> Result<Context, AuthError>;
}

/// Quote a challenge parameter value.
pub(crate) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_renders_as_scope_item() {
        let access = Access::new(Resource::new("canary", "abc"), "read");
        assert_eq!(access.to_string(), "canary:abc:read");
        assert_eq!(
            serde_json::to_value(&access).unwrap(),
            serde_json::json!({"type": "canary", "name": "abc", "action": "read"})
        );
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }
}
