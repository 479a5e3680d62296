//! Request context chain.
//!
//! A `Context` is an immutable linked list of frames. Every `with_*` call
//! returns a new context whose innermost frame holds one category of state and
//! points at the previous chain. `value(key)` asks the innermost frame first
//! and walks outward until a frame owns the key.
//!
//! Frames:
//! - values: static key/value pairs (version, configured log fields)
//! - vars: route path parameters
//! - request: inbound request, request id, start time (exactly one per chain)
//! - response: instrumented response writer
//! - errors: errors accumulated while serving the request
//! - logger: logger with fields snapshotted from the chain
//! - user / canary / webhook: entities resolved by the dispatcher

pub mod entities;
pub mod errors;
pub mod http;
mod logger;
mod response;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::errcode::Errors;
use crate::models::{Canary, WebHook};
use crate::services::auth::UserInfo;

pub use http::{RequestFrame, RequestInfo};
pub use logger::Logger;
pub use response::{BufferedResponse, InstrumentedWriter, ResponseHandle, ResponseWriter};

pub const VERSION_KEY: &str = "version";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("only one request per context")]
    DuplicateRequest,
}

/// A value stored in, or derived from, a context frame.
#[derive(Clone, Debug)]
pub enum ContextValue {
    Str(String),
    Int(i64),
    Time(DateTime<Utc>),
    Vars(Arc<HashMap<String, String>>),
    Request(Arc<RequestFrame>),
    Response(ResponseHandle),
    Errors(Errors),
    Logger(Logger),
    User(UserInfo),
    Canary(Canary),
    Hook(WebHook),
}

impl ContextValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Vars(vars) => {
                let mut keys: Vec<_> = vars.iter().collect();
                keys.sort();
                let rendered: Vec<_> = keys.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                write!(f, "map[{}]", rendered.join(" "))
            }
            Self::Request(r) => write!(f, "{} {}", r.info.method, r.info.uri),
            Self::Response(w) => write!(f, "{w:?}"),
            Self::Errors(errs) => write!(f, "{errs}"),
            Self::Logger(l) => write!(f, "{l}"),
            Self::User(u) => f.write_str(&u.name),
            Self::Canary(c) => f.write_str(&c.id),
            Self::Hook(h) => f.write_str(&h.id),
        }
    }
}

enum FrameKind {
    Values(HashMap<String, ContextValue>),
    Vars(Arc<HashMap<String, String>>),
    Request(Arc<RequestFrame>),
    Response(ResponseHandle),
    Errors(Errors),
    Logger(Logger),
    User(UserInfo),
    Canary(Canary),
    Hook(WebHook),
}

struct Frame {
    kind: FrameKind,
    parent: Option<Arc<Frame>>,
}

impl Frame {
    /// Value for `key` if this frame owns it.
    fn lookup(&self, key: &str) -> Option<ContextValue> {
        match &self.kind {
            FrameKind::Values(values) => values.get(key).cloned(),
            FrameKind::Vars(vars) => http::vars_value(vars, key),
            FrameKind::Request(req) => http::request_value(req, key),
            FrameKind::Response(w) => http::response_value(w, key),
            FrameKind::Errors(errs) => (key == errors::ERRORS_KEY).then(|| ContextValue::Errors(errs.clone())),
            FrameKind::Logger(l) => (key == logger::LOGGER_KEY).then(|| ContextValue::Logger(l.clone())),
            FrameKind::User(u) => entities::user_value(u, key),
            FrameKind::Canary(c) => (key == entities::CANARY_KEY).then(|| ContextValue::Canary(c.clone())),
            FrameKind::Hook(h) => (key == entities::HOOK_KEY).then(|| ContextValue::Hook(h.clone())),
        }
    }
}

/// Immutable, cheaply clonable request context.
#[derive(Clone)]
pub struct Context {
    frame: Option<Arc<Frame>>,
}

impl Context {
    /// Empty root context.
    pub fn background() -> Self {
        Self { frame: None }
    }

    fn push(&self, kind: FrameKind) -> Self {
        Self {
            frame: Some(Arc::new(Frame {
                kind,
                parent: self.frame.clone(),
            })),
        }
    }

    pub fn with_value(&self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        let mut values = HashMap::new();
        values.insert(key.into(), value.into());
        self.push(FrameKind::Values(values))
    }

    /// Root context carrying the service version, also attached to the logger.
    pub fn with_version(&self, version: &str) -> Self {
        let ctx = self.with_value(VERSION_KEY, version);
        let logger = ctx.logger_with_keys(&[VERSION_KEY]);
        ctx.with_logger(logger)
    }

    /// Walk the chain from the innermost frame outward.
    pub fn value(&self, key: &str) -> Option<ContextValue> {
        let mut frame = self.frame.as_ref();
        while let Some(f) = frame {
            if let Some(v) = f.lookup(key) {
                return Some(v);
            }
            frame = f.parent.as_ref();
        }
        None
    }

    pub fn string_value(&self, key: &str) -> Option<String> {
        self.value(key).and_then(|v| match v {
            ContextValue::Str(s) => Some(s),
            _ => None,
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        let mut frame = self.frame.as_ref();
        while let Some(fr) = frame {
            depth += 1;
            frame = fr.parent.as_ref();
        }
        f.debug_struct("Context").field("frames", &depth).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_frame_wins() {
        let ctx = Context::background()
            .with_value("a", "outer")
            .with_value("b", "only")
            .with_value("a", "inner");

        assert_eq!(ctx.string_value("a").as_deref(), Some("inner"));
        assert_eq!(ctx.string_value("b").as_deref(), Some("only"));
        assert!(ctx.value("missing").is_none());
        assert!(Context::background().value("a").is_none());
    }

    #[test]
    fn derived_contexts_do_not_affect_parent() {
        let parent = Context::background().with_value("k", "v1");
        let child = parent.with_value("k", "v2");

        assert_eq!(parent.string_value("k").as_deref(), Some("v1"));
        assert_eq!(child.string_value("k").as_deref(), Some("v2"));
    }

    #[test]
    fn version_is_a_logger_field() {
        let ctx = Context::background().with_version("1.2.3");
        assert_eq!(ctx.logger().field(VERSION_KEY), Some("1.2.3"));
    }
}
