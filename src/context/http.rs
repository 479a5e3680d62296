//! Request, vars and response frames.
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method, Uri};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Context, ContextError, ContextValue, FrameKind, Logger, ResponseHandle};

pub const REQUEST_KEY: &str = "http.request";
pub const REQUEST_ID_KEY: &str = "http.request.id";
pub const REQUEST_STARTED_AT_KEY: &str = "http.request.startedat";
pub const REQUEST_METHOD_KEY: &str = "http.request.method";
pub const REQUEST_URI_KEY: &str = "http.request.uri";
pub const REQUEST_HOST_KEY: &str = "http.request.host";
pub const REQUEST_REMOTE_ADDR_KEY: &str = "http.request.remoteaddr";
pub const REQUEST_REFERER_KEY: &str = "http.request.referer";
pub const REQUEST_USER_AGENT_KEY: &str = "http.request.useragent";
pub const REQUEST_CONTENT_TYPE_KEY: &str = "http.request.contenttype";

pub const RESPONSE_KEY: &str = "http.response";
pub const RESPONSE_STATUS_KEY: &str = "http.response.status";
pub const RESPONSE_WRITTEN_KEY: &str = "http.response.written";
pub const RESPONSE_CONTENT_TYPE_KEY: &str = "http.response.contenttype";
pub const RESPONSE_DURATION_KEY: &str = "http.response.duration";

pub const VARS_KEY: &str = "vars";
const VARS_PREFIX: &str = "vars.";

const REQUEST_ID_HEADER: &str = "x-request-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const REAL_IP_HEADER: &str = "x-real-ip";

const REQUEST_LOGGER_KEYS: &[&str] = &[
    REQUEST_ID_KEY,
    REQUEST_METHOD_KEY,
    REQUEST_HOST_KEY,
    REQUEST_URI_KEY,
    REQUEST_REFERER_KEY,
    REQUEST_USER_AGENT_KEY,
    REQUEST_REMOTE_ADDR_KEY,
    REQUEST_CONTENT_TYPE_KEY,
];

const RESPONSE_LOGGER_KEYS: &[&str] = &[
    RESPONSE_WRITTEN_KEY,
    RESPONSE_STATUS_KEY,
    RESPONSE_CONTENT_TYPE_KEY,
];

/// The parts of the inbound request the core needs after the body is split off.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub peer: Option<SocketAddr>,
}

impl RequestInfo {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            peer: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn host(&self) -> String {
        self.header(header::HOST.as_str())
            .map(str::to_owned)
            .or_else(|| self.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default()
    }

    /// Client address: first hop of X-Forwarded-For, then X-Real-Ip, then the
    /// socket peer. Header values are only used when they parse as an IP.
    pub fn remote_addr(&self) -> String {
        if let Some(first) = self
            .header(FORWARDED_FOR_HEADER)
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            && first.parse::<IpAddr>().is_ok()
        {
            return first.to_owned();
        }

        if let Some(real) = self.header(REAL_IP_HEADER).map(str::trim)
            && real.parse::<IpAddr>().is_ok()
        {
            return real.to_owned();
        }

        self.peer.map(|p| p.to_string()).unwrap_or_default()
    }
}

/// State held by the request frame.
#[derive(Debug)]
pub struct RequestFrame {
    pub info: RequestInfo,
    pub id: String,
    pub started_at: DateTime<Utc>,
}

pub(super) fn request_value(req: &Arc<RequestFrame>, key: &str) -> Option<ContextValue> {
    let info = &req.info;
    let header_value = |name: header::HeaderName| {
        ContextValue::Str(info.header(name.as_str()).unwrap_or_default().to_owned())
    };

    let v = match key {
        REQUEST_KEY => ContextValue::Request(req.clone()),
        REQUEST_ID_KEY => ContextValue::Str(req.id.clone()),
        REQUEST_STARTED_AT_KEY => ContextValue::Time(req.started_at),
        REQUEST_METHOD_KEY => ContextValue::Str(info.method.to_string()),
        REQUEST_URI_KEY => ContextValue::Str(info.uri.to_string()),
        REQUEST_HOST_KEY => ContextValue::Str(info.host()),
        REQUEST_REMOTE_ADDR_KEY => ContextValue::Str(info.remote_addr()),
        REQUEST_REFERER_KEY => header_value(header::REFERER),
        REQUEST_USER_AGENT_KEY => header_value(header::USER_AGENT),
        REQUEST_CONTENT_TYPE_KEY => header_value(header::CONTENT_TYPE),
        _ => return None,
    };
    Some(v)
}

pub(super) fn vars_value(vars: &Arc<HashMap<String, String>>, key: &str) -> Option<ContextValue> {
    if key == VARS_KEY {
        return Some(ContextValue::Vars(vars.clone()));
    }
    let name = key.strip_prefix(VARS_PREFIX).unwrap_or(key);
    vars.get(name).map(|v| ContextValue::Str(v.clone()))
}

pub(super) fn response_value(w: &ResponseHandle, key: &str) -> Option<ContextValue> {
    let v = match key {
        RESPONSE_KEY => ContextValue::Response(w.clone()),
        RESPONSE_STATUS_KEY => ContextValue::Int(w.status().map(|s| s.as_u16().into()).unwrap_or(0)),
        RESPONSE_WRITTEN_KEY => ContextValue::Int(i64::try_from(w.written()).unwrap_or(i64::MAX)),
        RESPONSE_CONTENT_TYPE_KEY => ContextValue::Str(w.content_type().unwrap_or_default()),
        _ => return None,
    };
    Some(v)
}

impl Context {
    /// Attach the request frame. A chain carries at most one request.
    pub fn with_request(&self, info: RequestInfo) -> Result<Self, ContextError> {
        if self.request().is_some() {
            return Err(ContextError::DuplicateRequest);
        }

        let id = info
            .header(REQUEST_ID_HEADER)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(self.push(FrameKind::Request(Arc::new(RequestFrame {
            info,
            id,
            started_at: Utc::now(),
        }))))
    }

    pub fn request(&self) -> Option<Arc<RequestFrame>> {
        match self.value(REQUEST_KEY) {
            Some(ContextValue::Request(r)) => Some(r),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<String> {
        self.string_value(REQUEST_ID_KEY)
    }

    /// Logger carrying the standard request fields.
    pub fn request_logger(&self) -> Logger {
        self.logger_with_keys(REQUEST_LOGGER_KEYS)
    }

    pub fn with_vars(&self, vars: HashMap<String, String>) -> Self {
        self.push(FrameKind::Vars(Arc::new(vars)))
    }

    /// Route variable by name, e.g. `var("canary_id")`.
    pub fn var(&self, name: &str) -> Option<String> {
        self.string_value(&format!("{VARS_PREFIX}{name}"))
    }

    pub fn with_response(&self, w: ResponseHandle) -> Self {
        self.push(FrameKind::Response(w))
    }

    pub fn response(&self) -> Option<ResponseHandle> {
        match self.value(RESPONSE_KEY) {
            Some(ContextValue::Response(w)) => Some(w),
            _ => None,
        }
    }

    /// Logger carrying the response fields and the time since the request started.
    pub fn response_logger(&self) -> Logger {
        let logger = self.logger_with_keys(RESPONSE_LOGGER_KEYS);
        match self.request() {
            Some(req) => {
                let elapsed = (Utc::now() - req.started_at).to_std().unwrap_or_default();
                logger.with_field(RESPONSE_DURATION_KEY, format!("{elapsed:?}"))
            }
            None => logger,
        }
    }
}
