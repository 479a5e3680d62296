//! Process-wide error code registry.
//!
//! Responsibility:
//! - Catalog every error the HTTP surface can emit (`ErrorDescriptor`), grouped by subsystem
//! - Map an `ErrorCode` handle to its HTTP status and client-facing message
//! - Carry request-time errors (`Error`, `Errors`) in the `{"errors": [...]}` envelope
//!
//! The registry is built once during startup and installed behind a `OnceLock`.
//! After that it is read-only; lookups never lock.

mod handler;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

use axum::http::StatusCode;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

pub use handler::{serve_errors, serve_json, serve_status, JSON_CONTENT_TYPE};

/// Numeric handle into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(pub u32);

/// Static description of one error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub code: ErrorCode,
    pub group: &'static str,
    /// Stable identifier sent to clients, e.g. `CANARY_UNKNOWN`.
    pub value: &'static str,
    pub message: &'static str,
    pub description: &'static str,
    pub http_status: StatusCode,
}

/// A named set of descriptors registered together.
#[derive(Debug)]
pub struct ErrorGroup {
    pub name: &'static str,
    pub descriptors: &'static [ErrorDescriptor],
}

pub const GENERIC_GROUP: &str = "errcode";

pub const UNKNOWN: ErrorCode = ErrorCode(1000);
pub const UNSUPPORTED: ErrorCode = ErrorCode(1001);
pub const UNAUTHORIZED: ErrorCode = ErrorCode(1002);
pub const DENIED: ErrorCode = ErrorCode(1003);

const UNKNOWN_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    code: UNKNOWN,
    group: GENERIC_GROUP,
    value: "UNKNOWN",
    message: "unknown error",
    description: "Generic error returned when the error does not have an API classification.",
    http_status: StatusCode::INTERNAL_SERVER_ERROR,
};

pub static GENERIC: ErrorGroup = ErrorGroup {
    name: GENERIC_GROUP,
    descriptors: &[
        UNKNOWN_DESCRIPTOR,
        ErrorDescriptor {
            code: UNSUPPORTED,
            group: GENERIC_GROUP,
            value: "UNSUPPORTED",
            message: "the operation is unsupported",
            description: "The operation was unsupported due to a missing implementation or invalid set of parameters.",
            http_status: StatusCode::METHOD_NOT_ALLOWED,
        },
        ErrorDescriptor {
            code: UNAUTHORIZED,
            group: GENERIC_GROUP,
            value: "UNAUTHORIZED",
            message: "authentication required",
            description: "The access controller was unable to authenticate the client. Often this will be accompanied by a WWW-Authenticate HTTP response header indicating how to authenticate.",
            http_status: StatusCode::UNAUTHORIZED,
        },
        ErrorDescriptor {
            code: DENIED,
            group: GENERIC_GROUP,
            value: "DENIED",
            message: "requested access to the resource is denied",
            description: "The access controller denied access for the operation on a resource.",
            http_status: StatusCode::FORBIDDEN,
        },
    ],
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("error value {value:?} is already registered (group {group})")]
    DuplicateValue { value: &'static str, group: &'static str },
    #[error("error code {code} is already registered as {existing:?}")]
    DuplicateCode { code: u32, existing: &'static str },
}

/// Append-only catalog of descriptors.
#[derive(Debug, Default)]
pub struct ErrorRegistry {
    by_code: BTreeMap<ErrorCode, ErrorDescriptor>,
    by_value: HashMap<&'static str, ErrorCode>,
    groups: BTreeMap<&'static str, Vec<ErrorCode>>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from several groups, failing on the first collision.
    pub fn with_groups(groups: &[&ErrorGroup]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for group in groups {
            registry.register_group(group)?;
        }
        Ok(registry)
    }

    pub fn register_group(&mut self, group: &ErrorGroup) -> Result<(), RegistryError> {
        for descriptor in group.descriptors {
            self.register(*descriptor)?;
        }
        Ok(())
    }

    pub fn register(&mut self, descriptor: ErrorDescriptor) -> Result<(), RegistryError> {
        if self.by_value.contains_key(descriptor.value) {
            return Err(RegistryError::DuplicateValue {
                value: descriptor.value,
                group: descriptor.group,
            });
        }
        if let Some(existing) = self.by_code.get(&descriptor.code) {
            return Err(RegistryError::DuplicateCode {
                code: descriptor.code.0,
                existing: existing.value,
            });
        }

        self.by_value.insert(descriptor.value, descriptor.code);
        self.by_code.insert(descriptor.code, descriptor);
        self.groups
            .entry(descriptor.group)
            .or_default()
            .push(descriptor.code);
        Ok(())
    }

    pub fn get(&self, code: ErrorCode) -> Option<&ErrorDescriptor> {
        self.by_code.get(&code)
    }

    pub fn parse(&self, value: &str) -> Option<ErrorCode> {
        self.by_value.get(value).copied()
    }

    pub fn group(&self, name: &str) -> Vec<&ErrorDescriptor> {
        self.groups
            .get(name)
            .map(|codes| codes.iter().filter_map(|c| self.by_code.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ErrorDescriptor> {
        self.by_code.values()
    }
}

static REGISTRY: OnceLock<ErrorRegistry> = OnceLock::new();

/// Install the process registry. The first installation wins; later calls
/// return the already-installed registry.
pub fn install(registry: ErrorRegistry) -> &'static ErrorRegistry {
    REGISTRY.get_or_init(|| registry)
}

pub fn registry() -> Option<&'static ErrorRegistry> {
    REGISTRY.get()
}

/// Build a registry from `groups` and install it, unless one is installed already.
pub fn init(groups: &[&ErrorGroup]) -> Result<&'static ErrorRegistry, RegistryError> {
    if let Some(installed) = registry() {
        return Ok(installed);
    }
    Ok(install(ErrorRegistry::with_groups(groups)?))
}

impl ErrorCode {
    /// Registered descriptor, or the UNKNOWN descriptor when the code was never registered.
    pub fn descriptor(self) -> ErrorDescriptor {
        registry()
            .and_then(|r| r.get(self).copied())
            .unwrap_or(UNKNOWN_DESCRIPTOR)
    }

    pub fn value(self) -> &'static str {
        self.descriptor().value
    }

    pub fn message(self) -> &'static str {
        self.descriptor().message
    }

    pub fn status(self) -> StatusCode {
        self.descriptor().http_status
    }

    pub fn with_message(self, message: impl Into<String>) -> Error {
        Error {
            code: self,
            message: Some(message.into()),
            detail: None,
        }
    }

    pub fn with_detail(self, detail: impl Serialize) -> Error {
        Error::from(self).with_detail(detail)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// One served error: a code plus optional message override and detail.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub code: ErrorCode,
    pub message: Option<String>,
    pub detail: Option<Value>,
}

impl Error {
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_else(|| self.code.message())
    }

    pub fn with_detail(mut self, detail: impl Serialize) -> Self {
        self.detail = serde_json::to_value(detail).ok().filter(|v| !v.is_null());
        self
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
            detail: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.value(), self.message())
    }
}

impl std::error::Error for Error {}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.detail.is_some() { 3 } else { 2 };
        let mut s = serializer.serialize_struct("Error", len)?;
        s.serialize_field("code", self.code.value())?;
        s.serialize_field("message", self.message())?;
        if let Some(detail) = &self.detail {
            s.serialize_field("detail", detail)?;
        }
        s.end()
    }
}

/// Ordered list of errors accumulated during one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: impl Into<Error>) {
        self.0.push(err.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Error> {
        self.0.first()
    }

    /// Status of the first error, 500 when empty.
    pub fn status(&self) -> StatusCode {
        self.first()
            .map(|e| e.code.status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<Error> for Errors {
    fn from(err: Error) -> Self {
        Self(vec![err])
    }
}

impl From<ErrorCode> for Errors {
    fn from(code: ErrorCode) -> Self {
        Self(vec![code.into()])
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for Errors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("errors", &self.0)?;
        map.end()
    }
}
