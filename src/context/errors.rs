//! Errors frame.
use crate::errcode::{Error, Errors};

use super::{Context, ContextValue, FrameKind};

pub const ERRORS_KEY: &str = "errors";

impl Context {
    pub fn with_errors(&self, errors: Errors) -> Self {
        self.push(FrameKind::Errors(errors))
    }

    /// Errors accumulated so far; empty when no errors frame is attached.
    pub fn errors(&self) -> Errors {
        match self.value(ERRORS_KEY) {
            Some(ContextValue::Errors(errs)) => errs,
            _ => Errors::new(),
        }
    }

    /// Chain with `err` appended to the current error list.
    pub fn append_error(&self, err: impl Into<Error>) -> Self {
        let mut errors = self.errors();
        errors.push(err.into());
        self.with_errors(errors)
    }
}
