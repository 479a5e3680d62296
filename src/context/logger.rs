//! Context logger.
//!
//! A `Logger` is a snapshot of `key=value` fields. Deriving a logger from the
//! context copies the current values of the requested keys, so later frames do
//! not change an already-derived logger.
//!
//! Every event is emitted inside a `ctx` span. Well-known keys become span
//! fields, so structured output keeps them queryable; any other field is
//! rendered into the event's `ctx` field.
use std::fmt;
use std::sync::Arc;

use tracing::field::Empty;
use tracing::{Level, Span};

use super::Context;

pub(super) const LOGGER_KEY: &str = "logger";

macro_rules! ctx_span {
    ($level:expr) => {
        tracing::span!(
            $level,
            "ctx",
            version = Empty,
            route = Empty,
            http.request.id = Empty,
            http.request.startedat = Empty,
            http.request.method = Empty,
            http.request.uri = Empty,
            http.request.host = Empty,
            http.request.remoteaddr = Empty,
            http.request.referer = Empty,
            http.request.useragent = Empty,
            http.request.contenttype = Empty,
            http.response.status = Empty,
            http.response.written = Empty,
            http.response.contenttype = Empty,
            http.response.duration = Empty,
            auth.strategy = Empty,
            auth.user.name = Empty,
            canary.id = Empty,
            canary.ttl = Empty,
            webhook.id = Empty,
            webhook.event = Empty,
            webhook.url = Empty,
            webhook.count = Empty,
            err.code = Empty,
            err.message = Empty,
            err.detail = Empty,
        )
    };
}

#[derive(Clone, Debug, Default)]
pub struct Logger {
    fields: Arc<Vec<(String, String)>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// New logger with `key` set, replacing an existing field of the same name.
    pub fn with_field(&self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let key = key.into();
        let mut fields: Vec<_> = self
            .fields
            .iter()
            .filter(|(k, _)| *k != key)
            .cloned()
            .collect();
        fields.push((key, value.to_string()));
        Self {
            fields: Arc::new(fields),
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn log(&self, level: Level, msg: impl fmt::Display) {
        let span = match level {
            Level::ERROR => ctx_span!(Level::ERROR),
            Level::WARN => ctx_span!(Level::WARN),
            Level::INFO => ctx_span!(Level::INFO),
            Level::DEBUG => ctx_span!(Level::DEBUG),
            Level::TRACE => ctx_span!(Level::TRACE),
        };
        let rest = self.record(&span);
        let _entered = span.enter();

        match level {
            Level::ERROR => tracing::error!(ctx = %rest, "{msg}"),
            Level::WARN => tracing::warn!(ctx = %rest, "{msg}"),
            Level::INFO => tracing::info!(ctx = %rest, "{msg}"),
            Level::DEBUG => tracing::debug!(ctx = %rest, "{msg}"),
            Level::TRACE => tracing::trace!(ctx = %rest, "{msg}"),
        }
    }

    /// Record the fields `span` declares; returns the ones it does not.
    fn record(&self, span: &Span) -> Logger {
        let declared = |key: &str| {
            span.metadata()
                .is_some_and(|meta| meta.fields().field(key).is_some())
        };

        let mut rest = Vec::new();
        for (key, value) in self.fields.iter() {
            if declared(key.as_str()) {
                span.record(key.as_str(), value.as_str());
            } else {
                rest.push((key.clone(), value.clone()));
            }
        }
        Logger {
            fields: Arc::new(rest),
        }
    }

    pub fn debug(&self, msg: impl fmt::Display) {
        self.log(Level::DEBUG, msg);
    }

    pub fn info(&self, msg: impl fmt::Display) {
        self.log(Level::INFO, msg);
    }

    pub fn warn(&self, msg: impl fmt::Display) {
        self.log(Level::WARN, msg);
    }

    pub fn error(&self, msg: impl fmt::Display) {
        self.log(Level::ERROR, msg);
    }
}

impl fmt::Display for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if v.is_empty() || v.contains(char::is_whitespace) {
                write!(f, "{k}={v:?}")?;
            } else {
                write!(f, "{k}={v}")?;
            }
        }
        Ok(())
    }
}

impl Context {
    /// Nearest logger on the chain, or an empty one.
    pub fn logger(&self) -> Logger {
        match self.value(LOGGER_KEY) {
            Some(super::ContextValue::Logger(l)) => l,
            _ => Logger::default(),
        }
    }

    pub fn with_logger(&self, logger: Logger) -> Self {
        self.push(super::FrameKind::Logger(logger))
    }

    /// Current logger extended with the present values of `keys`.
    /// Keys without a value are skipped.
    pub fn logger_with_keys(&self, keys: &[&str]) -> Logger {
        keys.iter().fold(self.logger(), |logger, key| match self.value(key) {
            Some(v) => logger.with_field(*key, v),
            None => logger,
        })
    }

    pub fn logger_with_field(&self, key: impl Into<String>, value: impl fmt::Display) -> Logger {
        self.logger().with_field(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_snapshotted() {
        let ctx = Context::background().with_value("user", "alice");
        let logger = ctx.logger_with_keys(&["user", "absent"]);
        let ctx = ctx.with_logger(logger).with_value("user", "bob");

        assert_eq!(ctx.logger().field("user"), Some("alice"));
        assert_eq!(ctx.logger().field("absent"), None);
        assert_eq!(ctx.logger_with_keys(&["user"]).field("user"), Some("bob"));
    }

    #[test]
    fn display_quotes_values_with_spaces() {
        let logger = Logger::new()
            .with_field("a", "1")
            .with_field("b", "two words")
            .with_field("a", "3");

        assert_eq!(logger.to_string(), r#"b="two words" a=3"#);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn known_keys_are_separate_json_fields() {
        let out = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(out.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            Logger::new()
                .with_field("canary.id", "c1")
                .with_field("http.response.status", 404)
                .with_field("region", "eu")
                .info("response completed");
        });

        let raw = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(line["span"]["canary.id"], "c1");
        assert_eq!(line["span"]["http.response.status"], "404");
        assert_eq!(line["fields"]["message"], "response completed");
        assert_eq!(line["fields"]["ctx"], "region=eu");
    }
}
