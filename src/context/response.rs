//! Response writers.
//!
//! Handlers never build an axum `Response` directly: they write through a
//! `ResponseHandle` stored in the context's response frame. The handle wraps an
//! `InstrumentedWriter`, which records the status (first write wins), the bytes
//! written and the content type so the response logger can report them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Minimal writer contract shared by the buffered and instrumented writers.
pub trait ResponseWriter: Send {
    fn headers(&self) -> &HeaderMap;
    fn headers_mut(&mut self) -> &mut HeaderMap;
    fn write_header(&mut self, status: StatusCode);
    /// Append body bytes. Returns the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> usize;
    /// Push buffered output to the client, when the writer supports it.
    fn flush(&mut self) {}
    /// Whether the client went away.
    fn is_closed(&self) -> bool {
        false
    }
    fn into_response(self: Box<Self>) -> Response;
}

/// Collects the whole response in memory and converts it into an axum `Response`.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseWriter for BufferedResponse {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(buf);
        buf.len()
    }

    fn into_response(self: Box<Self>) -> Response {
        let this = *self;
        let mut res = Response::new(Body::from(this.body));
        *res.status_mut() = this.status.unwrap_or(StatusCode::OK);
        *res.headers_mut() = this.headers;
        res
    }
}

/// Records status, byte count and content type of everything written through it.
pub struct InstrumentedWriter {
    inner: Box<dyn ResponseWriter>,
    status: Option<StatusCode>,
    written: u64,
}

impl InstrumentedWriter {
    pub fn new(inner: Box<dyn ResponseWriter>) -> Self {
        Self {
            inner,
            status: None,
            written: 0,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn content_type(&self) -> Option<String> {
        self.inner
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }
}

impl ResponseWriter for InstrumentedWriter {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if let Some(current) = self.status {
            tracing::debug!(%current, ignored = %status, "superfluous write_header call");
            return;
        }
        self.status = Some(status);
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        let n = self.inner.write(buf);
        self.written += n as u64;
        n
    }

    fn flush(&mut self) {
        self.inner.flush();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn into_response(self: Box<Self>) -> Response {
        self.inner.into_response()
    }
}

/// Shared handle to the request's instrumented writer.
///
/// Cloning the handle does not clone the response; all clones write into the
/// same writer. `take_response` consumes the writer exactly once.
#[derive(Clone)]
pub struct ResponseHandle {
    inner: Arc<Mutex<Option<InstrumentedWriter>>>,
}

impl ResponseHandle {
    pub fn new(writer: Box<dyn ResponseWriter>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(InstrumentedWriter::new(writer)))),
        }
    }

    pub fn buffered() -> Self {
        Self::new(Box::new(BufferedResponse::new()))
    }

    fn lock(&self) -> MutexGuard<'_, Option<InstrumentedWriter>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with<R>(&self, f: impl FnOnce(&mut InstrumentedWriter) -> R) -> Option<R> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(w) => Some(f(w)),
            None => {
                tracing::warn!("write after response was taken");
                None
            }
        }
    }

    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.with(|w| w.headers_mut().insert(name, value));
    }

    pub fn write_header(&self, status: StatusCode) {
        self.with(|w| w.write_header(status));
    }

    pub fn write(&self, buf: &[u8]) -> usize {
        self.with(|w| w.write(buf)).unwrap_or(0)
    }

    pub fn flush(&self) {
        self.with(|w| w.flush());
    }

    pub fn is_closed(&self) -> bool {
        self.with(|w| w.is_closed()).unwrap_or(true)
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.with(|w| w.status()).flatten()
    }

    pub fn written(&self) -> u64 {
        self.with(|w| w.written()).unwrap_or(0)
    }

    pub fn content_type(&self) -> Option<String> {
        self.with(|w| w.content_type()).flatten()
    }

    /// Convert the written state into the final response. Later calls return 500.
    pub fn take_response(&self) -> Response {
        match self.lock().take() {
            Some(w) => ResponseWriter::into_response(Box::new(w)),
            None => {
                tracing::error!("response already taken");
                IntoResponse::into_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl std::fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("status", &self.status())
            .field("written", &self.written())
            .finish()
    }
}
