//! Serving accumulated errors on a response writer.
use axum::http::header::{self, HeaderValue};

use crate::context::ResponseHandle;

use super::Errors;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Write the `{"errors": [...]}` envelope with the first error's status.
pub fn serve_json(w: &ResponseHandle, errors: impl Into<Errors>) -> Result<(), serde_json::Error> {
    let errors = errors.into();
    let body = serde_json::to_vec(&errors)?;

    w.set_header(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    w.write_header(errors.status());
    w.write(&body);
    Ok(())
}

/// Write only the status line, as HEAD responses must not carry a body.
pub fn serve_status(w: &ResponseHandle, errors: &Errors) {
    w.write_header(errors.status());
}

/// Serve errors for `method`, falling back to a bare 500 when encoding fails.
pub fn serve_errors(w: &ResponseHandle, method: &axum::http::Method, errors: &Errors) {
    if method == axum::http::Method::HEAD {
        serve_status(w, errors);
        return;
    }
    if let Err(err) = serve_json(w, errors.clone()) {
        tracing::error!(error = %err, "error serving error json");
        w.write_header(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errcode::ErrorCode;
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn head_gets_status_only() {
        let w = ResponseHandle::buffered();
        serve_errors(&w, &Method::HEAD, &ErrorCode(424_242).into());

        let res = w.take_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn json_envelope_has_content_type() {
        let w = ResponseHandle::buffered();
        serve_errors(&w, &Method::GET, &ErrorCode(424_242).with_message("boom").into());

        let res = w.take_response();
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"][0]["message"], "boom");
    }
}
