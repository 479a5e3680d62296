//! Response headers added to every answer.
//!
//! Responsibility:
//! - `X-Canaria-Version`
//! - Operator-configured headers (`CANARIA_HTTP_HEADERS`)
use axum::Router;
use axum::http::header::{HeaderName, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

pub const VERSION_HEADER: &str = "x-canaria-version";

/// Apply the version header and `headers` to all responses.
/// A header already set by a handler is kept.
pub fn apply(router: Router, version: &'static str, headers: &[(HeaderName, HeaderValue)]) -> Router {
    let router = headers.iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            name.clone(),
            value.clone(),
        ))
    });

    router.layer(SetResponseHeaderLayer::overriding(
        HeaderName::from_static(VERSION_HEADER),
        HeaderValue::from_static(version),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn version_and_configured_headers_are_added() {
        let configured = vec![
            (HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ];
        let router = apply(
            Router::new().route(
                "/",
                get(|| async { ([(header::CACHE_CONTROL, "no-cache")], "ok") }),
            ),
            "1.2.3",
            &configured,
        );

        let res = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.headers()[VERSION_HEADER], "1.2.3");
        assert_eq!(res.headers()["x-frame-options"], "DENY");
        assert_eq!(res.headers()[header::CACHE_CONTROL], "no-cache");
    }
}
