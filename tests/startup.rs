//! Router built straight from the public builders, with nothing else
//! installed in the process first.
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use canaria::app;
use canaria::config::Config;

#[tokio::test]
async fn built_router_serves_registered_statuses() {
    let config = Config::from_vars(Vec::new()).unwrap();
    let state = app::build_state(&config).unwrap();
    let router = app::build_router(state, &config);

    let res = router
        .oneshot(
            Request::builder()
                .uri("/v1/canary/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["errors"][0]["code"], "CANARY_UNKNOWN");
    assert_eq!(json["errors"][0]["message"], "canary unknown");
}
