mod support;

use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::http::StatusCode;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use canaria::repos::{MemoryStorage, StorageDriver};

use support::{Pki, REALM, RecordingNotifier, config, live_canary, request, router_with, send};

fn bundle(pki: &Pki) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(pki.root_pem().as_bytes()).unwrap();
    file
}

fn token_config(bundle: &tempfile::NamedTempFile) -> canaria::config::Config {
    let path = bundle.path().to_str().unwrap().to_string();
    config(&[
        ("CANARIA_AUTH", "token"),
        ("CANARIA_AUTH_REALM", REALM),
        ("CANARIA_AUTH_ISSUER", support::ISSUER),
        ("CANARIA_AUTH_SERVICE", support::SERVICE),
        ("CANARIA_AUTH_ROOTCERTBUNDLE", path.as_str()),
    ])
}

#[tokio::test]
async fn token_required_challenges_with_scope() {
    let pki = Pki::new();
    let bundle = bundle(&pki);
    let storage = Arc::new(MemoryStorage::new());
    let canary = live_canary(60);
    storage.canaries().store(&canary).await.unwrap();
    let router = router_with(storage, Arc::new(RecordingNotifier::default()), &token_config(&bundle));

    let res = send(
        &router,
        request("GET", &format!("/v1/canary/{}", canary.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_code(), "UNAUTHORIZED");
    let challenge = res.header("www-authenticate").unwrap();
    assert!(challenge.starts_with(&format!(r#"Bearer realm="{REALM}",service="canaria""#)));
    assert!(challenge.contains(&format!(r#"scope="canary:{}:read""#, canary.id)));
    assert!(!challenge.contains("error="));
    assert_eq!(
        res.json()["errors"][0]["detail"],
        serde_json::json!([{"type": "canary", "name": canary.id, "action": "read"}])
    );
}

#[tokio::test]
async fn scoped_token_reads_canary() {
    let pki = Pki::new();
    let bundle = bundle(&pki);
    let storage = Arc::new(MemoryStorage::new());
    let canary = live_canary(60);
    storage.canaries().store(&canary).await.unwrap();
    let router = router_with(storage, Arc::new(RecordingNotifier::default()), &token_config(&bundle));

    let res = send(
        &router,
        request("GET", &format!("/v1/canary/{}", canary.id))
            .header("authorization", format!("Bearer {}", pki.token(&canary.id, &["read"])))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["id"], canary.id.as_str());
}

#[tokio::test]
async fn head_on_unknown_canary_with_valid_token_is_empty_404() {
    let pki = Pki::new();
    let bundle = bundle(&pki);
    let router = router_with(
        Arc::new(MemoryStorage::new()),
        Arc::new(RecordingNotifier::default()),
        &token_config(&bundle),
    );

    let res = send(
        &router,
        request("HEAD", "/v1/canary/unknown-id")
            .header("authorization", format!("Bearer {}", pki.token("unknown-id", &["read"])))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(res.body.is_empty());
    assert!(res.header("www-authenticate").is_none());
}

#[tokio::test]
async fn read_only_token_cannot_refresh() {
    let pki = Pki::new();
    let bundle = bundle(&pki);
    let storage = Arc::new(MemoryStorage::new());
    let canary = live_canary(60);
    storage.canaries().store(&canary).await.unwrap();
    let router = router_with(
        storage.clone(),
        Arc::new(RecordingNotifier::default()),
        &token_config(&bundle),
    );

    let res = send(
        &router,
        request("POST", &format!("/v1/canary/{}", canary.id))
            .header("authorization", format!("Bearer {}", pki.token(&canary.id, &["read"])))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let challenge = res.header("www-authenticate").unwrap();
    assert!(challenge.ends_with(r#",error="insufficient_scope""#));
    assert_eq!(storage.canaries().get(&canary.id).await.unwrap().next, canary.next);
}

#[tokio::test]
async fn misconfigured_token_strategy_fails_startup() {
    let empty = tempfile::NamedTempFile::new().unwrap();
    let config = token_config(&empty);

    assert!(canaria::app::build_state(&config).is_err());
}

#[tokio::test]
async fn silly_accepts_any_authorization() {
    let storage = Arc::new(MemoryStorage::new());
    let canary = live_canary(60);
    storage.canaries().store(&canary).await.unwrap();
    let config = config(&[
        ("CANARIA_AUTH", "silly"),
        ("CANARIA_AUTH_REALM", "dev"),
        ("CANARIA_AUTH_SERVICE", "canaria"),
    ]);
    let router = router_with(storage, Arc::new(RecordingNotifier::default()), &config);
    let uri = format!("/v1/canary/{}", canary.id);

    let res = send(&router, request("GET", &uri).body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.header("www-authenticate").unwrap().starts_with(r#"Bearer realm="dev""#));

    let res = send(
        &router,
        request("GET", &uri)
            .header("authorization", "anything")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn htpasswd_checks_basic_credentials() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let hash = bcrypt::hash("correct horse", 4).unwrap();
    writeln!(file, "alice:{hash}").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let storage = Arc::new(MemoryStorage::new());
    let canary = live_canary(60);
    storage.canaries().store(&canary).await.unwrap();
    let config = config(&[
        ("CANARIA_AUTH", "htpasswd"),
        ("CANARIA_AUTH_REALM", "canaria-basic"),
        ("CANARIA_AUTH_PATH", path.as_str()),
    ]);
    let router = router_with(storage, Arc::new(RecordingNotifier::default()), &config);
    let uri = format!("/v1/canary/{}", canary.id);
    let basic = |user: &str, pass: &str| format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")));

    let res = send(&router, request("GET", &uri).body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.header("www-authenticate"), Some(r#"Basic realm="canaria-basic""#));

    for (user, pass) in [("alice", "wrong"), ("mallory", "correct horse")] {
        let res = send(
            &router,
            request("GET", &uri)
                .header("authorization", basic(user, pass))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{user}");
        assert_eq!(res.error_code(), "UNAUTHORIZED");
    }

    let res = send(
        &router,
        request("GET", &uri)
            .header("authorization", basic("alice", "correct horse"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
}
