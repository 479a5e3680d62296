#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rcgen::{BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa};
use tower::ServiceExt;

use canaria::app;
use canaria::config::Config;
use canaria::models::{Canary, Event, WebHook};
use canaria::repos::{CanaryStore, HookStore, MemoryStorage, StorageDriver, StorageResult};
use canaria::services::webhook::{Notification, Notifier, NotifyError};
use canaria::state::AppState;

pub const ISSUER: &str = "canaria-issuer";
pub const SERVICE: &str = "canaria";
pub const REALM: &str = "https://auth.example.com/token";

pub fn config(pairs: &[(&str, &str)]) -> Config {
    Config::from_vars(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .unwrap()
}

/// Router over the state `build_state` makes from `config`.
pub fn router(config: &Config) -> Router {
    let state = app::build_state(config).unwrap();
    app::build_router(state, config)
}

pub fn router_with(storage: Arc<dyn StorageDriver>, notifier: Arc<dyn Notifier>, config: &Config) -> Router {
    let built = app::build_state(config).unwrap();
    let state = AppState::new(storage, built.auth, notifier, built.base);
    app::build_router(state, config)
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn error_code(&self) -> String {
        self.json()["errors"][0]["code"].as_str().unwrap().to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(router: &Router, req: Request<Body>) -> Reply {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    Reply {
        status,
        headers,
        body,
    }
}

pub fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

pub fn json_body(value: serde_json::Value) -> Body {
    Body::from(value.to_string())
}

pub fn live_canary(ttl: i64) -> Canary {
    Canary::new(ttl, "nightly backup".into(), "db dump".into(), vec!["ops".into()])
}

/// Memory storage that counts canary writes.
#[derive(Default)]
pub struct CountingStorage {
    canaries: CountingCanaries,
    memory: MemoryStorage,
}

#[derive(Default)]
struct CountingCanaries {
    memory: MemoryStorage,
    stores: AtomicUsize,
}

impl CountingStorage {
    pub fn canary_stores(&self) -> usize {
        self.canaries.stores.load(Ordering::SeqCst)
    }
}

impl StorageDriver for CountingStorage {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn canaries(&self) -> &dyn CanaryStore {
        &self.canaries
    }

    fn hooks(&self) -> &dyn HookStore {
        self.memory.hooks()
    }
}

#[async_trait]
impl CanaryStore for CountingCanaries {
    async fn get(&self, id: &str) -> StorageResult<Canary> {
        self.memory.canaries().get(id).await
    }

    async fn store(&self, canary: &Canary) -> StorageResult<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.memory.canaries().store(canary).await
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        self.memory.canaries().delete(id).await
    }
}

/// Notifier that records deliveries instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    sent: Mutex<Vec<(String, Event)>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, Event)> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait for background deliveries to reach `count`.
    pub async fn wait_for(&self, count: usize) -> Vec<(String, Event)> {
        for _ in 0..100 {
            if self.sent().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, hook: &WebHook, n: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((hook.id.clone(), n.action));
        if self.fail {
            return Err(NotifyError::Encode("endpoint unreachable".into()));
        }
        Ok(())
    }
}

/// Root CA plus one signing certificate it issued.
pub struct Pki {
    pub root_der: Vec<u8>,
    pub leaf: Certificate,
    pub leaf_der: Vec<u8>,
}

fn cert(cn: &str, ca: bool) -> Certificate {
    let mut params = CertificateParams::new(Vec::<String>::new());
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, cn);
    if ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    }
    Certificate::from_params(params).unwrap()
}

impl Pki {
    pub fn new() -> Self {
        let root = cert("canaria integration root", true);
        let root_der = root.serialize_der().unwrap();
        let leaf = cert("canaria integration signer", false);
        let leaf_der = leaf.serialize_der_with_signer(&root).unwrap();
        Self {
            root_der,
            leaf,
            leaf_der,
        }
    }

    pub fn root_pem(&self) -> String {
        let body = STANDARD.encode(&self.root_der);
        let lines: Vec<&str> = body
            .as_bytes()
            .chunks(64)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect();
        format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            lines.join("\n")
        )
    }

    /// ES256 token carrying the leaf in `x5c`, granting `actions` on `canary:<id>`.
    pub fn token(&self, canary_id: &str, actions: &[&str]) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": ISSUER,
            "sub": "alice",
            "aud": SERVICE,
            "exp": now + 300,
            "nbf": now - 10,
            "iat": now - 10,
            "jti": uuid::Uuid::new_v4().to_string(),
            "access": [{"type": "canary", "name": canary_id, "actions": actions}],
        });
        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::ES256);
        header.x5c = Some(vec![STANDARD.encode(&self.leaf_der)]);
        let key =
            jsonwebtoken::EncodingKey::from_ec_pem(self.leaf.serialize_private_key_pem().as_bytes())
                .unwrap();
        jsonwebtoken::encode(&header, &claims, &key).unwrap()
    }
}
