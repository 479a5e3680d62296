//! Outbound webhook delivery.
//!
//! Responsibility:
//! - Encode a `Notification` as JSON or as a form with a fixed field list
//! - Sign the body with the hook secret (`X-Canary-Signature: sha256=<hex>`)
//! - POST it with a bounded timeout; non-2xx answers are failures
//! - Fan out kill notifications as detached tasks that only log failures
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::context::Logger;
use crate::models::{Canary, ContentType, Event, WebHook};

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_HEADER: &str = "X-Canary-Event";
pub const DELIVERY_HEADER: &str = "X-Canary-Delivery";
pub const SIGNATURE_HEADER: &str = "X-Canary-Signature";
pub const HOOKER_USER_AGENT: &str = "Canary-Hooker/0.0.1";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook endpoint answered {0}")]
    Status(reqwest::StatusCode),
    #[error("unable to encode notification: {0}")]
    Encode(String),
}

/// Payload delivered to a hook.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub action: Event,
    pub canary: Canary,
}

impl Notification {
    pub fn new(action: Event, canary: Canary) -> Self {
        Self { action, canary }
    }

    /// Form fields, one per notification member.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let c = &self.canary;
        vec![
            ("action", self.action.to_string()),
            ("canary[id]", c.id.clone()),
            ("canary[ttl]", c.ttl.to_string()),
            ("canary[refreshed]", c.refreshed.to_string()),
            ("canary[title]", c.title.clone()),
            ("canary[description]", c.description.clone()),
            ("canary[next]", c.next.clone()),
            ("canary[tags]", c.tags.join(",")),
        ]
    }

    /// Body bytes and content type for `content_type`.
    pub fn encode(&self, content_type: ContentType) -> Result<(Vec<u8>, &'static str), NotifyError> {
        match content_type {
            ContentType::Json => serde_json::to_vec(self)
                .map(|body| (body, JSON_CONTENT_TYPE))
                .map_err(|e| NotifyError::Encode(e.to_string())),
            ContentType::Form => {
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(self.form_fields())
                    .finish();
                Ok((body.into_bytes(), FORM_CONTENT_TYPE))
            }
        }
    }
}

/// `sha256=<hex hmac>` of `body` keyed with `secret`.
pub fn signature(secret: &str, body: &[u8]) -> Result<String, NotifyError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| NotifyError::Encode(e.to_string()))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, hook: &WebHook, notification: &Notification) -> Result<(), NotifyError>;
}

/// Delivers notifications over HTTP.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(HOOKER_USER_AGENT)
            .build()?;
        let insecure_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(HOOKER_USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            insecure_client,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, hook: &WebHook, notification: &Notification) -> Result<(), NotifyError> {
        let (body, content_type) = notification.encode(hook.content_type)?;
        let client = if hook.insecure_ssl {
            &self.insecure_client
        } else {
            &self.client
        };

        let mut req = client
            .post(&hook.url)
            .header(CONTENT_TYPE, content_type)
            .header(USER_AGENT, HOOKER_USER_AGENT)
            .header(EVENT_HEADER, notification.action.as_str())
            .header(DELIVERY_HEADER, Uuid::new_v4().to_string());
        if !hook.secret.is_empty() {
            req = req.header(SIGNATURE_HEADER, signature(&hook.secret, &body)?);
        }

        let res = req.body(body).send().await?;
        if res.status().as_u16() >= 300 {
            return Err(NotifyError::Status(res.status()));
        }
        Ok(())
    }
}

/// Deliver `notification` to every active hook subscribed to its event.
/// Each delivery runs on its own task; failures are only logged.
pub fn notify_in_background(
    notifier: Arc<dyn Notifier>,
    hooks: Vec<WebHook>,
    notification: Notification,
    logger: Logger,
) -> usize {
    let mut spawned = 0;
    for hook in hooks
        .into_iter()
        .filter(|h| h.active && h.subscribes(notification.action))
    {
        let notifier = notifier.clone();
        let notification = notification.clone();
        let logger = logger
            .with_field("webhook.id", &hook.id)
            .with_field("webhook.event", notification.action);
        tokio::spawn(async move {
            match notifier.notify(&hook, &notification).await {
                Ok(()) => logger.debug("webhook delivered"),
                Err(err) => logger.error(format!("webhook delivery failed: {err}")),
            }
        });
        spawned += 1;
    }
    spawned
}
