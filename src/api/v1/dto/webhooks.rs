/*
 * Responsibility
 * - Webhook setup request and response DTOs
 * - The secret is accepted on setup and never sent back
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ContentType, Event, WebHook};

#[derive(Debug, Deserialize)]
pub struct WebHookConfig {
    pub url: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub insecure_ssl: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateWebHookRequest {
    #[serde(default)]
    pub name: String,
    pub config: WebHookConfig,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl CreateWebHookRequest {
    pub fn into_hook(self, canary_id: &str) -> WebHook {
        let mut hook = WebHook::new(canary_id, self.config.url);
        hook.name = self.name;
        hook.content_type = self.config.content_type;
        hook.secret = self.config.secret;
        hook.insecure_ssl = self.config.insecure_ssl;
        hook.events = self.events;
        hook.active = self.active;
        hook
    }
}

#[derive(Debug, Serialize)]
pub struct WebHookResponse {
    pub id: String,
    pub canary_id: String,
    pub name: String,
    pub url: String,
    pub content_type: ContentType,
    pub insecure_ssl: bool,
    pub events: Vec<Event>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<WebHook> for WebHookResponse {
    fn from(h: WebHook) -> Self {
        Self {
            id: h.id,
            canary_id: h.canary_id,
            name: h.name,
            url: h.url,
            content_type: h.content_type,
            insecure_ssl: h.insecure_ssl,
            events: h.events,
            active: h.active,
            updated_at: h.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_request_builds_hook() {
        let req: CreateWebHookRequest = serde_json::from_str(
            r#"{"name": "ops", "config": {"url": "https://example.com/h", "content_type": "form", "secret": "s"}, "events": ["dead"]}"#,
        )
        .unwrap();
        let hook = req.into_hook("abc");

        assert_eq!(hook.canary_id, "abc");
        assert_eq!(hook.content_type, ContentType::Form);
        assert_eq!(hook.events, vec![Event::Dead]);
        assert!(hook.active);
    }

    #[test]
    fn unknown_event_is_rejected() {
        let res = serde_json::from_str::<CreateWebHookRequest>(
            r#"{"config": {"url": "https://example.com/h"}, "events": ["born"]}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn response_omits_secret() {
        let mut hook = WebHook::new("abc", "https://example.com/h");
        hook.secret = "hunter2".into();
        let json = serde_json::to_value(WebHookResponse::from(hook)).unwrap();

        assert!(json.get("secret").is_none());
        assert_eq!(json["content_type"], "json");
    }
}
