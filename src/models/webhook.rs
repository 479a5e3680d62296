use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebHookError {
    #[error("url must be an absolute http(s) url")]
    InvalidUrl,
    #[error("name must be at most 256 characters")]
    NameTooLong,
}

/// Body encoding used when delivering to a hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Json,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Dead,
    Ping,
}

impl Event {
    pub fn as_str(self) -> &'static str {
        match self {
            Event::Dead => "dead",
            Event::Ping => "ping",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP callback registered on one canary.
#[derive(Debug, Clone, PartialEq)]
pub struct WebHook {
    pub id: String,
    pub canary_id: String,
    pub name: String,
    pub url: String,
    pub content_type: ContentType,
    /// HMAC key for the delivery signature. Empty disables signing.
    pub secret: String,
    pub insecure_ssl: bool,
    /// Subscribed events. Empty means every event.
    pub events: Vec<Event>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl WebHook {
    pub fn new(canary_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            canary_id: canary_id.into(),
            name: String::new(),
            url: url.into(),
            content_type: ContentType::default(),
            secret: String::new(),
            insecure_ssl: false,
            events: Vec::new(),
            active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), WebHookError> {
        let url = url::Url::parse(&self.url).map_err(|_| WebHookError::InvalidUrl)?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(WebHookError::InvalidUrl);
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(WebHookError::NameTooLong);
        }
        Ok(())
    }

    pub fn subscribes(&self, event: Event) -> bool {
        self.events.is_empty() || self.events.contains(&event)
    }
}
