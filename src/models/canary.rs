use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanaryError {
    #[error("ttl must be a positive number of seconds")]
    InvalidTtl,
    #[error("title must be at most 256 characters")]
    TitleTooLong,
}

/// A dead-man's switch. It stays alive while it is refreshed within `ttl` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canary {
    pub id: String,
    /// Seconds between refreshes. Negative once killed.
    pub ttl: i64,
    /// Unix timestamp of the last refresh.
    pub refreshed: i64,
    pub title: String,
    pub description: String,
    /// Token rotated on every refresh.
    pub next: String,
    pub tags: Vec<String>,
}

impl Canary {
    pub fn new(ttl: i64, title: String, description: String, tags: Vec<String>) -> Self {
        let mut canary = Self {
            id: Uuid::new_v4().to_string(),
            ttl,
            refreshed: 0,
            title,
            description,
            next: String::new(),
            tags,
        };
        canary.refresh();
        canary
    }

    pub fn validate(&self) -> Result<(), CanaryError> {
        if self.ttl <= 0 {
            return Err(CanaryError::InvalidTtl);
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(CanaryError::TitleTooLong);
        }
        Ok(())
    }

    pub fn refresh(&mut self) {
        self.refresh_at(chrono::Utc::now().timestamp());
    }

    pub fn refresh_at(&mut self, now: i64) {
        self.refreshed = now;
        self.next = next_token(&self.next);
    }

    pub fn kill(&mut self) {
        self.refreshed = 0;
        self.ttl = -1;
        self.title.clear();
        self.description.clear();
        self.next.clear();
        self.tags.clear();
    }

    pub fn is_dead(&self) -> bool {
        self.ttl < 0
    }

    pub fn is_zombie(&self) -> bool {
        self.is_zombie_at(chrono::Utc::now().timestamp())
    }

    /// Past its deadline but not yet marked dead.
    pub fn is_zombie_at(&self, now: i64) -> bool {
        !self.is_dead() && now > self.deadline()
    }

    pub fn deadline(&self) -> i64 {
        self.refreshed.saturating_add(self.ttl)
    }
}

fn next_token(previous: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(previous.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canary(ttl: i64) -> Canary {
        Canary::new(ttl, "backup".into(), "nightly".into(), vec!["db".into()])
    }

    #[test]
    fn refresh_rotates_token() {
        let mut c = canary(60);
        let before = c.next.clone();
        c.refresh_at(100);

        assert_eq!(c.refreshed, 100);
        assert_ne!(c.next, before);
        assert!(!c.next.is_empty());
    }

    #[test]
    fn zombie_and_dead() {
        let mut c = canary(60);
        c.refresh_at(1_000);

        assert!(!c.is_zombie_at(1_060));
        assert!(c.is_zombie_at(1_061));

        c.kill();
        assert!(c.is_dead());
        assert!(!c.is_zombie_at(1_061));
        assert!(c.tags.is_empty() && c.next.is_empty());
    }

    #[test]
    fn validation() {
        assert_eq!(canary(0).validate(), Err(CanaryError::InvalidTtl));
        assert_eq!(canary(-1).validate(), Err(CanaryError::InvalidTtl));

        let mut long = canary(5);
        long.title = "x".repeat(MAX_TITLE_LEN + 1);
        assert_eq!(long.validate(), Err(CanaryError::TitleTooLong));
        assert!(canary(5).validate().is_ok());
    }
}
