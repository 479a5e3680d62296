/*
 * Responsibility
 * - Canary request DTO and its conversion into a fresh Canary
 * - Responses serialize the Canary itself
 */
use serde::Deserialize;

use crate::models::Canary;

#[derive(Debug, Deserialize)]
pub struct CreateCanaryRequest {
    pub ttl: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateCanaryRequest {
    /// New canary, refreshed now. Validation is left to the caller.
    pub fn into_canary(self) -> Canary {
        Canary::new(self.ttl, self.title, self.description, self.tags)
    }
}
