/*
 * Responsibility
 * - Domain entities (Canary, WebHook) and their state transitions
 * - Validation rules applied before anything is stored
 */
mod canary;
mod webhook;

pub use canary::{Canary, CanaryError};
pub use webhook::{ContentType, Event, WebHook, WebHookError};
