/*
 * Responsibility
 * - Startup failures that keep the process from serving
 * - Request-time failures never use this type; they travel as errcode::Error in the context
 */
use thiserror::Error;

use crate::config::ConfigError;
use crate::errcode::RegistryError;
use crate::repos::StorageError;
use crate::services::auth::StrategyError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("error code registration failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("auth strategy: {0}")]
    Strategy(#[from] StrategyError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("webhook client: {0}")]
    Notifier(#[from] reqwest::Error),
    #[error("logging: {0}")]
    Logging(String),
}
