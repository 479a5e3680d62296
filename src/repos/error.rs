/*
 * Responsibility
 * - Meaning a storage driver reports to its callers
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("unknown storage driver: {0}")]
    UnknownDriver(String),
    #[error("storage driver error: {0}")]
    Driver(String),
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
