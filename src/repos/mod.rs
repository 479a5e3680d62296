/*
 * Responsibility
 * - Storage interfaces for canaries and webhooks
 * - Driver selection by name
 */
pub mod error;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Canary, WebHook};

pub use error::StorageError;
pub use memory::MemoryStorage;

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait CanaryStore: Send + Sync {
    async fn get(&self, id: &str) -> StorageResult<Canary>;
    async fn store(&self, canary: &Canary) -> StorageResult<()>;
    async fn delete(&self, id: &str) -> StorageResult<()>;
}

#[async_trait]
pub trait HookStore: Send + Sync {
    async fn get(&self, id: &str) -> StorageResult<WebHook>;
    async fn store(&self, hook: &WebHook) -> StorageResult<()>;
    async fn delete(&self, id: &str) -> StorageResult<()>;
    async fn get_for_canary(&self, canary_id: &str) -> StorageResult<Vec<WebHook>>;
    async fn delete_for_canary(&self, canary_id: &str) -> StorageResult<()>;
}

/// A storage backend exposing one store per entity kind.
pub trait StorageDriver: Send + Sync {
    fn name(&self) -> &'static str;
    fn canaries(&self) -> &dyn CanaryStore;
    fn hooks(&self) -> &dyn HookStore;
}

/// Build the driver registered under `name`.
pub fn build_storage(name: &str) -> StorageResult<Arc<dyn StorageDriver>> {
    match name {
        memory::DRIVER_NAME => Ok(Arc::new(MemoryStorage::new())),
        other => Err(StorageError::UnknownDriver(other.to_owned())),
    }
}
