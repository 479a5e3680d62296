//! In-memory storage driver. Data lives as long as the process.
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::models::{Canary, WebHook};

use super::{CanaryStore, HookStore, StorageDriver, StorageError, StorageResult};

pub const DRIVER_NAME: &str = "memory";

#[derive(Debug, Default)]
pub struct MemoryStorage {
    canaries: MemoryCanaries,
    hooks: MemoryHooks,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageDriver for MemoryStorage {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn canaries(&self) -> &dyn CanaryStore {
        &self.canaries
    }

    fn hooks(&self) -> &dyn HookStore {
        &self.hooks
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct MemoryCanaries {
    items: Mutex<HashMap<String, Canary>>,
}

#[async_trait]
impl CanaryStore for MemoryCanaries {
    async fn get(&self, id: &str) -> StorageResult<Canary> {
        lock(&self.items)
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("canary", id))
    }

    async fn store(&self, canary: &Canary) -> StorageResult<()> {
        lock(&self.items).insert(canary.id.clone(), canary.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        lock(&self.items)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("canary", id))
    }
}

#[derive(Debug, Default)]
struct MemoryHooks {
    items: Mutex<HashMap<String, WebHook>>,
}

#[async_trait]
impl HookStore for MemoryHooks {
    async fn get(&self, id: &str) -> StorageResult<WebHook> {
        lock(&self.items)
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("webhook", id))
    }

    async fn store(&self, hook: &WebHook) -> StorageResult<()> {
        lock(&self.items).insert(hook.id.clone(), hook.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        lock(&self.items)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("webhook", id))
    }

    async fn get_for_canary(&self, canary_id: &str) -> StorageResult<Vec<WebHook>> {
        let mut hooks: Vec<_> = lock(&self.items)
            .values()
            .filter(|h| h.canary_id == canary_id)
            .cloned()
            .collect();
        hooks.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(hooks)
    }

    async fn delete_for_canary(&self, canary_id: &str) -> StorageResult<()> {
        lock(&self.items).retain(|_, h| h.canary_id != canary_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canary_round_trip_and_not_found() {
        let storage = MemoryStorage::new();
        let canary = Canary::new(30, "t".into(), String::new(), Vec::new());
        storage.canaries().store(&canary).await.unwrap();

        assert_eq!(storage.canaries().get(&canary.id).await.unwrap(), canary);
        storage.canaries().delete(&canary.id).await.unwrap();
        assert!(storage.canaries().get(&canary.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn hooks_are_scoped_by_canary() {
        let storage = MemoryStorage::new();
        let a = WebHook::new("canary-a", "http://localhost/a");
        let b = WebHook::new("canary-b", "http://localhost/b");
        storage.hooks().store(&a).await.unwrap();
        storage.hooks().store(&b).await.unwrap();

        let for_a = storage.hooks().get_for_canary("canary-a").await.unwrap();
        assert_eq!(for_a, vec![a]);

        storage.hooks().delete_for_canary("canary-b").await.unwrap();
        assert!(storage.hooks().get(&b.id).await.is_err());
    }

    #[test]
    fn unknown_driver_is_rejected() {
        assert!(matches!(
            super::super::build_storage("postgres"),
            Err(StorageError::UnknownDriver(_))
        ));
        assert!(super::super::build_storage(DRIVER_NAME).is_ok());
    }
}
