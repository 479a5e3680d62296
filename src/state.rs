/*
 * Responsibility
 * - Process-level collaborators shared by every request (AppState)
 *   - storage driver, auth strategy, webhook notifier, root context
 * - Clone is cheap (Arc inside)
 */
use std::sync::Arc;

use crate::context::Context;
use crate::repos::StorageDriver;
use crate::services::auth::AuthStrategy;
use crate::services::webhook::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageDriver>,
    /// `None` disables authorization.
    pub auth: Option<Arc<dyn AuthStrategy>>,
    pub notifier: Arc<dyn Notifier>,
    /// Root of every request context: version and static log fields.
    pub base: Context,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn StorageDriver>,
        auth: Option<Arc<dyn AuthStrategy>>,
        notifier: Arc<dyn Notifier>,
        base: Context,
    ) -> Self {
        Self {
            storage,
            auth,
            notifier,
            base,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage.name())
            .field("auth", &self.auth.as_ref().map(|a| a.name()))
            .field("base", &self.base)
            .finish()
    }
}
