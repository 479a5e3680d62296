/// Factory: named registry of strategy constructors, and the entry point that
/// builds the configured strategy from application `Config`.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::config::AuthConfig;
use crate::services::auth::htpasswd::{HtpasswdError, HtpasswdStrategy};
use crate::services::auth::silly::SillyStrategy;
use crate::services::auth::token::{TokenStrategy, TrustError};
use crate::services::auth::AuthStrategy;

/// Raw strategy options as read from configuration.
pub type Parameters = HashMap<String, String>;

pub type StrategyFactory = fn(&Parameters) -> Result<Arc<dyn AuthStrategy>, StrategyError>;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("auth strategy {0:?} is already registered")]
    Duplicate(String),
    #[error("no auth strategy registered as {0:?}")]
    Unknown(String),
    #[error("{strategy} auth requires a valid option string: {option}")]
    MissingOption {
        strategy: &'static str,
        option: &'static str,
    },
    #[error(transparent)]
    Htpasswd(#[from] HtpasswdError),
    #[error(transparent)]
    Trust(#[from] TrustError),
}

/// Read a required, non-empty option.
pub(crate) fn required(
    params: &Parameters,
    strategy: &'static str,
    option: &'static str,
) -> Result<String, StrategyError> {
    params
        .get(option)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(StrategyError::MissingOption { strategy, option })
}

/// Strategy constructors keyed by name.
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the `silly`, `htpasswd` and `token` strategies.
    pub fn builtin() -> Result<Self, StrategyError> {
        let mut registry = Self::new();
        registry.register(SillyStrategy::NAME, SillyStrategy::from_parameters)?;
        registry.register(HtpasswdStrategy::NAME, HtpasswdStrategy::from_parameters)?;
        registry.register(TokenStrategy::NAME, TokenStrategy::from_parameters)?;
        Ok(registry)
    }

    pub fn register(&mut self, name: &str, factory: StrategyFactory) -> Result<(), StrategyError> {
        if self.factories.contains_key(name) {
            return Err(StrategyError::Duplicate(name.to_owned()));
        }
        self.factories.insert(name.to_owned(), factory);
        Ok(())
    }

    pub fn build(
        &self,
        name: &str,
        params: &Parameters,
    ) -> Result<Arc<dyn AuthStrategy>, StrategyError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| StrategyError::Unknown(name.to_owned()))?;
        factory(params)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

static STRATEGIES: OnceLock<StrategyRegistry> = OnceLock::new();

/// Process-wide registry of the builtin strategies, built on first use.
pub fn strategies() -> Result<&'static StrategyRegistry, StrategyError> {
    if let Some(installed) = STRATEGIES.get() {
        return Ok(installed);
    }
    let registry = StrategyRegistry::builtin()?;
    Ok(STRATEGIES.get_or_init(|| registry))
}

/// Build the configured strategy, or `None` when authentication is disabled.
pub fn build_auth_strategy(
    config: &AuthConfig,
) -> Result<Option<Arc<dyn AuthStrategy>>, StrategyError> {
    let Some(name) = config.strategy.as_deref() else {
        return Ok(None);
    };

    let strategy = strategies()?.build(name, &config.parameters)?;
    tracing::info!(strategy = strategy.name(), "auth strategy configured");
    Ok(Some(strategy))
}
