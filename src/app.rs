/*
 * Responsibility
 * - Config load -> tracing / panic hook -> error codes + state -> Router
 * - Router-level layers (headers, request id, trace, timeout, panic recovery)
 * - axum::serve() with peer addresses, graceful shutdown on Ctrl-C
 */
use std::net::SocketAddr;
use std::panic;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::routing::get;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::alive::alive;
use crate::config::{Config, LogConfig, LogFormat};
use crate::context::Context;
use crate::errcode::{self, ErrorRegistry, RegistryError};
use crate::error::AppError;
use crate::middleware;
use crate::repos::build_storage;
use crate::services::auth::build_auth_strategy;
use crate::services::webhook::HttpNotifier;
use crate::state::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(log: &LogConfig) -> Result<(), AppError> {
    // RUST_LOG wins over CANARIA_LOG_LEVEL.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log.level))
        .map_err(|e| AppError::Logging(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .map_err(|e| AppError::Logging(e.to_string()))
}

fn init_panic_hook() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched.
        tracing::error!(?info, "panic");
        default_hook(info);
    }))
}

/// Install the process error registry: generic codes plus the v1 API group.
pub fn init_error_codes() -> Result<&'static ErrorRegistry, RegistryError> {
    errcode::init(&[&errcode::GENERIC, &api::v1::errors::API_V1])
}

/// Root context: service version plus the static log fields.
pub fn base_context(fields: &[(String, String)]) -> Context {
    let ctx = Context::background().with_version(VERSION);
    let logger = fields
        .iter()
        .fold(ctx.logger(), |logger, (k, v)| logger.with_field(k.clone(), v));
    ctx.with_logger(logger)
}

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log)?;
    init_panic_hook();

    tracing::info!(
        version = VERSION,
        storage = %config.storage,
        "starting canaria in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("canaria stopped");
    Ok(())
}

/// Build process-level services and inject them into the shared state.
/// The error registry is installed first, so any router built from the state
/// serves registered statuses. A misconfigured strategy or storage driver
/// stops startup here.
pub fn build_state(config: &Config) -> Result<AppState, AppError> {
    init_error_codes()?;
    let storage = build_storage(&config.storage)?;
    let auth = build_auth_strategy(&config.auth)?;
    if auth.is_none() {
        tracing::warn!("no auth strategy configured; every request is authorized");
    }
    let notifier = Arc::new(HttpNotifier::new(config.webhook_timeout)?);

    Ok(AppState::new(
        storage,
        auth,
        notifier,
        base_context(&config.log.fields),
    ))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/", get(alive))
        .merge(api::v1::routes())
        .with_state(state);

    let router = middleware::headers::apply(router, VERSION, &config.http_headers);
    middleware::http::apply(router, config.request_timeout)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
