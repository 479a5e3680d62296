//! Per-request pipeline for the v1 API.
//!
//! Responsibility:
//! - Build the request context (request, response, vars, logger, errors)
//! - Authorize through the configured strategy
//! - Resolve the canary and webhook a route is scoped to
//! - Run the route's handler unless an error is already recorded
//! - Serve accumulated errors (status only for HEAD) and log the outcome
//!
//! Request-time failures never escape as Rust errors: each one ends up in the
//! context's error list and is served as the JSON error envelope.
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use axum::body::Body;
use axum::extract::Request;
use axum::http::Method;
use axum::response::Response;

use crate::api::v1::errors::{CANARY_DEAD, CANARY_UNKNOWN, WEBHOOK_UNKNOWN};
use crate::context::entities::{CANARY_ID_KEY, HOOK_ID_KEY, USER_NAME_KEY};
use crate::context::{Context, RequestInfo, ResponseHandle};
use crate::errcode::{self, Error, Errors};
use crate::middleware::auth::access::authorize;
use crate::state::AppState;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Context> + Send>>;

/// Route handler: receives the fully-resolved context and returns it with
/// any errors appended.
///
/// Implemented for every `async fn(AppState, Context, Body) -> Context`.
pub trait Handler: Send + Sync {
    fn call(&self, state: AppState, ctx: Context, body: Body) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(AppState, Context, Body) -> Fut + Send + Sync,
    Fut: Future<Output = Context> + Send + 'static,
{
    fn call(&self, state: AppState, ctx: Context, body: Body) -> HandlerFuture {
        Box::pin(self(state, ctx, body))
    }
}

/// A dispatched route and the resources it is scoped to.
pub struct Route {
    pub name: &'static str,
    /// Resolve `{canary_id}` before the handler runs.
    pub canary: bool,
    /// Resolve `{hook_id}` on the loaded canary.
    pub hook: bool,
    pub handler: &'static dyn Handler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("canary", &self.canary)
            .field("hook", &self.hook)
            .finish_non_exhaustive()
    }
}

/// Run `req` through the pipeline for `route`.
pub async fn serve(
    state: AppState,
    route: &'static Route,
    vars: HashMap<String, String>,
    req: Request,
) -> Response {
    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let w = ResponseHandle::buffered();

    let ctx = match state.base.with_request(RequestInfo::from_parts(&parts)) {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::error!(error = %err, route = route.name, "unable to build request context");
            errcode::serve_errors(&w, &method, &errcode::UNKNOWN.into());
            return w.take_response();
        }
    };
    let ctx = ctx
        .with_response(w.clone())
        .with_vars(vars)
        .with_errors(Errors::new());
    let ctx = ctx.with_logger(ctx.request_logger().with_field("route", route.name));

    let ctx = run(&state, route, ctx, body).await;
    finish(&ctx, &w, &method);
    w.take_response()
}

async fn run(state: &AppState, route: &'static Route, ctx: Context, body: Body) -> Context {
    let ctx = match authorize(state.auth.as_deref(), &ctx, route.canary).await {
        Ok(ctx) => ctx,
        Err(err) => return ctx.append_error(err),
    };
    let ctx = ctx.with_logger(ctx.logger_with_keys(&[USER_NAME_KEY]));

    let ctx = if route.canary {
        match load_canary(state, &ctx).await {
            Ok(ctx) => ctx,
            Err(err) => return ctx.append_error(err),
        }
    } else {
        ctx
    };

    let ctx = if route.hook {
        match load_hook(state, &ctx).await {
            Ok(ctx) => ctx,
            Err(err) => return ctx.append_error(err),
        }
    } else {
        ctx
    };

    route.handler.call(state.clone(), ctx, body).await
}

/// Resolve `{canary_id}`. A zombie is killed and stored here; its hooks are
/// not notified on this path.
async fn load_canary(state: &AppState, ctx: &Context) -> Result<Context, Error> {
    let id = ctx.var("canary_id").ok_or(CANARY_UNKNOWN)?;
    let canaries = state.storage.canaries();

    let mut canary = match canaries.get(&id).await {
        Ok(canary) => canary,
        Err(err) if err.is_not_found() => return Err(CANARY_UNKNOWN.into()),
        Err(err) => {
            ctx.logger().error(format!("loading canary {id}: {err}"));
            return Err(errcode::UNKNOWN.into());
        }
    };

    if canary.is_dead() {
        return Err(CANARY_DEAD.into());
    }
    if canary.is_zombie() {
        canary.kill();
        if let Err(err) = canaries.store(&canary).await {
            ctx.logger().error(format!("storing dead canary {id}: {err}"));
            return Err(errcode::UNKNOWN.into());
        }
        ctx.logger_with_field(CANARY_ID_KEY, &id)
            .info("canary missed its deadline");
        return Err(CANARY_DEAD.into());
    }

    let logger = ctx.logger_with_field(CANARY_ID_KEY, &canary.id);
    Ok(ctx.with_canary(canary).with_logger(logger))
}

/// Resolve `{hook_id}` within the loaded canary.
async fn load_hook(state: &AppState, ctx: &Context) -> Result<Context, Error> {
    let id = ctx.var("hook_id").ok_or(WEBHOOK_UNKNOWN)?;
    let canary = ctx.canary().ok_or(CANARY_UNKNOWN)?;

    let hook = match state.storage.hooks().get(&id).await {
        Ok(hook) if hook.canary_id == canary.id => hook,
        Ok(_) => return Err(WEBHOOK_UNKNOWN.into()),
        Err(err) if err.is_not_found() => return Err(WEBHOOK_UNKNOWN.into()),
        Err(err) => {
            ctx.logger().error(format!("loading webhook {id}: {err}"));
            return Err(errcode::UNKNOWN.into());
        }
    };

    let logger = ctx.logger_with_field(HOOK_ID_KEY, &hook.id);
    Ok(ctx.with_hook(hook).with_logger(logger))
}

fn finish(ctx: &Context, w: &ResponseHandle, method: &Method) {
    let errors = ctx.errors();
    if errors.is_empty() {
        ctx.response_logger().info("response completed");
        return;
    }

    errcode::serve_errors(w, method, &errors);
    for err in errors.iter() {
        let mut logger = ctx
            .response_logger()
            .with_field("err.code", err.code)
            .with_field("err.message", err.message());
        if let Some(detail) = &err.detail {
            logger = logger.with_field("err.detail", detail);
        }
        if err.code.status().is_server_error() {
            logger.error("response completed with error");
        } else {
            logger.info("response completed with error");
        }
    }
}

/// Append UNSUPPORTED for a method the route does not handle.
pub fn unsupported(ctx: Context) -> Context {
    ctx.append_error(errcode::UNSUPPORTED)
}
