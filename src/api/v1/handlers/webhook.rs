/*
 * Responsibility
 * - /v1/canary/{canary_id}/hooks/{hook_id}
 *   - GET: the hook (without secret)
 *   - DELETE: remove it, 202
 */
use axum::body::Body;
use axum::http::{Method, StatusCode};

use crate::api::v1::dto::webhooks::WebHookResponse;
use crate::api::v1::errors::WEBHOOK_UNKNOWN;
use crate::context::Context;
use crate::middleware::dispatch::unsupported;
use crate::state::AppState;

use super::{internal, method, write_json, write_status};

pub async fn dispatch(state: AppState, ctx: Context, _body: Body) -> Context {
    match method(&ctx) {
        Method::GET => match ctx.hook() {
            Some(hook) => write_json(ctx, StatusCode::OK, &WebHookResponse::from(hook)),
            None => ctx.append_error(WEBHOOK_UNKNOWN),
        },
        Method::DELETE => remove_hook(&state, ctx).await,
        _ => unsupported(ctx),
    }
}

async fn remove_hook(state: &AppState, ctx: Context) -> Context {
    let Some(hook) = ctx.hook() else {
        return ctx.append_error(WEBHOOK_UNKNOWN);
    };

    if let Err(err) = state.storage.hooks().delete(&hook.id).await {
        return internal(ctx, "removing webhook", err);
    }

    ctx.logger().info("webhook removed");
    write_status(ctx, StatusCode::ACCEPTED)
}
