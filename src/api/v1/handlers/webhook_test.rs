/*
 * Responsibility
 * - GET /v1/canary/{canary_id}/hooks/{hook_id}/ping
 *   - Deliver a `ping` notification and wait for it
 *   - 204 when delivered, WEBHOOK_FAILED (202) otherwise
 */
use axum::body::Body;
use axum::http::{Method, StatusCode};

use crate::api::v1::errors::{CANARY_UNKNOWN, WEBHOOK_FAILED, WEBHOOK_UNKNOWN};
use crate::context::Context;
use crate::middleware::dispatch::unsupported;
use crate::models::Event;
use crate::services::webhook::Notification;
use crate::state::AppState;

use super::{method, write_status};

pub async fn dispatch(state: AppState, ctx: Context, _body: Body) -> Context {
    match method(&ctx) {
        Method::GET => ping_hook(&state, ctx).await,
        _ => unsupported(ctx),
    }
}

async fn ping_hook(state: &AppState, ctx: Context) -> Context {
    let (Some(canary), Some(hook)) = (ctx.canary(), ctx.hook()) else {
        let code = if ctx.canary().is_none() { CANARY_UNKNOWN } else { WEBHOOK_UNKNOWN };
        return ctx.append_error(code);
    };

    ctx.logger().with_field("webhook.url", &hook.url).info("pinging webhook");
    let notification = Notification::new(Event::Ping, canary);
    match state.notifier.notify(&hook, &notification).await {
        Ok(()) => write_status(ctx, StatusCode::NO_CONTENT),
        Err(err) => {
            ctx.logger().warn(format!("webhook ping failed: {err}"));
            ctx.append_error(WEBHOOK_FAILED.with_detail(err.to_string()))
        }
    }
}
