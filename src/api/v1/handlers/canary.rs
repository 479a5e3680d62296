/*
 * Responsibility
 * - /v1/canary/{canary_id}
 *   - GET: the canary, HEAD: 204
 *   - POST: refresh (rotates `next`), 303 back to the canary
 *   - DELETE: kill, notify hooks subscribed to `dead`, 303
 */
use axum::body::Body;
use axum::http::{Method, StatusCode};

use crate::api::v1::errors::CANARY_UNKNOWN;
use crate::context::Context;
use crate::middleware::dispatch::unsupported;
use crate::models::Event;
use crate::services::webhook::{Notification, notify_in_background};
use crate::state::AppState;

use super::{canary_location, internal, method, set_location, write_json, write_status};

pub async fn dispatch(state: AppState, ctx: Context, _body: Body) -> Context {
    match method(&ctx) {
        Method::GET => get_canary(ctx),
        Method::HEAD => write_status(ctx, StatusCode::NO_CONTENT),
        Method::POST => refresh_canary(&state, ctx).await,
        Method::DELETE => kill_canary(&state, ctx).await,
        _ => unsupported(ctx),
    }
}

fn get_canary(ctx: Context) -> Context {
    match ctx.canary() {
        Some(canary) => write_json(ctx, StatusCode::OK, &canary),
        None => ctx.append_error(CANARY_UNKNOWN),
    }
}

async fn refresh_canary(state: &AppState, ctx: Context) -> Context {
    let Some(mut canary) = ctx.canary() else {
        return ctx.append_error(CANARY_UNKNOWN);
    };

    canary.refresh();
    if let Err(err) = state.storage.canaries().store(&canary).await {
        return internal(ctx, "storing refreshed canary", err);
    }

    ctx.logger().info("canary refreshed");
    set_location(&ctx, &canary_location(&canary.id));
    write_status(ctx, StatusCode::SEE_OTHER)
}

async fn kill_canary(state: &AppState, ctx: Context) -> Context {
    let Some(canary) = ctx.canary() else {
        return ctx.append_error(CANARY_UNKNOWN);
    };

    let mut dead = canary.clone();
    dead.kill();
    if let Err(err) = state.storage.canaries().store(&dead).await {
        return internal(ctx, "storing killed canary", err);
    }
    ctx.logger().warn("canary killed");

    match state.storage.hooks().get_for_canary(&canary.id).await {
        Ok(hooks) => {
            let sent = notify_in_background(
                state.notifier.clone(),
                hooks,
                Notification::new(Event::Dead, canary.clone()),
                ctx.logger(),
            );
            ctx.logger().with_field("webhook.count", sent).debug("dead notifications queued");
        }
        Err(err) => ctx
            .logger()
            .error(format!("loading hooks for notification: {err}")),
    }

    set_location(&ctx, &canary_location(&canary.id));
    write_status(ctx, StatusCode::SEE_OTHER)
}
