/*
 * Responsibility
 * - /v1/canary/{canary_id}/hooks
 *   - PUT: register a hook, 201 + Location + the hook (without secret)
 *   - GET: every hook of the canary
 */
use axum::body::Body;
use axum::http::{Method, StatusCode};

use crate::api::v1::dto::webhooks::{CreateWebHookRequest, WebHookResponse};
use crate::api::v1::errors::{CANARY_UNKNOWN, WEBHOOK_INVALID};
use crate::context::Context;
use crate::context::entities::HOOK_ID_KEY;
use crate::middleware::dispatch::unsupported;
use crate::state::AppState;

use super::{hook_location, internal, method, read_json, set_location, write_json};

pub async fn dispatch(state: AppState, ctx: Context, body: Body) -> Context {
    match method(&ctx) {
        Method::PUT => create_hook(&state, ctx, body).await,
        Method::GET => list_hooks(&state, ctx).await,
        _ => unsupported(ctx),
    }
}

async fn create_hook(state: &AppState, ctx: Context, body: Body) -> Context {
    let Some(canary) = ctx.canary() else {
        return ctx.append_error(CANARY_UNKNOWN);
    };
    let req: CreateWebHookRequest = match read_json(body, WEBHOOK_INVALID).await {
        Ok(req) => req,
        Err(err) => return ctx.append_error(err),
    };

    let hook = req.into_hook(&canary.id);
    if let Err(err) = hook.validate() {
        return ctx.append_error(WEBHOOK_INVALID.with_detail(err.to_string()));
    }
    if let Err(err) = state.storage.hooks().store(&hook).await {
        return internal(ctx, "storing webhook", err);
    }

    ctx.logger_with_field(HOOK_ID_KEY, &hook.id).info("webhook created");
    set_location(&ctx, &hook_location(&canary.id, &hook.id));
    write_json(ctx, StatusCode::CREATED, &WebHookResponse::from(hook))
}

async fn list_hooks(state: &AppState, ctx: Context) -> Context {
    let Some(canary) = ctx.canary() else {
        return ctx.append_error(CANARY_UNKNOWN);
    };

    match state.storage.hooks().get_for_canary(&canary.id).await {
        Ok(hooks) => {
            let hooks: Vec<WebHookResponse> = hooks.into_iter().map(Into::into).collect();
            write_json(ctx, StatusCode::OK, &hooks)
        }
        Err(err) => internal(ctx, "listing webhooks", err),
    }
}
