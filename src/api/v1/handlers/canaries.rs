/*
 * Responsibility
 * - PUT /v1/canaries : create a canary
 *   - 201 + Location + the stored canary
 *   - ttl <= 0 -> TTL_INVALID, undecodable or invalid body -> CANARY_INVALID
 */
use axum::body::Body;
use axum::http::{Method, StatusCode};

use crate::api::v1::dto::canaries::CreateCanaryRequest;
use crate::api::v1::errors::{CANARY_INVALID, TTL_INVALID};
use crate::context::Context;
use crate::context::entities::CANARY_ID_KEY;
use crate::middleware::dispatch::unsupported;
use crate::models::CanaryError;
use crate::state::AppState;

use super::{canary_location, internal, method, read_json, set_location, write_json};

pub async fn dispatch(state: AppState, ctx: Context, body: Body) -> Context {
    match method(&ctx) {
        Method::PUT => create_canary(&state, ctx, body).await,
        _ => unsupported(ctx),
    }
}

async fn create_canary(state: &AppState, ctx: Context, body: Body) -> Context {
    let req: CreateCanaryRequest = match read_json(body, CANARY_INVALID).await {
        Ok(req) => req,
        Err(err) => return ctx.append_error(err),
    };

    let canary = req.into_canary();
    if let Err(err) = canary.validate() {
        let code = match err {
            CanaryError::InvalidTtl => TTL_INVALID,
            CanaryError::TitleTooLong => CANARY_INVALID,
        };
        return ctx.append_error(code.with_detail(err.to_string()));
    }
    if let Err(err) = state.storage.canaries().store(&canary).await {
        return internal(ctx, "storing canary", err);
    }

    ctx.logger_with_field(CANARY_ID_KEY, &canary.id)
        .with_field("canary.ttl", canary.ttl)
        .info("canary created");
    set_location(&ctx, &canary_location(&canary.id));
    write_json(ctx, StatusCode::CREATED, &canary)
}
