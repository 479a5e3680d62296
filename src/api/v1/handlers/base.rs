/*
 * Responsibility
 * - GET /v1/ : API version check, answers `{}`
 */
use axum::body::Body;
use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::context::Context;
use crate::middleware::dispatch::unsupported;
use crate::state::AppState;

use super::{method, write_json};

pub async fn dispatch(_state: AppState, ctx: Context, _body: Body) -> Context {
    match method(&ctx) {
        Method::GET => write_json(ctx, StatusCode::OK, &json!({})),
        _ => unsupported(ctx),
    }
}
