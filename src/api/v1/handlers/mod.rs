/*
 * Responsibility
 * - v1 handlers, one module per route
 * - Shared helpers: method, JSON bodies in and out, Location, storage failures
 *
 * Handlers run after the dispatcher resolved auth, canary and hook. They report
 * failures by appending to the context's errors and never write error bodies.
 */
pub mod alive;
pub mod base;
pub mod canaries;
pub mod canary;
pub mod webhook;
pub mod webhook_test;
pub mod webhooks;

use std::fmt;

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderValue, Method, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::errcode::{self, Error, ErrorCode, JSON_CONTENT_TYPE};
use crate::middleware::http::BODY_LIMIT;

pub(crate) fn method(ctx: &Context) -> Method {
    ctx.request()
        .map(|r| r.info.method.clone())
        .unwrap_or(Method::GET)
}

/// Decode a JSON request body; failures are reported as `code`.
pub(crate) async fn read_json<T: DeserializeOwned>(body: Body, code: ErrorCode) -> Result<T, Error> {
    let bytes = to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|err| code.with_detail(err.to_string()))?;
    let Json(value) =
        Json::<T>::from_bytes(&bytes).map_err(|err| code.with_detail(err.body_text()))?;
    Ok(value)
}

pub(crate) fn write_json<T: Serialize>(ctx: Context, status: StatusCode, value: &T) -> Context {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(err) => {
            ctx.logger().error(format!("error encoding response json: {err}"));
            return ctx.append_error(errcode::UNKNOWN);
        }
    };
    if let Some(w) = ctx.response() {
        w.set_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        w.write_header(status);
        w.write(&body);
    }
    ctx
}

pub(crate) fn write_status(ctx: Context, status: StatusCode) -> Context {
    if let Some(w) = ctx.response() {
        w.write_header(status);
    }
    ctx
}

pub(crate) fn set_location(ctx: &Context, path: &str) {
    if let (Some(w), Ok(value)) = (ctx.response(), HeaderValue::from_str(path)) {
        w.set_header(header::LOCATION, value);
    }
}

/// Log a storage failure and record UNKNOWN.
pub(crate) fn internal(ctx: Context, action: &str, err: impl fmt::Display) -> Context {
    ctx.logger().error(format!("{action}: {err}"));
    ctx.append_error(errcode::UNKNOWN)
}

pub(crate) fn canary_location(id: &str) -> String {
    format!("/v1/canary/{id}")
}

pub(crate) fn hook_location(canary_id: &str, hook_id: &str) -> String {
    format!("/v1/canary/{canary_id}/hooks/{hook_id}")
}
