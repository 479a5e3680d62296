/*
 * Responsibility
 * - GET / (liveness probe)
 * - Outside the dispatcher: no auth, no context, never cached
 */
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;

pub async fn alive() -> impl IntoResponse {
    (StatusCode::OK, [(header::CACHE_CONTROL, "no-cache")])
}
