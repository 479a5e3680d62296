/*
 * Responsibility
 * - v1 URL structure and the resources each route is scoped to
 * - Every method reaches the dispatcher; handlers answer UNSUPPORTED themselves
 */
use std::collections::HashMap;

use axum::Router;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request, State};
use axum::routing::any;

use crate::api::v1::handlers::{base, canaries, canary, webhook, webhook_test, webhooks};
use crate::middleware::dispatch::{self, Route};
use crate::state::AppState;

pub static BASE: Route = Route {
    name: "base",
    canary: false,
    hook: false,
    handler: &base::dispatch,
};

pub static CANARIES: Route = Route {
    name: "canaries",
    canary: false,
    hook: false,
    handler: &canaries::dispatch,
};

pub static CANARY: Route = Route {
    name: "canary",
    canary: true,
    hook: false,
    handler: &canary::dispatch,
};

pub static WEBHOOKS: Route = Route {
    name: "webhooks",
    canary: true,
    hook: false,
    handler: &webhooks::dispatch,
};

pub static WEBHOOK: Route = Route {
    name: "webhook",
    canary: true,
    hook: true,
    handler: &webhook::dispatch,
};

pub static WEBHOOK_TEST: Route = Route {
    name: "webhook-test",
    canary: true,
    hook: true,
    handler: &webhook_test::dispatch,
};

pub static ROUTES: [(&str, &Route); 7] = [
    ("/v1", &BASE),
    ("/v1/", &BASE),
    ("/v1/canaries", &CANARIES),
    ("/v1/canary/{canary_id}", &CANARY),
    ("/v1/canary/{canary_id}/hooks", &WEBHOOKS),
    ("/v1/canary/{canary_id}/hooks/{hook_id}", &WEBHOOK),
    ("/v1/canary/{canary_id}/hooks/{hook_id}/ping", &WEBHOOK_TEST),
];

pub fn routes() -> Router<AppState> {
    ROUTES.iter().fold(Router::new(), |router, &(path, route)| {
        router.route(
            path,
            any(
                move |State(state): State<AppState>,
                      vars: Result<Path<HashMap<String, String>>, PathRejection>,
                      req: Request| async move {
                    let vars = vars.map(|Path(vars)| vars).unwrap_or_default();
                    dispatch::serve(state, route, vars, req).await
                },
            ),
        )
    })
}
