//! Access records for a request, and the authorization step of the dispatcher.
//!
//! Responsibility:
//! - Derive the requested `Access` list from the HTTP method and the route's canary id
//! - Ask the configured `AuthStrategy`
//! - Turn a failure into a served error: challenges first write `WWW-Authenticate`
use axum::http::Method;

use crate::context::Context;
use crate::errcode::{self, Error};
use crate::services::auth::{Access, AuthStrategy, Resource};

pub const CANARY_RESOURCE: &str = "canary";

/// Actions needed to perform `method` on a resource.
pub fn actions_for(method: &Method) -> &'static [&'static str] {
    match *method {
        Method::GET | Method::HEAD => &["read"],
        Method::POST | Method::PUT | Method::PATCH => &["read", "write"],
        Method::DELETE => &["kill", "write"],
        _ => &["read"],
    }
}

/// `canary:<id>:<action>` records for `method`.
pub fn access_records(method: &Method, canary_id: &str) -> Vec<Access> {
    actions_for(method)
        .iter()
        .map(|action| Access::new(Resource::new(CANARY_RESOURCE, canary_id), *action))
        .collect()
}

/// Authorize the request held by `ctx`.
///
/// With no strategy every request passes. A route scoped to a canary must
/// carry its id, otherwise the request is refused before the strategy runs.
pub async fn authorize(
    strategy: Option<&dyn AuthStrategy>,
    ctx: &Context,
    requires_canary: bool,
) -> Result<Context, Error> {
    let Some(strategy) = strategy else {
        return Ok(ctx.clone());
    };

    let records = match ctx.var("canary_id") {
        Some(id) => {
            let method = ctx
                .request()
                .map(|r| r.info.method.clone())
                .unwrap_or(Method::GET);
            access_records(&method, &id)
        }
        None if requires_canary => {
            return Err(errcode::UNAUTHORIZED.with_message("no resource id for a resource route"));
        }
        None => Vec::new(),
    };

    match strategy.authorized(ctx, &records).await {
        Ok(ctx) => Ok(ctx),
        Err(err) => match err.as_challenge() {
            Some(challenge) => {
                if let Some(w) = ctx.response() {
                    challenge.set_headers(&w);
                }
                ctx.logger()
                    .with_field("auth.strategy", strategy.name())
                    .debug(format!("authorization challenged: {challenge}"));
                Err(errcode::UNAUTHORIZED.with_detail(&records))
            }
            None => {
                ctx.logger()
                    .with_field("auth.strategy", strategy.name())
                    .error(format!("authorization failed: {err}"));
                Err(errcode::UNKNOWN.into())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::body::Body;
    use axum::http::{Request, header};

    use crate::context::{RequestInfo, ResponseHandle};
    use crate::services::auth::silly::{SillyOptions, SillyStrategy};

    fn context(method: Method, vars: &[(&str, &str)], auth: Option<&str>) -> (Context, ResponseHandle) {
        let mut builder = Request::builder().method(method).uri("/v1/canary/abc");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let (parts, _) = builder.body(Body::empty()).unwrap().into_parts();
        let w = ResponseHandle::buffered();
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let ctx = Context::background()
            .with_request(RequestInfo::from_parts(&parts))
            .unwrap()
            .with_response(w.clone())
            .with_vars(vars);
        (ctx, w)
    }

    fn silly() -> SillyStrategy {
        SillyStrategy::new(SillyOptions {
            realm: "test-realm".into(),
            service: "test-service".into(),
        })
    }

    #[test]
    fn method_maps_to_actions() {
        let scope: Vec<String> = access_records(&Method::DELETE, "abc")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(scope, ["canary:abc:kill", "canary:abc:write"]);
        assert_eq!(actions_for(&Method::HEAD), ["read"]);
        assert_eq!(actions_for(&Method::PATCH), ["read", "write"]);
    }

    #[tokio::test]
    async fn no_strategy_passes() {
        let (ctx, _) = context(Method::GET, &[], None);
        assert!(authorize(None, &ctx, true).await.is_ok());
    }

    #[tokio::test]
    async fn resource_route_without_id_is_refused() {
        let (ctx, w) = context(Method::GET, &[], Some("Bearer x"));
        let strategy = silly();

        let err = authorize(Some(&strategy), &ctx, true).await.unwrap_err();
        assert_eq!(err.code, errcode::UNAUTHORIZED);
        assert!(w.take_response().headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn challenge_sets_header_and_details_records() {
        let (ctx, w) = context(Method::POST, &[("canary_id", "abc")], None);
        let strategy = silly();

        let err = authorize(Some(&strategy), &ctx, true).await.unwrap_err();
        assert_eq!(err.code, errcode::UNAUTHORIZED);
        assert_eq!(
            err.detail,
            Some(serde_json::json!([
                {"type": "canary", "name": "abc", "action": "read"},
                {"type": "canary", "name": "abc", "action": "write"},
            ]))
        );

        let res = w.take_response();
        let challenge = res.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
        assert_eq!(
            challenge,
            r#"Bearer realm="test-realm",service="test-service",scope="canary:abc:read canary:abc:write""#
        );
    }

    #[tokio::test]
    async fn success_carries_user() {
        let (ctx, _) = context(Method::GET, &[("canary_id", "abc")], Some("Bearer x"));
        let strategy = silly();

        let ctx = authorize(Some(&strategy), &ctx, true).await.unwrap();
        assert_eq!(ctx.user().map(|u| u.name), Some("silly".to_string()));
    }
}
