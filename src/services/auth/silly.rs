//! Development-only strategy.
//!
//! Any non-empty `Authorization` header is accepted and the caller is
//! authenticated as `silly`. Nothing is verified. Never enable this outside
//! local testing.
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;

use crate::context::Context;
use crate::services::auth::factory::{required, Parameters, StrategyError};
use crate::services::auth::{quote, Access, AuthError, AuthStrategy, Challenge, UserInfo};

const USER_NAME: &str = "silly";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SillyOptions {
    pub realm: String,
    pub service: String,
}

impl SillyOptions {
    pub fn from_parameters(params: &Parameters) -> Result<Self, StrategyError> {
        Ok(Self {
            realm: required(params, SillyStrategy::NAME, "realm")?,
            service: required(params, SillyStrategy::NAME, "service")?,
        })
    }
}

#[derive(Debug)]
pub struct SillyStrategy {
    options: SillyOptions,
}

impl SillyStrategy {
    pub const NAME: &'static str = "silly";

    pub fn new(options: SillyOptions) -> Self {
        Self { options }
    }

    pub fn from_parameters(params: &Parameters) -> Result<Arc<dyn AuthStrategy>, StrategyError> {
        Ok(Arc::new(Self::new(SillyOptions::from_parameters(params)?)))
    }
}

#[async_trait]
impl AuthStrategy for SillyStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn authorized(&self, ctx: &Context, access: &[Access]) -> Result<Context, AuthError> {
        let req = ctx.request().ok_or(AuthError::MissingRequest)?;

        let present = req
            .info
            .header(AUTHORIZATION.as_str())
            .is_some_and(|v| !v.is_empty());
        if !present {
            return Err(AuthError::challenge(SillyChallenge {
                realm: self.options.realm.clone(),
                service: self.options.service.clone(),
                scope: access.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "),
            }));
        }

        Ok(ctx.with_user(UserInfo::new(USER_NAME)))
    }
}

#[derive(Debug, Clone)]
pub struct SillyChallenge {
    realm: String,
    service: String,
    scope: String,
}

impl fmt::Display for SillyChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "silly authentication challenge: {}", self.header_value())
    }
}

impl Challenge for SillyChallenge {
    fn header_value(&self) -> String {
        let mut header = format!(
            "Bearer realm={},service={}",
            quote(&self.realm),
            quote(&self.service)
        );
        if !self.scope.is_empty() {
            header.push_str(",scope=");
            header.push_str(&quote(&self.scope));
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestInfo;
    use crate::services::auth::Resource;
    use axum::body::Body;
    use axum::http::Request;

    fn strategy() -> SillyStrategy {
        SillyStrategy::new(SillyOptions {
            realm: "test-realm".into(),
            service: "test-service".into(),
        })
    }

    fn ctx(auth: Option<&str>) -> Context {
        let mut builder = Request::builder().uri("/v1/canary/abc");
        if let Some(v) = auth {
            builder = builder.header(AUTHORIZATION, v);
        }
        let (parts, _) = builder.body(Body::empty()).unwrap().into_parts();
        Context::background()
            .with_request(RequestInfo::from_parts(&parts))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_header_is_challenged_with_scope() {
        let access = [
            Access::new(Resource::new("canary", "abc"), "read"),
            Access::new(Resource::new("canary", "abc"), "write"),
        ];
        let err = strategy().authorized(&ctx(None), &access).await.unwrap_err();

        let challenge = err.as_challenge().unwrap();
        assert_eq!(
            challenge.header_value(),
            r#"Bearer realm="test-realm",service="test-service",scope="canary:abc:read canary:abc:write""#
        );
    }

    #[tokio::test]
    async fn any_header_authenticates() {
        let ctx = strategy()
            .authorized(&ctx(Some("Bearer whatever")), &[])
            .await
            .unwrap();
        assert_eq!(ctx.user(), Some(UserInfo::new("silly")));
    }
}
