//! Bearer token strategy.
//!
//! A request is authorized when it carries `Authorization: Bearer <jwt>` whose
//! - issuer and audience are the configured ones
//! - `nbf <= now <= exp`
//! - signing key resolves through the trust anchors (`x5c`, `jwk` or `kid`)
//! - signature verifies with that key
//! - `access` grants cover every requested access
//!
//! Every failure is a `BearerChallenge` telling the client which scope to ask for.
mod access_set;
mod claims;
mod keys;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use jsonwebtoken::{Algorithm, Validation};
use thiserror::Error;

use crate::context::Context;
use crate::services::auth::factory::{required, Parameters, StrategyError};
use crate::services::auth::{quote, Access, AuthError, AuthStrategy, Challenge, UserInfo};

pub use access_set::{AccessSet, ActionSet};
pub use claims::{Claims, JoseHeader, RawToken, ResourceActions};
pub use keys::{certificate_key_id, Curve, PublicKey, TrustAnchors, TrustError};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("authorization token required")]
    TokenRequired,
    #[error("malformed token")]
    MalformedToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("insufficient scope")]
    InsufficientScope,
}

impl TokenError {
    /// `error` challenge parameter. Only set for invalid tokens and scope failures.
    pub fn error_param(self) -> Option<&'static str> {
        match self {
            Self::InvalidToken => Some("invalid_token"),
            Self::InsufficientScope => Some("insufficient_scope"),
            Self::TokenRequired | Self::MalformedToken => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOptions {
    pub realm: String,
    pub service: String,
    pub issuers: Vec<String>,
    pub audiences: Vec<String>,
    pub root_cert_bundle: PathBuf,
}

impl TokenOptions {
    pub fn from_parameters(params: &Parameters) -> Result<Self, StrategyError> {
        let realm = required(params, TokenStrategy::NAME, "realm")?;
        let issuer = required(params, TokenStrategy::NAME, "issuer")?;
        let service = required(params, TokenStrategy::NAME, "service")?;
        let bundle = required(params, TokenStrategy::NAME, "rootcertbundle")?;

        Ok(Self {
            realm,
            audiences: vec![service.clone()],
            service,
            issuers: vec![issuer],
            root_cert_bundle: bundle.into(),
        })
    }
}

#[derive(Debug)]
pub struct TokenStrategy {
    realm: String,
    service: String,
    issuers: Vec<String>,
    audiences: Vec<String>,
    anchors: TrustAnchors,
}

impl TokenStrategy {
    pub const NAME: &'static str = "token";

    pub fn new(options: TokenOptions) -> Result<Self, TrustError> {
        let anchors = TrustAnchors::from_file(&options.root_cert_bundle)?;
        Ok(Self::with_anchors(options, anchors))
    }

    pub fn with_anchors(options: TokenOptions, anchors: TrustAnchors) -> Self {
        Self {
            realm: options.realm,
            service: options.service,
            issuers: options.issuers,
            audiences: options.audiences,
            anchors,
        }
    }

    pub fn from_parameters(params: &Parameters) -> Result<Arc<dyn AuthStrategy>, StrategyError> {
        let options = TokenOptions::from_parameters(params)?;
        Ok(Arc::new(Self::new(options)?))
    }

    /// Verify `authorization` for `access` at time `now` (unix seconds).
    pub fn verify(
        &self,
        authorization: Option<&str>,
        access: &[Access],
        now: i64,
    ) -> Result<Claims, BearerChallenge> {
        let requested = AccessSet::from_records(access);
        let challenge = |err: TokenError| BearerChallenge {
            realm: self.realm.clone(),
            service: self.service.clone(),
            scope: requested.scope_param(),
            err,
        };

        let parts: Vec<&str> = authorization.unwrap_or_default().split(' ').collect();
        if parts.len() != 2 || !parts[0].eq_ignore_ascii_case("bearer") {
            return Err(challenge(TokenError::TokenRequired));
        }

        let token = RawToken::parse(parts[1]).map_err(|err| {
            tracing::debug!(error = %err, "failed to parse token");
            challenge(err)
        })?;

        self.verify_claims(&token.claims, now).map_err(|reason| {
            tracing::warn!(reason, "token claims rejected");
            challenge(TokenError::InvalidToken)
        })?;

        if token.signature.is_empty() {
            return Err(challenge(TokenError::InvalidToken));
        }

        let key = self.anchors.resolve(&token.header, now).map_err(|err| {
            tracing::warn!(error = %err, "failed to verify token signing key");
            challenge(TokenError::InvalidToken)
        })?;

        verify_signature(&token, &key).map_err(|err| {
            tracing::warn!(error = %err, "failed to verify token signature");
            challenge(TokenError::InvalidToken)
        })?;

        let granted = AccessSet::from_grants(&token.claims.access);
        if let Some(missing) = access.iter().find(|a| !granted.contains(a)) {
            tracing::warn!(access = %missing, "token does not grant requested access");
            return Err(challenge(TokenError::InsufficientScope));
        }

        Ok(token.claims)
    }

    fn verify_claims(&self, claims: &Claims, now: i64) -> Result<(), &'static str> {
        if !self.issuers.iter().any(|i| *i == claims.iss) {
            return Err("untrusted issuer");
        }
        if !claims
            .audiences()
            .iter()
            .any(|aud| self.audiences.iter().any(|a| a == aud))
        {
            return Err("audience not accepted");
        }
        if now < claims.nbf {
            return Err("token not yet valid");
        }
        if now > claims.exp {
            return Err("token expired");
        }
        Ok(())
    }
}

fn verify_signature(token: &RawToken<'_>, key: &PublicKey) -> Result<(), jsonwebtoken::errors::Error> {
    let alg: Algorithm = token.header.alg.parse()?;
    let decoding_key = key.decoding_key()?;

    // Claims were checked above; only the signature is left to jsonwebtoken.
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<serde_json::Value>(token.raw, &decoding_key, &validation)?;
    Ok(())
}

#[async_trait]
impl AuthStrategy for TokenStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn authorized(&self, ctx: &Context, access: &[Access]) -> Result<Context, AuthError> {
        let req = ctx.request().ok_or(AuthError::MissingRequest)?;
        let now = chrono::Utc::now().timestamp();

        match self.verify(req.info.header(AUTHORIZATION.as_str()), access, now) {
            Ok(claims) => Ok(ctx.with_user(UserInfo::new(claims.sub))),
            Err(challenge) => Err(AuthError::challenge(challenge)),
        }
    }
}

/// `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    realm: String,
    service: String,
    scope: String,
    err: TokenError,
}

impl BearerChallenge {
    pub fn error(&self) -> TokenError {
        self.err
    }
}

impl fmt::Display for BearerChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl Challenge for BearerChallenge {
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
        if let Some(error) = self.err.error_param() {
            header.push_str(",error=");
            header.push_str(&quote(error));
        }
        header
    }
}
