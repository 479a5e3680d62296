//! HTTP Basic authentication against an htpasswd file of bcrypt hashes.
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::context::Context;
use crate::services::auth::factory::{required, Parameters, StrategyError};
use crate::services::auth::{quote, Access, AuthError, AuthStrategy, Challenge, UserInfo};

/// Password hashed for unknown users so every attempt costs one bcrypt comparison.
const PLACEHOLDER_PASSWORD: &str = "canaria-placeholder-password";

#[derive(Debug, Error)]
pub enum HtpasswdError {
    #[error("htpasswd: unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("htpasswd: invalid entry at line {0}")]
    InvalidEntry(usize),
    #[error("htpasswd: unable to prepare placeholder hash: {0}")]
    Placeholder(#[from] bcrypt::BcryptError),
}

/// Per-request failure. Both kinds are reported with a Basic challenge.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BasicAuthFailure {
    #[error("authorization credentials required")]
    CredentialsRequired,
    #[error("authentication failure")]
    AuthenticationFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtpasswdOptions {
    pub realm: String,
    pub path: PathBuf,
}

impl HtpasswdOptions {
    pub fn from_parameters(params: &Parameters) -> Result<Self, StrategyError> {
        Ok(Self {
            realm: required(params, HtpasswdStrategy::NAME, "realm")?,
            path: required(params, HtpasswdStrategy::NAME, "path")?.into(),
        })
    }
}

pub struct HtpasswdStrategy {
    realm: String,
    entries: HashMap<String, String>,
    placeholder: String,
}

impl fmt::Debug for HtpasswdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // hashes stay out of logs
        f.debug_struct("HtpasswdStrategy")
            .field("realm", &self.realm)
            .field("users", &self.entries.len())
            .finish()
    }
}

impl HtpasswdStrategy {
    pub const NAME: &'static str = "htpasswd";

    pub fn new(options: HtpasswdOptions) -> Result<Self, HtpasswdError> {
        let entries = load(&options.path)?;
        Self::with_entries(options.realm, entries)
    }

    pub fn with_entries(
        realm: String,
        entries: HashMap<String, String>,
    ) -> Result<Self, HtpasswdError> {
        let cost = entries
            .values()
            .find_map(|hash| bcrypt_cost(hash))
            .unwrap_or(bcrypt::DEFAULT_COST);
        let placeholder = bcrypt::hash(PLACEHOLDER_PASSWORD, cost)?;

        Ok(Self {
            realm,
            entries,
            placeholder,
        })
    }

    pub fn from_parameters(params: &Parameters) -> Result<Arc<dyn AuthStrategy>, StrategyError> {
        let options = HtpasswdOptions::from_parameters(params)?;
        Ok(Arc::new(Self::new(options)?))
    }

    /// Check `password` for `user`. Unknown users are compared against the
    /// placeholder hash, so both outcomes cost one bcrypt verification.
    pub async fn authenticate_user(&self, user: &str, password: &str) -> Result<(), BasicAuthFailure> {
        let (hash, known) = match self.entries.get(user) {
            Some(hash) => (hash.clone(), true),
            None => (self.placeholder.clone(), false),
        };
        let password = password.to_owned();

        let matched = tokio::task::spawn_blocking(move || {
            bcrypt::verify(password, &hash).unwrap_or(false)
        })
        .await
        .unwrap_or(false);

        if known && matched {
            Ok(())
        } else {
            Err(BasicAuthFailure::AuthenticationFailure)
        }
    }

    fn challenge(&self, err: BasicAuthFailure) -> AuthError {
        AuthError::challenge(BasicChallenge {
            realm: self.realm.clone(),
            err,
        })
    }
}

#[async_trait]
impl AuthStrategy for HtpasswdStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn authorized(&self, ctx: &Context, _access: &[Access]) -> Result<Context, AuthError> {
        let req = ctx.request().ok_or(AuthError::MissingRequest)?;

        let Some((user, password)) = req
            .info
            .header(AUTHORIZATION.as_str())
            .and_then(basic_credentials)
        else {
            return Err(self.challenge(BasicAuthFailure::CredentialsRequired));
        };

        if let Err(err) = self.authenticate_user(&user, &password).await {
            ctx.logger_with_field("auth.user.name", &user)
                .warn(format!("error authenticating user: {err}"));
            return Err(self.challenge(err));
        }

        Ok(ctx.with_user(UserInfo::new(user)))
    }
}

#[derive(Debug, Clone)]
pub struct BasicChallenge {
    realm: String,
    err: BasicAuthFailure,
}

impl BasicChallenge {
    pub fn failure(&self) -> BasicAuthFailure {
        self.err
    }
}

impl fmt::Display for BasicChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "basic authentication challenge for realm {:?}: {}", self.realm, self.err)
    }
}

impl Challenge for BasicChallenge {
    fn header_value(&self) -> String {
        format!("Basic realm={}", quote(&self.realm))
    }
}

/// Decode `Basic <base64(user:password)>`.
fn basic_credentials(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_owned(), password.to_owned()))
}

/// Cost segment of a modular-crypt bcrypt hash (`$2y$10$...`).
fn bcrypt_cost(hash: &str) -> Option<u32> {
    hash.split('$').nth(2)?.parse().ok()
}

fn load(path: &Path) -> Result<HashMap<String, String>, HtpasswdError> {
    let data = std::fs::read_to_string(path).map_err(|source| HtpasswdError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&data)
}

/// Parse `user:hash` lines. Blank lines and `#` comments are skipped.
pub fn parse(data: &str) -> Result<HashMap<String, String>, HtpasswdError> {
    let mut entries = HashMap::new();
    for (idx, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (user, hash) = line
            .split_once(':')
            .ok_or(HtpasswdError::InvalidEntry(idx + 1))?;
        let (user, hash) = (user.trim(), hash.trim());
        if user.is_empty() || hash.is_empty() {
            return Err(HtpasswdError::InvalidEntry(idx + 1));
        }
        entries.insert(user.to_owned(), hash.to_owned());
    }
    Ok(entries)
}
