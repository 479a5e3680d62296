/*
 * Responsibility
 * - Read the environment (PORT, CANARIA_*) after loading .env
 * - Validate values and fail startup on anything malformed
 * - Hand typed settings to app::run (auth, storage, headers, logging, timeouts)
 */
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::services::auth::Parameters;

const AUTH_PARAMETER_PREFIX: &str = "CANARIA_AUTH_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("unsupported log formatter: {0}")]
    UnsupportedLogFormat(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Static fields attached to every request logger.
    pub fields: Vec<(String, String)>,
}

/// Selected auth strategy and its raw parameters.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub strategy: Option<String>,
    pub parameters: Parameters,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub storage: String,
    pub auth: AuthConfig,
    pub http_headers: Vec<(HeaderName, HeaderValue)>,
    pub log: LogConfig,
    pub webhook_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build the configuration from an explicit variable set.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let port: u16 = match get("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 6789,
        };
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV"));
        let storage = get("CANARIA_STORAGE").unwrap_or("memory").to_string();

        let auth = AuthConfig {
            strategy: get("CANARIA_AUTH").map(str::to_string),
            parameters: vars
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(AUTH_PARAMETER_PREFIX)
                        .filter(|name| !name.is_empty())
                        .map(|name| (name.to_ascii_lowercase(), v.clone()))
                })
                .collect(),
        };

        let http_headers = match get("CANARIA_HTTP_HEADERS") {
            Some(raw) => parse_headers(raw)?,
            None => Vec::new(),
        };

        let log = LogConfig {
            level: get("CANARIA_LOG_LEVEL")
                .unwrap_or("info,tower_http=info")
                .to_string(),
            format: match get("CANARIA_LOG_FORMAT") {
                None => LogFormat::Text,
                Some(f) if f.eq_ignore_ascii_case("text") => LogFormat::Text,
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                Some(other) => return Err(ConfigError::UnsupportedLogFormat(other.to_string())),
            },
            fields: match get("CANARIA_LOG_FIELDS") {
                Some(raw) => parse_fields(raw)?,
                None => Vec::new(),
            },
        };

        let webhook_timeout = seconds(get("CANARIA_WEBHOOK_TIMEOUT_SECONDS"), 10)
            .ok_or(ConfigError::Invalid("CANARIA_WEBHOOK_TIMEOUT_SECONDS"))?;
        let request_timeout = seconds(get("CANARIA_REQUEST_TIMEOUT_SECONDS"), 30)
            .ok_or(ConfigError::Invalid("CANARIA_REQUEST_TIMEOUT_SECONDS"))?;

        Ok(Self {
            addr,
            app_env,
            storage,
            auth,
            http_headers,
            log,
            webhook_timeout,
            request_timeout,
        })
    }
}

fn seconds(value: Option<&str>, default: u64) -> Option<Duration> {
    match value {
        None => Some(Duration::from_secs(default)),
        Some(v) => v.parse::<u64>().ok().filter(|s| *s > 0).map(Duration::from_secs),
    }
}

/// `Name: value;Other: value`
fn parse_headers(raw: &str) -> Result<Vec<(HeaderName, HeaderValue)>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, value) = entry
                .split_once(':')
                .ok_or(ConfigError::Invalid("CANARIA_HTTP_HEADERS"))?;
            let name = HeaderName::from_str(name.trim())
                .map_err(|_| ConfigError::Invalid("CANARIA_HTTP_HEADERS"))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|_| ConfigError::Invalid("CANARIA_HTTP_HEADERS"))?;
            Ok((name, value))
        })
        .collect()
}

/// `key=value,key=value`
fn parse_fields(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .filter(|(k, _)| !k.trim().is_empty())
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or(ConfigError::Invalid("CANARIA_LOG_FIELDS"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_vars(Vec::new()).unwrap();

        assert_eq!(config.addr.port(), 6789);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.storage, "memory");
        assert!(config.auth.strategy.is_none());
        assert!(config.http_headers.is_empty());
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(config.webhook_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn auth_parameters_are_lowercased() {
        let config = Config::from_vars(vars(&[
            ("CANARIA_AUTH", "token"),
            ("CANARIA_AUTH_REALM", "https://auth.example.com/token"),
            ("CANARIA_AUTH_ROOTCERTBUNDLE", "/etc/canaria/roots.pem"),
            ("CANARIA_AUTHX", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.auth.strategy.as_deref(), Some("token"));
        assert_eq!(config.auth.parameters.len(), 2);
        assert_eq!(
            config.auth.parameters.get("rootcertbundle").map(String::as_str),
            Some("/etc/canaria/roots.pem")
        );
    }

    #[test]
    fn headers_and_fields_parse() {
        let config = Config::from_vars(vars(&[
            ("CANARIA_HTTP_HEADERS", "X-Frame-Options: DENY; X-Served-By: canaria"),
            ("CANARIA_LOG_FIELDS", "env=prod, region=eu"),
            ("CANARIA_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.http_headers.len(), 2);
        assert_eq!(config.http_headers[0].0, "x-frame-options");
        assert_eq!(config.http_headers[1].1, "canaria");
        assert_eq!(
            config.log.fields,
            vec![("env".into(), "prod".into()), ("region".into(), "eu".into())]
        );
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_fail() {
        let err = Config::from_vars(vars(&[("PORT", "http")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid("PORT"));

        let err = Config::from_vars(vars(&[("CANARIA_HTTP_HEADERS", "no-colon")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid("CANARIA_HTTP_HEADERS"));

        let err = Config::from_vars(vars(&[("CANARIA_LOG_FORMAT", "logfmt")])).unwrap_err();
        assert_eq!(err.to_string(), "unsupported log formatter: logfmt");

        let err = Config::from_vars(vars(&[("CANARIA_WEBHOOK_TIMEOUT_SECONDS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid("CANARIA_WEBHOOK_TIMEOUT_SECONDS"));
    }
}
