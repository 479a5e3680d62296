//! Structural JWT parsing (no signature check).
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::TokenError;

/// A grant inside the `access` claim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceActions {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Token claims.
///
/// NOTE:
/// - `aud` may be a string or an array of strings, so it stays a `Value`.
/// - Missing numeric dates deserialize as 0; a 0 `exp` is always expired.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub aud: serde_json::Value,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub nbf: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub jti: String,
    #[serde(default)]
    pub access: Vec<ResourceActions>,
}

impl Claims {
    pub fn audiences(&self) -> Vec<&str> {
        match &self.aud {
            serde_json::Value::String(s) => vec![s.as_str()],
            serde_json::Value::Array(arr) => arr.iter().filter_map(|v| v.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// JOSE header fields used to locate the signing key.
#[derive(Debug, Clone, Deserialize)]
pub struct JoseHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub x5c: Option<Vec<String>>,
    #[serde(default)]
    pub jwk: Option<serde_json::Value>,
}

/// A token split into its parts, with header and claims decoded.
#[derive(Debug, Clone)]
pub struct RawToken<'a> {
    pub raw: &'a str,
    pub header: JoseHeader,
    pub claims: Claims,
    pub signature: &'a str,
}

impl<'a> RawToken<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, TokenError> {
        let mut parts = raw.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::MalformedToken);
        };

        Ok(Self {
            raw,
            header: decode_segment(header)?,
            claims: decode_segment(claims)?,
            signature,
        })
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| TokenError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::MalformedToken)
}
