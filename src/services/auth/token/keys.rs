//! Trust anchors and signing-key resolution.
//!
//! Responsibility:
//! - Load root certificates from a PEM bundle
//! - Verify `x5c` chains up to one of those roots
//! - Identify public keys by their RFC 7638 JWK thumbprint
//! - Resolve a token's signing key from `x5c`, `jwk` or `kid` (in that order)
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_parser::certificate::X509Certificate;
use x509_parser::pem::Pem;
use x509_parser::public_key::PublicKey as SpkiKey;
use x509_parser::x509::SubjectPublicKeyInfo;

use super::claims::JoseHeader;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_ED25519: &str = "1.3.101.112";

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("unable to read root certificate bundle {path}: {source}")]
    ReadBundle {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),
    #[error("token auth requires at least one token signing root certificate")]
    EmptyBundle,
    #[error("unsupported public key: {0}")]
    UnsupportedKey(String),
    #[error("invalid x5c certificate encoding")]
    InvalidChainEncoding,
    #[error("empty certificate chain")]
    EmptyChain,
    #[error("certificate chain is not trusted")]
    UntrustedChain,
    #[error("certificate is expired or not yet valid")]
    CertificateNotValid,
    #[error("invalid jwk: {0}")]
    InvalidJwk(String),
    #[error("jwk key id {jwk} does not match certificate key id {leaf}")]
    KeyIdMismatch { jwk: String, leaf: String },
    #[error("untrusted key id {0}")]
    UntrustedKey(String),
    #[error("token does not identify a signing key")]
    NoKeyHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
}

impl Curve {
    fn name(self) -> &'static str {
        match self {
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
        }
    }

    fn coordinate_len(self) -> usize {
        match self {
            Curve::P256 => 32,
            Curve::P384 => 48,
        }
    }
}

/// A verification key in raw big-endian form.
#[derive(Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Ec { curve: Curve, x: Vec<u8>, y: Vec<u8> },
    Ed25519 { x: Vec<u8> },
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.key_id()).finish()
    }
}

impl PublicKey {
    pub fn from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Result<Self, TrustError> {
        let oid = spki.algorithm.algorithm.to_id_string();
        match oid.as_str() {
            OID_RSA_ENCRYPTION => match spki.parsed() {
                Ok(SpkiKey::RSA(rsa)) => Ok(Self::Rsa {
                    n: strip_leading_zeros(rsa.modulus).to_vec(),
                    e: strip_leading_zeros(rsa.exponent).to_vec(),
                }),
                _ => Err(TrustError::UnsupportedKey("malformed rsa key".into())),
            },
            OID_EC_PUBLIC_KEY => Self::from_ec_point(&spki.subject_public_key.data),
            OID_ED25519 => {
                let x = spki.subject_public_key.data.to_vec();
                if x.len() != 32 {
                    return Err(TrustError::UnsupportedKey("malformed ed25519 key".into()));
                }
                Ok(Self::Ed25519 { x })
            }
            other => Err(TrustError::UnsupportedKey(other.to_owned())),
        }
    }

    /// Uncompressed SEC1 point: `0x04 || x || y`.
    fn from_ec_point(point: &[u8]) -> Result<Self, TrustError> {
        let curve = match point.len() {
            65 => Curve::P256,
            97 => Curve::P384,
            _ => return Err(TrustError::UnsupportedKey("unsupported ec point".into())),
        };
        if point[0] != 0x04 {
            return Err(TrustError::UnsupportedKey("compressed ec point".into()));
        }
        let (x, y) = point[1..].split_at(curve.coordinate_len());
        Ok(Self::Ec {
            curve,
            x: x.to_vec(),
            y: y.to_vec(),
        })
    }

    pub fn from_jwk(jwk: &Jwk) -> Result<Self, TrustError> {
        let b64 = |field: &str| {
            URL_SAFE_NO_PAD
                .decode(field.trim_end_matches('='))
                .map_err(|_| TrustError::InvalidJwk("bad base64url member".into()))
        };

        match &jwk.algorithm {
            AlgorithmParameters::RSA(params) => Ok(Self::Rsa {
                n: strip_leading_zeros(&b64(&params.n)?).to_vec(),
                e: strip_leading_zeros(&b64(&params.e)?).to_vec(),
            }),
            AlgorithmParameters::EllipticCurve(params) => {
                let curve = match params.curve {
                    EllipticCurve::P256 => Curve::P256,
                    EllipticCurve::P384 => Curve::P384,
                    _ => return Err(TrustError::InvalidJwk("unsupported curve".into())),
                };
                let (x, y) = (b64(&params.x)?, b64(&params.y)?);
                if x.len() != curve.coordinate_len() || y.len() != curve.coordinate_len() {
                    return Err(TrustError::InvalidJwk("bad coordinate length".into()));
                }
                Ok(Self::Ec { curve, x, y })
            }
            AlgorithmParameters::OctetKeyPair(params) => match params.curve {
                EllipticCurve::Ed25519 => Ok(Self::Ed25519 { x: b64(&params.x)? }),
                _ => Err(TrustError::InvalidJwk("unsupported curve".into())),
            },
            _ => Err(TrustError::InvalidJwk("unsupported key type".into())),
        }
    }

    /// RFC 7638 thumbprint: SHA-256 over the canonical JWK members, base64url.
    pub fn key_id(&self) -> String {
        let enc = |b: &[u8]| URL_SAFE_NO_PAD.encode(b);
        // members in lexicographic order
        let canonical = match self {
            Self::Rsa { n, e } => {
                format!(r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#, enc(e), enc(n))
            }
            Self::Ec { curve, x, y } => format!(
                r#"{{"crv":"{}","kty":"EC","x":"{}","y":"{}"}}"#,
                curve.name(),
                enc(x),
                enc(y)
            ),
            Self::Ed25519 { x } => format!(r#"{{"crv":"Ed25519","kty":"OKP","x":"{}"}}"#, enc(x)),
        };

        URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        let enc = |b: &[u8]| URL_SAFE_NO_PAD.encode(b);
        match self {
            Self::Rsa { n, e } => DecodingKey::from_rsa_components(&enc(n), &enc(e)),
            Self::Ec { x, y, .. } => DecodingKey::from_ec_components(&enc(x), &enc(y)),
            Self::Ed25519 { x } => DecodingKey::from_ed_components(&enc(x)),
        }
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    &bytes[start..]
}

fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>, TrustError> {
    x509_parser::parse_x509_certificate(der)
        .map(|(_, cert)| cert)
        .map_err(|e| TrustError::MalformedCertificate(e.to_string()))
}

fn valid_at(cert: &X509Certificate<'_>, now: i64) -> bool {
    let validity = cert.validity();
    validity.not_before.timestamp() <= now && now <= validity.not_after.timestamp()
}

fn issued_by(child: &X509Certificate<'_>, parent: &X509Certificate<'_>) -> bool {
    child.issuer().as_raw() == parent.subject().as_raw()
        && child.verify_signature(Some(parent.public_key())).is_ok()
}

/// Root certificates plus the keys they carry, indexed by key id.
/// Built once and shared read-only.
pub struct TrustAnchors {
    roots: Vec<Vec<u8>>,
    trusted_keys: HashMap<String, PublicKey>,
}

impl fmt::Debug for TrustAnchors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchors")
            .field("roots", &self.roots.len())
            .field("key_ids", &self.trusted_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TrustAnchors {
    pub fn from_file(path: &Path) -> Result<Self, TrustError> {
        let data = std::fs::read(path).map_err(|source| TrustError::ReadBundle {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_pem(&data)
    }

    /// Every PEM block must hold a parseable certificate; at least one is required.
    pub fn from_pem(data: &[u8]) -> Result<Self, TrustError> {
        let mut roots = Vec::new();
        let mut trusted_keys = HashMap::new();

        for pem in Pem::iter_from_buffer(data) {
            let pem = pem.map_err(|e| TrustError::MalformedCertificate(e.to_string()))?;
            let cert = parse_certificate(&pem.contents)?;
            let key = PublicKey::from_spki(cert.public_key())?;
            trusted_keys.insert(key.key_id(), key);
            roots.push(pem.contents.clone());
        }

        if roots.is_empty() {
            return Err(TrustError::EmptyBundle);
        }
        Ok(Self {
            roots,
            trusted_keys,
        })
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn trusted_key(&self, key_id: &str) -> Option<&PublicKey> {
        self.trusted_keys.get(key_id)
    }

    /// Verify `chain` (leaf first) up to a root and return the leaf key.
    pub fn verify_chain(&self, chain: &[Vec<u8>], now: i64) -> Result<PublicKey, TrustError> {
        let certs = chain
            .iter()
            .map(|der| parse_certificate(der))
            .collect::<Result<Vec<_>, _>>()?;
        let roots = self
            .roots
            .iter()
            .map(|der| parse_certificate(der))
            .collect::<Result<Vec<_>, _>>()?;
        let leaf = certs.first().ok_or(TrustError::EmptyChain)?;

        let mut used = vec![false; certs.len()];
        let mut current = 0usize;
        used[0] = true;

        loop {
            let cert = &certs[current];
            if !valid_at(cert, now) {
                return Err(TrustError::CertificateNotValid);
            }

            // a chain may carry the root itself
            let is_root = self.roots.iter().any(|der| *der == chain[current]);
            let signed_by_root = roots
                .iter()
                .any(|root| valid_at(root, now) && issued_by(cert, root));
            if is_root || signed_by_root {
                return PublicKey::from_spki(leaf.public_key());
            }

            let next = certs.iter().enumerate().find(|(idx, candidate)| {
                !used[*idx] && candidate.is_ca() && issued_by(cert, candidate)
            });
            match next {
                Some((idx, _)) => {
                    used[idx] = true;
                    current = idx;
                }
                None => return Err(TrustError::UntrustedChain),
            }
        }
    }

    /// Resolve the signing key named by the token header.
    pub fn resolve(&self, header: &JoseHeader, now: i64) -> Result<PublicKey, TrustError> {
        if let Some(x5c) = &header.x5c {
            return self.verify_chain(&decode_chain(x5c)?, now);
        }

        if let Some(raw) = &header.jwk {
            let jwk: Jwk = serde_json::from_value(raw.clone())
                .map_err(|e| TrustError::InvalidJwk(e.to_string()))?;
            let key = PublicKey::from_jwk(&jwk)?;

            return match jwk.common.x509_chain.as_deref() {
                Some(chain) if !chain.is_empty() => {
                    let leaf = self.verify_chain(&decode_chain(chain)?, now)?;
                    if leaf.key_id() != key.key_id() {
                        return Err(TrustError::KeyIdMismatch {
                            jwk: key.key_id(),
                            leaf: leaf.key_id(),
                        });
                    }
                    Ok(key)
                }
                _ => {
                    let key_id = key.key_id();
                    if self.trusted_keys.contains_key(&key_id) {
                        Ok(key)
                    } else {
                        Err(TrustError::UntrustedKey(key_id))
                    }
                }
            };
        }

        if let Some(kid) = &header.kid {
            return self
                .trusted_key(kid)
                .cloned()
                .ok_or_else(|| TrustError::UntrustedKey(kid.clone()));
        }

        Err(TrustError::NoKeyHint)
    }
}

fn decode_chain(x5c: &[String]) -> Result<Vec<Vec<u8>>, TrustError> {
    x5c.iter()
        .map(|c| STANDARD.decode(c).map_err(|_| TrustError::InvalidChainEncoding))
        .collect()
}

/// Key id of the public key in a DER certificate.
pub fn certificate_key_id(der: &[u8]) -> Result<String, TrustError> {
    let cert = parse_certificate(der)?;
    Ok(PublicKey::from_spki(cert.public_key())?.key_id())
}
