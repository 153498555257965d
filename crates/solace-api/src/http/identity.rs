//! Client identity extraction.
//!
//! Identity sources, in order:
//! - `Authorization: Bearer <key>` or `X-API-Key: <key>` header, hashed
//!   (only with `admission.trust_api_key_identity`)
//! - first `X-Forwarded-For` hop, then `X-Real-IP`
//!   (only with `admission.trust_forwarded_headers`)
//! - socket peer address
//!
//! Keys are never used verbatim: the identity is `key:` plus a SHA-256 prefix.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use solace_core::identity::{
    IdentityResolver, OriginIdentityResolver, RequestMetadata, resolve_identity,
};
use solace_types::admission::AdmissionConfig;
use solace_types::identity::ClientIdentity;

use crate::state::AppState;

/// Hex digits of the key hash kept in the identity.
const KEY_FINGERPRINT_LEN: usize = 16;

/// API key first when trusted, network origin otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyedIdentityResolver {
    origin: OriginIdentityResolver,
    trust_api_key: bool,
}

impl KeyedIdentityResolver {
    pub fn new(origin: OriginIdentityResolver, trust_api_key: bool) -> Self {
        Self {
            origin,
            trust_api_key,
        }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new(
            OriginIdentityResolver::new(config.trust_forwarded_headers),
            config.trust_api_key_identity,
        )
    }
}

impl IdentityResolver for KeyedIdentityResolver {
    fn resolve(&self, metadata: &RequestMetadata) -> Option<String> {
        let keyed = if self.trust_api_key {
            metadata
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(|key| format!("key:{}", key_fingerprint(key)))
        } else {
            None
        };
        keyed.or_else(|| self.origin.resolve(metadata))
    }
}

/// Truncated SHA-256 of an API key (lowercase hex).
pub fn key_fingerprint(key: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
    digest[..KEY_FINGERPRINT_LEN].to_string()
}

/// Collect identity-relevant headers and the peer address.
pub fn request_metadata(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestMetadata {
    RequestMetadata {
        api_key: extract_api_key(headers),
        forwarded_for: header_str(headers, "x-forwarded-for"),
        real_ip: header_str(headers, "x-real-ip"),
        peer_addr: peer.map(|addr| addr.ip().to_string()),
    }
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = header_str(headers, "authorization")
        .as_deref()
        .and_then(|auth| auth.strip_prefix("Bearer "))
    {
        return Some(key.trim().to_string());
    }
    header_str(headers, "x-api-key").map(|key| key.trim().to_string())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Resolved client identity. Never rejects: unresolvable requests get the
/// fallback identity.
pub struct ClientKey(pub ClientIdentity);

impl FromRequestParts<AppState> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let metadata = request_metadata(&parts.headers, peer);
        Ok(ClientKey(resolve_identity(state.resolver.as_ref(), &metadata)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn trusting() -> KeyedIdentityResolver {
        KeyedIdentityResolver::new(OriginIdentityResolver::new(true), true)
    }

    #[test]
    fn default_keys_on_peer_only() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-journal-1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let peer: SocketAddr = "192.0.2.10:41000".parse().unwrap();

        let resolver = KeyedIdentityResolver::from_config(&AdmissionConfig::default());
        assert_eq!(
            resolver.resolve(&request_metadata(&headers, Some(peer))).as_deref(),
            Some("192.0.2.10")
        );
    }

    #[test]
    fn default_rotating_headers_keep_one_identity() {
        let resolver = KeyedIdentityResolver::default();
        let peer: SocketAddr = "192.0.2.10:41000".parse().unwrap();

        let identities: Vec<_> = (0..5)
            .map(|i| {
                let mut headers = HeaderMap::new();
                headers.insert(
                    "x-forwarded-for",
                    HeaderValue::from_str(&format!("198.51.100.{i}")).unwrap(),
                );
                headers.insert(
                    "x-api-key",
                    HeaderValue::from_str(&format!("made-up-{i}")).unwrap(),
                );
                resolver.resolve(&request_metadata(&headers, Some(peer)))
            })
            .collect();

        assert!(identities.iter().all(|id| id.as_deref() == Some("192.0.2.10")));
    }

    #[test]
    fn trusted_bearer_key_is_hashed() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-journal-1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));

        let metadata = request_metadata(&headers, None);
        let key = trusting().resolve(&metadata).unwrap();

        assert_eq!(key, format!("key:{}", key_fingerprint("sk-journal-1")));
        assert_eq!(key.len(), "key:".len() + KEY_FINGERPRINT_LEN);
        assert!(!key.contains("sk-journal"));
    }

    #[test]
    fn x_api_key_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static(" abc "));

        let metadata = request_metadata(&headers, None);
        assert_eq!(metadata.api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn trusted_key_is_stable_across_addresses() {
        let mut a = HeaderMap::new();
        a.insert("x-api-key", HeaderValue::from_static("shared"));
        let mut b = a.clone();
        b.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));

        let peer: SocketAddr = "10.1.1.1:5000".parse().unwrap();
        assert_eq!(
            trusting().resolve(&request_metadata(&a, Some(peer))),
            trusting().resolve(&request_metadata(&b, None)),
        );
    }

    #[test]
    fn trusted_forwarded_for_then_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        let peer: SocketAddr = "192.0.2.10:41000".parse().unwrap();
        assert_eq!(
            trusting().resolve(&request_metadata(&headers, Some(peer))).as_deref(),
            Some("203.0.113.9")
        );

        let identity = resolve_identity(&trusting(), &request_metadata(&HeaderMap::new(), None));
        assert!(identity.is_fallback());
    }
}
