//! Client identity resolution.
//!
//! Admission keys requests by a stable client identity. Resolvers look at
//! request metadata and may come up empty; `resolve_identity` then falls
//! back to the shared fallback identity instead of skipping admission.

use solace_types::identity::ClientIdentity;

/// Transport-level facts about an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    /// Bearer token or API key presented by the client, if any.
    pub api_key: Option<String>,
    /// Raw `X-Forwarded-For` header value.
    pub forwarded_for: Option<String>,
    /// Raw `X-Real-IP` header value.
    pub real_ip: Option<String>,
    /// Socket peer address.
    pub peer_addr: Option<String>,
}

/// Derives an identity key from request metadata.
pub trait IdentityResolver: Send + Sync {
    /// Return `None` when no key can be derived.
    fn resolve(&self, metadata: &RequestMetadata) -> Option<String>;
}

/// Network-origin resolver.
///
/// Uses the socket peer address. With `trust_forwarded_headers`, the first
/// `X-Forwarded-For` hop and then `X-Real-IP` take precedence over the peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginIdentityResolver {
    trust_forwarded_headers: bool,
}

impl OriginIdentityResolver {
    pub fn new(trust_forwarded_headers: bool) -> Self {
        Self {
            trust_forwarded_headers,
        }
    }
}

impl IdentityResolver for OriginIdentityResolver {
    fn resolve(&self, metadata: &RequestMetadata) -> Option<String> {
        let peer = || non_blank(metadata.peer_addr.as_deref());

        let origin = if self.trust_forwarded_headers {
            metadata
                .forwarded_for
                .as_deref()
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .or_else(|| non_blank(metadata.real_ip.as_deref()))
                .or_else(peer)
        } else {
            peer()
        };

        origin.map(str::to_string)
    }
}

/// Resolve with `resolver`, degrading to the fallback identity on failure.
pub fn resolve_identity<R>(resolver: &R, metadata: &RequestMetadata) -> ClientIdentity
where
    R: IdentityResolver + ?Sized,
{
    let identity = ClientIdentity::from_resolved(resolver.resolve(metadata));
    if identity.is_fallback() {
        tracing::debug!("No identity could be derived, using fallback");
    }
    identity
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
