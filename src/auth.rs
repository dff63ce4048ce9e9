//! Bearer-token authorization for write routes.
//!
//! Tokens are configured as SHA-256 hex digests; the raw token never has to be
//! written to disk. A presented token is hashed and compared against every
//! configured digest.

use crate::config::ApiToken;
use crate::error::{Result, ServiceError};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Hex-encoded SHA-256 digest of a bearer token, as stored in `config.toml`
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone)]
struct Client {
    name: String,
    digest: [u8; 32],
}

#[derive(Debug, Clone, Default)]
pub struct TokenVerifier {
    clients: Vec<Client>,
}

impl TokenVerifier {
    pub fn from_config(tokens: &[ApiToken]) -> Result<Self> {
        let mut clients = Vec::with_capacity(tokens.len());
        for token in tokens {
            let bytes = hex::decode(token.sha256.trim()).map_err(|e| {
                ServiceError::Config(format!(
                    "auth token '{}' has an invalid sha256 digest: {e}",
                    token.name
                ))
            })?;
            let digest: [u8; 32] = bytes.try_into().map_err(|_| {
                ServiceError::Config(format!(
                    "auth token '{}' digest must be 32 bytes (64 hex characters)",
                    token.name
                ))
            })?;
            clients.push(Client {
                name: token.name.clone(),
                digest,
            });
        }

        if clients.is_empty() {
            warn!("No API tokens configured; every write route will answer 401");
        }

        Ok(Self { clients })
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Check an `Authorization` header value and return the client name
    pub fn verify(&self, authorization: Option<&str>) -> Result<String> {
        let header = authorization
            .ok_or_else(|| ServiceError::Unauthorized("missing Authorization header".into()))?;
        let token = bearer_token(header)
            .ok_or_else(|| ServiceError::Unauthorized("expected a Bearer token".into()))?;

        let presented: [u8; 32] = Sha256::digest(token.as_bytes()).into();
        self.clients
            .iter()
            .find(|client| digests_match(&client.digest, &presented))
            .map(|client| client.name.clone())
            .ok_or_else(|| ServiceError::Unauthorized("invalid token".into()))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn digests_match(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> TokenVerifier {
        TokenVerifier::from_config(&[ApiToken {
            name: "admin-ui".to_string(),
            sha256: token_digest("s3cret"),
        }])
        .unwrap()
    }

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        assert_eq!(
            token_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn accepts_configured_token() {
        let client = verifier().verify(Some("Bearer s3cret")).unwrap();
        assert_eq!(client, "admin-ui");

        let client = verifier().verify(Some("bearer   s3cret ")).unwrap();
        assert_eq!(client, "admin-ui");
    }

    #[test]
    fn rejects_missing_wrong_or_malformed_tokens() {
        let v = verifier();
        for header in [None, Some("Bearer nope"), Some("Basic s3cret"), Some("Bearer "), Some("s3cret")] {
            assert!(
                matches!(v.verify(header), Err(ServiceError::Unauthorized(_))),
                "header {header:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_verifier_rejects_everything() {
        let v = TokenVerifier::from_config(&[]).unwrap();
        assert_eq!(v.client_count(), 0);
        assert!(v.verify(Some("Bearer anything")).is_err());
    }

    #[test]
    fn bad_digest_is_a_config_error() {
        let err = TokenVerifier::from_config(&[ApiToken {
            name: "broken".to_string(),
            sha256: "not-hex".to_string(),
        }])
        .unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));

        let err = TokenVerifier::from_config(&[ApiToken {
            name: "short".to_string(),
            sha256: "abcd".to_string(),
        }])
        .unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }
}
