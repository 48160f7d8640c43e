//! Signed session tokens.
//!
//! A token is a compact two-segment string: `base64url(claims JSON)` and
//! `base64url(HMAC-SHA256 tag)` joined by `.`. The format carries no
//! algorithm field, so HMAC-SHA256 under the configured secret is the only
//! scheme a verifier will ever apply; there is no header for a forged
//! token to negotiate with.
//!
//! Tokens are self-contained: verification needs the signing secret and
//! the clock, never a server-side session lookup. Issued claims are
//! `{sub, username, iat, exp}` with a fixed two-hour lifetime.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use chrono::{DateTime, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SecurityError};

/// Claims asserted by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject, the id of the authenticated user.
    pub sub: i64,
    /// Username at issue time.
    pub username: String,
    /// Issue instant, Unix seconds.
    pub iat: i64,
    /// Expiry instant, Unix seconds.
    pub exp: i64,
}

/// Issues and verifies signed session tokens.
///
/// The signing secret is process-wide material supplied at startup. There
/// is no default: an empty secret is rejected at construction.
pub struct TokenService {
    key: hmac::Key,
}

impl TokenService {
    /// Token lifetime in seconds (2 hours).
    pub const TTL_SECS: i64 = 2 * 60 * 60;

    /// Build a service signing with `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::CryptoConfig`] if `secret` is empty.
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(SecurityError::CryptoConfig {
                reason: "token signing secret must not be empty".into(),
            });
        }
        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        })
    }

    /// Issue a token for `subject`/`username`, valid for
    /// [`TTL_SECS`](Self::TTL_SECS) from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Json`] if claims serialization fails.
    pub fn issue(&self, subject: i64, username: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = TokenClaims {
            sub: subject,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + Self::TTL_SECS,
        };

        let payload = B64URL.encode(serde_json::to_vec(&claims)?);
        let tag = hmac::sign(&self.key, payload.as_bytes());
        let token = format!("{payload}.{}", B64URL.encode(tag.as_ref()));

        tracing::debug!(subject, exp = claims.exp, "issued session token");
        Ok(token)
    }

    /// Verify `token` at time `now` and return its claims.
    ///
    /// The signature is checked before the claims are parsed; expiry is
    /// evaluated only once the signature holds. A token signed under any
    /// other secret fails the signature check.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::TokenInvalid`] for structural or signature
    /// failures and [`SecurityError::TokenExpired`] when `now` is past the
    /// expiry instant.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims> {
        let Some((payload, sig_b64)) = token.split_once('.') else {
            return Err(SecurityError::TokenInvalid {
                reason: "expected two dot-separated segments".into(),
            });
        };

        let sig = B64URL
            .decode(sig_b64)
            .map_err(|_| SecurityError::TokenInvalid {
                reason: "signature segment is not base64url".into(),
            })?;
        hmac::verify(&self.key, payload.as_bytes(), &sig).map_err(|_| {
            SecurityError::TokenInvalid {
                reason: "signature mismatch".into(),
            }
        })?;

        let claims_json = B64URL
            .decode(payload)
            .map_err(|_| SecurityError::TokenInvalid {
                reason: "claims segment is not base64url".into(),
            })?;
        let claims: TokenClaims =
            serde_json::from_slice(&claims_json).map_err(|_| SecurityError::TokenInvalid {
                reason: "claims do not parse".into(),
            })?;

        if now.timestamp() > claims.exp {
            return Err(SecurityError::TokenExpired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn service() -> TokenService {
        TokenService::new(b"test-signing-secret").unwrap()
    }

    #[test]
    fn issue_then_verify_returns_claims() {
        let svc = service();
        let token = svc.issue(42, "alice", t0()).unwrap();

        let claims = svc.verify(&token, t0() + Duration::hours(1)).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iat, t0().timestamp());
        assert_eq!(claims.exp, t0().timestamp() + TokenService::TTL_SECS);
    }

    #[test]
    fn expired_token_rejected() {
        let svc = service();
        let token = svc.issue(42, "alice", t0()).unwrap();

        let err = svc.verify(&token, t0() + Duration::hours(3)).unwrap_err();
        assert!(matches!(err, SecurityError::TokenExpired));
    }

    #[test]
    fn valid_through_the_expiry_instant() {
        let svc = service();
        let token = svc.issue(7, "bob", t0()).unwrap();

        let at_expiry = t0() + Duration::seconds(TokenService::TTL_SECS);
        assert!(svc.verify(&token, at_expiry).is_ok());
        assert!(matches!(
            svc.verify(&token, at_expiry + Duration::seconds(1)),
            Err(SecurityError::TokenExpired)
        ));
    }

    #[test]
    fn token_signed_with_other_key_rejected() {
        let signer = TokenService::new(b"key-one").unwrap();
        let verifier = TokenService::new(b"key-two").unwrap();
        let token = signer.issue(42, "alice", t0()).unwrap();

        let err = verifier.verify(&token, t0()).unwrap_err();
        assert!(matches!(err, SecurityError::TokenInvalid { .. }));
    }

    #[test]
    fn reencoded_claims_with_old_signature_rejected() {
        let svc = service();
        let token = svc.issue(42, "alice", t0()).unwrap();
        let (payload, sig) = token.split_once('.').unwrap();

        let mut claims: TokenClaims =
            serde_json::from_slice(&B64URL.decode(payload).unwrap()).unwrap();
        claims.sub = 1;
        let forged = format!(
            "{}.{sig}",
            B64URL.encode(serde_json::to_vec(&claims).unwrap())
        );

        let err = svc.verify(&forged, t0()).unwrap_err();
        assert!(matches!(err, SecurityError::TokenInvalid { .. }));
    }

    #[test]
    fn malformed_structure_rejected() {
        let svc = service();
        for bad in ["", "no-dot-here", "a.b.c", "!!!.***"] {
            assert!(
                matches!(
                    svc.verify(bad, t0()),
                    Err(SecurityError::TokenInvalid { .. })
                ),
                "token {bad:?} should be invalid"
            );
        }
    }

    #[test]
    fn empty_secret_rejected() {
        assert!(matches!(
            TokenService::new(b""),
            Err(SecurityError::CryptoConfig { .. })
        ));
    }
}
