//! Password hashing and verification.
//!
//! Passwords are hashed with PBKDF2-HMAC-SHA256 (ring) and stored as
//! `base64(salt):base64(hash)` strings, using 600,000 iterations per
//! OWASP 2023 recommendations. At that count one call costs roughly
//! 100-300ms on current hardware, the same budget as bcrypt at cost 12.
//!
//! Hashing and verification are pure functions of their inputs plus the
//! per-call random salt. They hold no shared state, so a
//! [`CredentialStore`] can be cloned freely across workers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, SecurityError};

/// PBKDF2-HMAC-SHA256 with 600,000 iterations (OWASP 2023).
pub const PBKDF2_ITERATIONS: u32 = 600_000;

/// Salt length in bytes.
const SALT_LEN: usize = 32;

/// Derived key length in bytes.
const KEY_LEN: usize = 32;

/// PBKDF2 algorithm.
static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Salted one-way password hashing with a deliberately slow work factor.
///
/// One [`hash`](Self::hash) or [`verify`](Self::verify) call burns
/// 100-300ms of CPU by design. Callers on an async runtime should run
/// both on a blocking worker.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    iterations: std::num::NonZeroU32,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Create a store with the production work factor.
    pub fn new() -> Self {
        Self::with_iterations(PBKDF2_ITERATIONS)
    }

    /// Create a store with a custom iteration count.
    ///
    /// The work factor is a constructor parameter so it can be raised over
    /// time (or lowered in tests) without touching call sites. A stored
    /// hash only verifies under the iteration count that produced it.
    /// Zero is clamped to one.
    pub fn with_iterations(iterations: u32) -> Self {
        let iterations =
            std::num::NonZeroU32::new(iterations).unwrap_or(std::num::NonZeroU32::MIN);
        Self { iterations }
    }

    /// Hash `password`, returning a storable `base64(salt):base64(hash)`
    /// string.
    ///
    /// A fresh random salt is drawn per call, so hashing the same password
    /// twice yields different strings that both verify.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Credential`] if the password is empty or
    /// the system CSPRNG fails.
    pub fn hash(&self, password: &str) -> Result<String> {
        if password.is_empty() {
            return Err(SecurityError::Credential {
                reason: "password must not be empty".into(),
            });
        }

        let rng = SystemRandom::new();
        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt).map_err(|_| SecurityError::Credential {
            reason: "failed to generate random salt".into(),
        })?;

        let mut hash = [0u8; KEY_LEN];
        pbkdf2::derive(
            PBKDF2_ALG,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut hash,
        );

        Ok(format!("{}:{}", BASE64.encode(salt), BASE64.encode(hash)))
    }

    /// Verify `password` against a stored hash string.
    ///
    /// Returns `false` on a mismatch; a mismatch is not an error. The
    /// comparison runs in constant time inside `ring`.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Credential`] if the stored string does not
    /// parse as `base64(salt):base64(hash)`.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let parts: Vec<&str> = stored.splitn(2, ':').collect();
        if parts.len() != 2 {
            return Err(SecurityError::Credential {
                reason: "malformed stored hash".into(),
            });
        }

        let salt = BASE64
            .decode(parts[0])
            .map_err(|e| SecurityError::Credential {
                reason: format!("invalid salt encoding: {e}"),
            })?;
        let expected_hash = BASE64
            .decode(parts[1])
            .map_err(|e| SecurityError::Credential {
                reason: format!("invalid hash encoding: {e}"),
            })?;

        Ok(pbkdf2::verify(
            PBKDF2_ALG,
            self.iterations,
            &salt,
            password.as_bytes(),
            &expected_hash,
        )
        .is_ok())
    }
}
