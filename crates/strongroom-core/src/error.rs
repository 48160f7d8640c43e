//! Security core error types.
//!
//! All components in this crate surface errors through [`SecurityError`],
//! the single error type returned by every public API here. Each variant
//! carries enough context for callers to decide how to handle the failure
//! without inspecting opaque strings. Variants never carry secret material:
//! no passwords, no plaintext, no key bytes.

/// Unified error type for the Strongroom security core.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    // -- Credential errors --------------------------------------------------
    /// Password input or a stored hash was malformed (e.g. empty password,
    /// unparseable stored string). Callers surface this as a plain
    /// verification failure so responses cannot distinguish a missing hash
    /// from a wrong password.
    #[error("credential error: {reason}")]
    Credential { reason: String },

    // -- Token errors -------------------------------------------------------
    /// The token is past its expiry instant.
    #[error("token expired")]
    TokenExpired,

    /// The token structure is malformed or its signature does not verify.
    #[error("invalid token: {reason}")]
    TokenInvalid { reason: String },

    // -- Crypto errors ------------------------------------------------------
    /// Key material is absent or has the wrong shape (e.g. a vault key that
    /// is not exactly 32 bytes, an empty signing secret).
    #[error("crypto configuration error: {reason}")]
    CryptoConfig { reason: String },

    /// Encryption failed (CSPRNG failure, ring internal error).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Authenticated decryption failed (truncated blob, tampered data, or
    /// wrong key). No plaintext is returned alongside this error.
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    // -- Configuration ------------------------------------------------------
    /// A non-secret configuration value is missing or malformed.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    // -- Underlying errors --------------------------------------------------
    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error from the filesystem (audit log operations).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors that don't fit a specific
    /// variant. Prefer a typed variant whenever possible.
    #[error("internal security error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the security core.
pub type Result<T> = std::result::Result<T, SecurityError>;
