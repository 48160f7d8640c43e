//! Security core for Strongroom.
//!
//! This crate implements the building blocks of the Strongroom security
//! subsystem: password hashing, session token issuance and verification,
//! failed-login lockout, authenticated encryption for vault fields, and an
//! append-only audit log. Everything here is deterministic given its
//! inputs; callers pass the current time explicitly, which keeps expiry
//! and lockout behavior testable.
//!
//! # Modules
//!
//! - [`credential`]: PBKDF2-HMAC-SHA256 password hashing and verification.
//! - [`token`]: HMAC-signed session tokens with a fixed time-to-live.
//! - [`lockout`]: sliding-window failed-attempt tracking per identifier.
//! - [`cipher`]: AES-256-GCM encryption for vault secrets at rest.
//! - [`audit`]: day-partitioned JSONL security event log.
//! - [`config`]: environment-driven settings and key material handling.
//! - [`error`]: unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use strongroom_core::{
//!     BruteForceGuard, CredentialStore, LockoutStatus, TokenService, VaultCipher,
//! };
//!
//! # fn example() -> strongroom_core::Result<()> {
//! // Hash a password for storage and verify a login attempt.
//! let credentials = CredentialStore::new();
//! let stored = credentials.hash("hunter2!")?;
//! assert!(credentials.verify("hunter2!", &stored)?);
//!
//! // Gate the attempt on the lockout guard.
//! let guard = BruteForceGuard::new();
//! let now = Utc::now();
//! if let LockoutStatus::Locked { seconds_left, .. } = guard.check("10.0.0.1-alice", now) {
//!     println!("locked for another {seconds_left}s");
//! }
//!
//! // Issue a session token on success.
//! let tokens = TokenService::new(b"signing-secret")?;
//! let token = tokens.issue(42, "alice", now)?;
//! let claims = tokens.verify(&token, now)?;
//! assert_eq!(claims.sub, 42);
//!
//! // Encrypt a vault secret at rest.
//! let cipher = VaultCipher::new(&[0u8; 32])?;
//! let blob = cipher.encrypt_to_base64(b"s3cr3t")?;
//! let plain = cipher.decrypt_from_base64(&blob)?;
//! assert_eq!(plain, b"s3cr3t");
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod cipher;
pub mod config;
pub mod credential;
pub mod error;
pub mod lockout;
pub mod token;

// Re-export the most commonly used types at the crate root for convenience.
pub use audit::{AuditEvent, AuditLog, Severity, VaultAction, token_prefix};
pub use cipher::VaultCipher;
pub use config::SecurityConfig;
pub use credential::CredentialStore;
pub use error::{Result, SecurityError};
pub use lockout::{BruteForceGuard, LockoutStatus};
pub use token::{TokenClaims, TokenService};
