//! # strongroom-service
//!
//! The security service for Strongroom: account signup and login, brute
//! force lockout, session tokens, and an encrypted per-user vault, all
//! behind one [`SecurityService`] handle.
//!
//! ## Features
//!
//! - **Accounts**: signup and login with PBKDF2-HMAC-SHA256 password
//!   hashing, hashed on the blocking pool.
//! - **Lockout**: per-identifier sliding-window failure accounting that
//!   locks after repeated failures and expires on its own.
//! - **Sessions**: HMAC-signed bearer tokens with a two hour TTL,
//!   verified statelessly on every call.
//! - **Vault**: per-user encrypted storage for passwords and keys,
//!   AES-256-GCM under a deployment key.
//! - **Audit**: every security-relevant event written as one JSON line
//!   to day-partitioned log files, with token material redacted.
//!
//! ## Architecture
//!
//! ```text
//! SecurityService
//! ├── CredentialStore   password hashing and verification
//! ├── TokenService      session token issue and verify
//! ├── BruteForceGuard   failed-login accounting
//! ├── VaultCipher       secret encryption (optional, key-gated)
//! ├── AuditLog          append-only JSON lines event trail
//! ├── UserStore         account rows in SQLite
//! └── VaultItemStore    encrypted vault rows in SQLite
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strongroom_core::SecurityConfig;
//! use strongroom_service::{LoginOutcome, NewVaultEntry, SecurityService};
//! use strongroom_store::Database;
//!
//! # async fn example() -> strongroom_service::Result<()> {
//! let db = Database::open_and_migrate("strongroom.db").await?;
//! let config = SecurityConfig::from_env().map_err(|e| {
//!     strongroom_service::ServiceError::Internal(e.to_string())
//! })?;
//! let service = SecurityService::new(db, &config)?;
//!
//! service.signup("alice", "correct horse battery staple").await?;
//!
//! match service.login("203.0.113.7-alice", "alice", "correct horse battery staple").await? {
//!     LoginOutcome::Success { token, .. } => {
//!         service
//!             .vault_create(&token, NewVaultEntry {
//!                 title: "email".into(),
//!                 username: Some("alice@example.com".into()),
//!                 url: None,
//!                 secret: "hunter2".into(),
//!                 notes: None,
//!             })
//!             .await?;
//!         let entries = service.vault_list(&token).await?;
//!         println!("{} entries", entries.len());
//!     }
//!     other => println!("login refused: {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod service;

// Re-export the most commonly used types at the crate root for convenience.
pub use error::{Result, ServiceError};
pub use service::{
    DEFAULT_MAINTENANCE_INTERVAL, LoginOutcome, NewVaultEntry, SecurityService, VaultEntry,
    VaultEntryUpdate,
};
pub use strongroom_store::{User, VaultItem};
