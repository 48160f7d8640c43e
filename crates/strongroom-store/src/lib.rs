//! # strongroom-store
//!
//! Persistence layer for Strongroom.
//!
//! Provides SQLite-backed storage for user accounts and encrypted vault
//! items, with WAL mode, enforced foreign keys, and versioned
//! transactional migrations. Secrets reach this crate already encrypted;
//! nothing here can read them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  UserStore      (accounts + hashes)     │
//! │  VaultItemStore (per-user ciphertext)   │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL, FK enforced)   │
//! │  Migrations (versioned, transactional)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use strongroom_store::{Database, UserStore, VaultItemStore};
//!
//! let db = Database::open_and_migrate("data/strongroom.db").await?;
//! let users = UserStore::new(db.clone());
//! let items = VaultItemStore::new(db);
//! ```

pub mod db;
pub mod error;
pub mod item_store;
pub mod migration;
pub mod user_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use item_store::{NewVaultItem, VaultItem, VaultItemStore, VaultItemUpdate};
pub use user_store::{AuthRecord, User, UserStore};
