//! User account persistence.
//!
//! Stores only what authentication needs: the unique username and the
//! PBKDF2 hash string produced by the security core. Hashing and
//! verification live upstream; this store never sees a plaintext
//! password.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A user account, safe to serialize into API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Row id, also used as the token subject.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Unix timestamp when the account was created.
    pub created_at: i64,
}

/// A user together with the stored credential, for login verification.
///
/// Deliberately not serializable; the hash stays inside the auth path.
#[derive(Debug, Clone)]
pub struct AuthRecord {
    /// The account being authenticated.
    pub user: User,
    /// `base64(salt):base64(hash)` string from the credential store.
    pub password_hash: String,
}

// ═══════════════════════════════════════════════════════════════════════
//  UserStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD operations on user accounts.
#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    /// Create a new user store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new user account from a username and an already-hashed
    /// credential.
    ///
    /// Returns [`StoreError::Conflict`] if the username is taken.
    #[instrument(skip(self, password_hash))]
    pub async fn create(&self, username: &str, password_hash: &str) -> StoreResult<User> {
        if username.is_empty() {
            return Err(StoreError::InvalidArgument(
                "username must not be empty".into(),
            ));
        }
        if password_hash.is_empty() {
            return Err(StoreError::InvalidArgument(
                "password hash must not be empty".into(),
            ));
        }

        let username = username.to_string();
        let insert_name = username.clone();
        let password_hash = password_hash.to_string();
        let now = Utc::now().timestamp();

        let id = self
            .db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![insert_name, password_hash, now],
                )
                .map_err(|e| {
                    if let rusqlite::Error::SqliteFailure(ref err, _) = e
                        && err.code == rusqlite::ErrorCode::ConstraintViolation
                    {
                        return StoreError::Conflict {
                            entity: "user",
                            key: insert_name.clone(),
                        };
                    }
                    StoreError::Sqlite(e)
                })?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!(user_id = id, username = %username, "user account created");
        Ok(User {
            id,
            username,
            created_at: now,
        })
    }

    /// Fetch a single user by ID, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> StoreResult<Option<User>> {
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT id, username, created_at FROM users WHERE id = ?1",
                    rusqlite::params![id],
                    map_user,
                );
                match result {
                    Ok(user) => Ok(Some(user)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Fetch a single user by username, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let username = username.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT id, username, created_at FROM users WHERE username = ?1",
                    rusqlite::params![username],
                    map_user,
                );
                match result {
                    Ok(user) => Ok(Some(user)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Fetch a user plus the stored hash for login verification,
    /// returning `None` if the username is unknown.
    #[instrument(skip(self))]
    pub async fn auth_record(&self, username: &str) -> StoreResult<Option<AuthRecord>> {
        let username = username.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT id, username, created_at, password_hash \
                     FROM users WHERE username = ?1",
                    rusqlite::params![username],
                    |row| {
                        Ok(AuthRecord {
                            user: User {
                                id: row.get(0)?,
                                username: row.get(1)?,
                                created_at: row.get(2)?,
                            },
                            password_hash: row.get(3)?,
                        })
                    },
                );
                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Return the total number of accounts.
    #[instrument(skip(self))]
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }
}

/// Map a `id, username, created_at` row to a [`User`].
fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: row.get(2)?,
    })
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Create an in-memory database with all tables for testing.
    async fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn create_and_get_user() {
        let store = UserStore::new(setup_db().await);

        let user = store.create("alice", "salt:hash").await.unwrap();
        assert!(user.id > 0);
        assert_eq!(user.username, "alice");
        assert!(user.created_at > 0);

        let fetched = store.get(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, user.id);
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.created_at, user.created_at);
    }

    #[tokio::test]
    async fn get_nonexistent_user_returns_none() {
        let store = UserStore::new(setup_db().await);
        assert!(store.get(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_username() {
        let store = UserStore::new(setup_db().await);
        store.create("bob", "salt:hash").await.unwrap();

        let found = store.find_by_username("bob").await.unwrap();
        assert_eq!(found.unwrap().username, "bob");

        let not_found = store.find_by_username("nonexistent").await.unwrap();
        assert!(not_found.is_none());
    }

    #[tokio::test]
    async fn auth_record_carries_the_stored_hash() {
        let store = UserStore::new(setup_db().await);
        let user = store.create("carol", "c2FsdA==:aGFzaA==").await.unwrap();

        let record = store.auth_record("carol").await.unwrap().unwrap();
        assert_eq!(record.user.id, user.id);
        assert_eq!(record.password_hash, "c2FsdA==:aGFzaA==");

        assert!(store.auth_record("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = UserStore::new(setup_db().await);
        store.create("dave", "h1").await.unwrap();

        let result = store.create("dave", "h2").await;
        match result.unwrap_err() {
            StoreError::Conflict { entity, key } => {
                assert_eq!(entity, "user");
                assert_eq!(key, "dave");
            }
            other => panic!("expected Conflict, got: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_username_rejected() {
        let store = UserStore::new(setup_db().await);
        let result = store.create("", "hash").await;
        assert!(matches!(
            result.unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn empty_hash_rejected() {
        let store = UserStore::new(setup_db().await);
        let result = store.create("erin", "").await;
        assert!(matches!(
            result.unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn count_users() {
        let store = UserStore::new(setup_db().await);
        assert_eq!(store.count().await.unwrap(), 0);

        store.create("user1", "h").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        store.create("user2", "h").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn user_serializes_without_credential_material() {
        let store = UserStore::new(setup_db().await);
        let user = store.create("frank", "salt:hash").await.unwrap();

        let json = serde_json::to_value(&user).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["created_at", "id", "username"]);
    }
}
