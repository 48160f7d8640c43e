//! Vault item persistence.
//!
//! Secrets arrive already encrypted (base64 AES-256-GCM blobs from the
//! security core) and are stored verbatim. Every query is scoped by the
//! owning `user_id`, so one user can never read or touch another user's
//! items regardless of what item id they present.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A stored vault item. The secret field stays encrypted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultItem {
    /// Row id.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Display label, e.g. the site or service name.
    pub title: String,
    /// Login name at the target service, not a Strongroom account.
    pub username: Option<String>,
    /// Where the credential is used.
    pub url: Option<String>,
    /// Base64 AES-256-GCM blob; opaque to the store.
    pub encrypted_secret: String,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Unix timestamp when the item was created.
    pub created_at: i64,
    /// Unix timestamp of the last modification.
    pub updated_at: i64,
}

/// Fields for a new vault item.
#[derive(Debug, Clone)]
pub struct NewVaultItem {
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub encrypted_secret: String,
    pub notes: Option<String>,
}

/// Partial update for a vault item. `None` keeps the current value, so a
/// set optional column cannot be cleared through this path.
#[derive(Debug, Clone, Default)]
pub struct VaultItemUpdate {
    pub title: Option<String>,
    pub username: Option<String>,
    pub url: Option<String>,
    pub encrypted_secret: Option<String>,
    pub notes: Option<String>,
}

impl VaultItemUpdate {
    /// True when the update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.username.is_none()
            && self.url.is_none()
            && self.encrypted_secret.is_none()
            && self.notes.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  VaultItemStore
// ═══════════════════════════════════════════════════════════════════════

/// Owner-scoped CRUD operations on vault items.
#[derive(Clone)]
pub struct VaultItemStore {
    db: Database,
}

impl VaultItemStore {
    /// Create a new item store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new item for `owner`.
    ///
    /// Returns [`StoreError::NotFound`] when `owner` does not reference
    /// an existing user.
    #[instrument(skip(self, item))]
    pub async fn create(&self, owner: i64, item: NewVaultItem) -> StoreResult<VaultItem> {
        if item.title.is_empty() {
            return Err(StoreError::InvalidArgument(
                "title must not be empty".into(),
            ));
        }
        if item.encrypted_secret.is_empty() {
            return Err(StoreError::InvalidArgument(
                "encrypted secret must not be empty".into(),
            ));
        }

        let now = Utc::now().timestamp();
        let stored = item.clone();

        let id = self
            .db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO vault_items \
                         (user_id, title, username, url, encrypted_secret, notes, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    rusqlite::params![
                        owner,
                        item.title,
                        item.username,
                        item.url,
                        item.encrypted_secret,
                        item.notes,
                        now
                    ],
                )
                .map_err(|e| {
                    if let rusqlite::Error::SqliteFailure(ref err, _) = e
                        && err.code == rusqlite::ErrorCode::ConstraintViolation
                    {
                        return StoreError::NotFound {
                            entity: "user",
                            id: owner.to_string(),
                        };
                    }
                    StoreError::Sqlite(e)
                })?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!(item_id = id, user_id = owner, "vault item created");
        Ok(VaultItem {
            id,
            user_id: owner,
            title: stored.title,
            username: stored.username,
            url: stored.url,
            encrypted_secret: stored.encrypted_secret,
            notes: stored.notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// List every item owned by `owner`, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, owner: i64) -> StoreResult<Vec<VaultItem>> {
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, title, username, url, encrypted_secret, notes, \
                            created_at, updated_at \
                     FROM vault_items WHERE user_id = ?1 \
                     ORDER BY created_at DESC, id DESC",
                )?;
                let items = stmt
                    .query_map(rusqlite::params![owner], map_item)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await
    }

    /// Fetch one of `owner`'s items, returning `None` when the id does
    /// not exist or belongs to someone else.
    #[instrument(skip(self))]
    pub async fn get(&self, owner: i64, id: i64) -> StoreResult<Option<VaultItem>> {
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT id, user_id, title, username, url, encrypted_secret, notes, \
                            created_at, updated_at \
                     FROM vault_items WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![id, owner],
                    map_item,
                );
                match result {
                    Ok(item) => Ok(Some(item)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Apply a partial update to one of `owner`'s items and return the
    /// new state. Absent fields keep their stored values.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        owner: i64,
        id: i64,
        update: VaultItemUpdate,
    ) -> StoreResult<VaultItem> {
        if update.is_empty() {
            return Err(StoreError::InvalidArgument("no fields to update".into()));
        }

        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                let changed = conn.execute(
                    "UPDATE vault_items SET \
                         title            = COALESCE(?3, title), \
                         username         = COALESCE(?4, username), \
                         url              = COALESCE(?5, url), \
                         encrypted_secret = COALESCE(?6, encrypted_secret), \
                         notes            = COALESCE(?7, notes), \
                         updated_at       = ?8 \
                     WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![
                        id,
                        owner,
                        update.title,
                        update.username,
                        update.url,
                        update.encrypted_secret,
                        update.notes,
                        now
                    ],
                )?;
                if changed == 0 {
                    return Err(StoreError::NotFound {
                        entity: "vault item",
                        id: id.to_string(),
                    });
                }

                let item = conn.query_row(
                    "SELECT id, user_id, title, username, url, encrypted_secret, notes, \
                            created_at, updated_at \
                     FROM vault_items WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![id, owner],
                    map_item,
                )?;
                Ok(item)
            })
            .await
    }

    /// Delete one of `owner`'s items.
    #[instrument(skip(self))]
    pub async fn delete(&self, owner: i64, id: i64) -> StoreResult<()> {
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM vault_items WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![id, owner],
                )?;
                if deleted == 0 {
                    return Err(StoreError::NotFound {
                        entity: "vault item",
                        id: id.to_string(),
                    });
                }
                Ok(())
            })
            .await
    }
}

/// Map a full vault item row to a [`VaultItem`].
fn map_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<VaultItem> {
    Ok(VaultItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        username: row.get(3)?,
        url: row.get(4)?,
        encrypted_secret: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_store::UserStore;

    async fn setup() -> (VaultItemStore, i64) {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        let users = UserStore::new(db.clone());
        let owner = users.create("alice", "salt:hash").await.unwrap().id;
        (VaultItemStore::new(db), owner)
    }

    fn new_item(title: &str) -> NewVaultItem {
        NewVaultItem {
            title: title.to_string(),
            username: Some("alice@example.com".to_string()),
            url: Some("https://example.com".to_string()),
            encrypted_secret: "b2xkIGJsb2I=".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_item() {
        let (store, owner) = setup().await;

        let item = store.create(owner, new_item("gmail")).await.unwrap();
        assert!(item.id > 0);
        assert_eq!(item.user_id, owner);
        assert_eq!(item.title, "gmail");
        assert_eq!(item.created_at, item.updated_at);

        let fetched = store.get(owner, item.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, item.id);
        assert_eq!(fetched.encrypted_secret, "b2xkIGJsb2I=");
        assert_eq!(fetched.username.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn create_for_missing_user_is_not_found() {
        let (store, _) = setup().await;

        let result = store.create(999, new_item("gmail")).await;
        match result.unwrap_err() {
            StoreError::NotFound { entity, .. } => assert_eq!(entity, "user"),
            other => panic!("expected NotFound, got: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_title_rejected() {
        let (store, owner) = setup().await;
        let result = store.create(owner, new_item("")).await;
        assert!(matches!(
            result.unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn empty_secret_rejected() {
        let (store, owner) = setup().await;
        let mut item = new_item("gmail");
        item.encrypted_secret.clear();
        let result = store.create(owner, item).await;
        assert!(matches!(
            result.unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let (store, owner) = setup().await;

        let first = store.create(owner, new_item("gmail")).await.unwrap();
        let second = store.create(owner, new_item("github")).await.unwrap();
        let third = store.create(owner, new_item("bank")).await.unwrap();

        let items = store.list(owner).await.unwrap();
        let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, [third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn get_is_scoped_by_owner() {
        let (store, owner) = setup().await;
        let item = store.create(owner, new_item("gmail")).await.unwrap();

        let other_owner = owner + 1;
        assert!(store.get(other_owner, item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_changes_only_set_fields() {
        let (store, owner) = setup().await;
        let item = store.create(owner, new_item("gmail")).await.unwrap();

        let updated = store
            .update(
                owner,
                item.id,
                VaultItemUpdate {
                    title: Some("gmail (work)".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "gmail (work)");
        // Unset fields keep their stored values.
        assert_eq!(updated.username.as_deref(), Some("alice@example.com"));
        assert_eq!(updated.encrypted_secret, "b2xkIGJsb2I=");
        assert!(updated.updated_at >= item.updated_at);
    }

    #[tokio::test]
    async fn update_can_swap_the_encrypted_secret() {
        let (store, owner) = setup().await;
        let item = store.create(owner, new_item("gmail")).await.unwrap();

        let updated = store
            .update(
                owner,
                item.id,
                VaultItemUpdate {
                    encrypted_secret: Some("bmV3IGJsb2I=".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.encrypted_secret, "bmV3IGJsb2I=");
        assert_eq!(updated.title, "gmail");
    }

    #[tokio::test]
    async fn empty_update_rejected() {
        let (store, owner) = setup().await;
        let item = store.create(owner, new_item("gmail")).await.unwrap();

        let result = store
            .update(owner, item.id, VaultItemUpdate::default())
            .await;
        assert!(matches!(
            result.unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn update_for_wrong_owner_is_not_found() {
        let (store, owner) = setup().await;
        let item = store.create(owner, new_item("gmail")).await.unwrap();

        let result = store
            .update(
                owner + 1,
                item.id,
                VaultItemUpdate {
                    title: Some("stolen".to_string()),
                    ..Default::default()
                },
            )
            .await;
        match result.unwrap_err() {
            StoreError::NotFound { entity, .. } => assert_eq!(entity, "vault item"),
            other => panic!("expected NotFound, got: {other}"),
        }

        // Untouched.
        let fetched = store.get(owner, item.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "gmail");
    }

    #[tokio::test]
    async fn delete_item() {
        let (store, owner) = setup().await;
        let item = store.create(owner, new_item("gmail")).await.unwrap();

        store.delete(owner, item.id).await.unwrap();
        assert!(store.get(owner, item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_for_wrong_owner_is_not_found() {
        let (store, owner) = setup().await;
        let item = store.create(owner, new_item("gmail")).await.unwrap();

        let result = store.delete(owner + 1, item.id).await;
        assert!(matches!(
            result.unwrap_err(),
            StoreError::NotFound { .. }
        ));

        // Still present for the real owner.
        assert!(store.get(owner, item.id).await.unwrap().is_some());
    }
}
