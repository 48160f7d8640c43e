//! High-level security service.
//!
//! The [`SecurityService`] orchestrates the full authentication and vault
//! flow end-to-end: signup, lockout-guarded login, token-scoped vault
//! CRUD, and the periodic maintenance pass. It is the primary entry point
//! for embedding code (an HTTP layer, a CLI) that needs the security
//! subsystem without owning any of its logic.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;

use strongroom_core::{
    AuditEvent, AuditLog, BruteForceGuard, CredentialStore, LockoutStatus, SecurityConfig,
    SecurityError, TokenClaims, TokenService, VaultAction, VaultCipher, token_prefix,
};
use strongroom_store::{
    Database, NewVaultItem, User, UserStore, VaultItem, VaultItemStore, VaultItemUpdate,
};

use crate::error::{Result, ServiceError};

/// Default period between maintenance passes (5 minutes).
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Outcome and entry types
// ---------------------------------------------------------------------------

/// Outcome of a login attempt.
///
/// Only [`LoginOutcome::Success`] carries a token. The other arms are
/// ordinary outcomes, not errors, so the embedding layer can shape its
/// 401/429 responses without string-matching error messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginOutcome {
    /// Credentials verified; a session token was issued.
    Success {
        token: String,
        /// Seconds until the token expires.
        expires_in: i64,
    },
    /// The identifier is locked out; retry after `seconds_left`.
    Locked { seconds_left: i64 },
    /// Wrong username or password. The two cases are indistinguishable
    /// from the outside on purpose.
    InvalidCredentials { attempts_left: usize },
}

/// Plaintext fields for a new vault entry.
#[derive(Debug, Clone)]
pub struct NewVaultEntry {
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    /// The secret to encrypt, e.g. a password or API key.
    pub secret: String,
    pub notes: Option<String>,
}

/// Partial plaintext update for a vault entry. `None` keeps the stored
/// value.
#[derive(Debug, Clone, Default)]
pub struct VaultEntryUpdate {
    pub title: Option<String>,
    pub username: Option<String>,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub notes: Option<String>,
}

/// A vault item as returned by [`SecurityService::vault_list`], with the
/// secret decrypted.
///
/// `secret` is `None` when the stored blob failed authenticated
/// decryption. That failure is audited as suspicious and the rest of the
/// listing still comes back.
#[derive(Debug, Clone, Serialize)]
pub struct VaultEntry {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

// ---------------------------------------------------------------------------
// SecurityService
// ---------------------------------------------------------------------------

/// Orchestrator for the whole security subsystem.
///
/// Construction wires every component from a [`SecurityConfig`]. Methods
/// take explicit lockout identifiers and bearer tokens, so the embedding
/// layer carries no security logic of its own.
pub struct SecurityService {
    users: UserStore,
    items: VaultItemStore,
    credentials: CredentialStore,
    tokens: TokenService,
    cipher: Option<VaultCipher>,
    guard: BruteForceGuard,
    audit: AuditLog,
    audit_retention_days: i64,
}

impl SecurityService {
    /// Build a service from an open database and a config.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::CryptoConfig`] for unusable key material
    /// and [`ServiceError::Internal`] when the audit directory cannot be
    /// created.
    pub fn new(db: Database, config: &SecurityConfig) -> Result<Self> {
        Self::with_credential_store(db, config, CredentialStore::new())
    }

    /// Same as [`SecurityService::new`] with an explicit credential
    /// store, letting tests lower the PBKDF2 work factor.
    pub fn with_credential_store(
        db: Database,
        config: &SecurityConfig,
        credentials: CredentialStore,
    ) -> Result<Self> {
        let tokens = TokenService::new(&config.token_secret)?;
        let cipher = match &config.vault_key {
            Some(key) => Some(VaultCipher::new(key)?),
            None => None,
        };
        let audit = AuditLog::open(config.audit_dir.clone())?;
        let guard = BruteForceGuard::with_policy(config.lockout_window, config.max_attempts);

        tracing::info!(
            vault_enabled = cipher.is_some(),
            max_attempts = config.max_attempts,
            lockout_window_secs = config.lockout_window.num_seconds(),
            "security service initialized"
        );

        Ok(Self {
            users: UserStore::new(db.clone()),
            items: VaultItemStore::new(db),
            credentials,
            tokens,
            cipher,
            guard,
            audit,
            audit_retention_days: config.audit_retention_days,
        })
    }

    // -- Accounts and sessions ----------------------------------------------

    /// Create a new account.
    ///
    /// The password is hashed on the blocking pool before anything is
    /// stored; the plaintext never reaches the database or the audit log.
    pub async fn signup(&self, username: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() {
            return Err(ServiceError::Validation("username is required".into()));
        }
        if password.is_empty() {
            return Err(ServiceError::Validation("password is required".into()));
        }

        let hash = self.hash_password(password.to_string()).await?;

        match self.users.create(username, &hash).await {
            Ok(user) => {
                self.audit.append(
                    AuditEvent::Signup {
                        username: user.username.clone(),
                        success: true,
                    },
                    Utc::now(),
                );
                tracing::info!(user_id = user.id, username = %user.username, "account created");
                Ok(user)
            }
            Err(err) => {
                let err = ServiceError::from(err);
                if matches!(err, ServiceError::Conflict) {
                    self.audit.append(
                        AuditEvent::Signup {
                            username: username.to_string(),
                            success: false,
                        },
                        Utc::now(),
                    );
                }
                Err(err)
            }
        }
    }

    /// Attempt a login for `username`, with failures accounted against
    /// `identifier` (conventionally `"address-username"`).
    ///
    /// The flow:
    /// 1. Refuse immediately when the identifier is locked out.
    /// 2. Look up the account and verify the password on the blocking pool.
    /// 3. On failure, record the attempt and report how many tries remain.
    /// 4. On success, clear the failure counter and issue a session token.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures become errors; wrong credentials and
    /// lockout come back as [`LoginOutcome`] variants.
    pub async fn login(
        &self,
        identifier: &str,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ServiceError::Validation(
                "username and password are required".into(),
            ));
        }

        // Step 1: lockout gate.
        let now = Utc::now();
        if let LockoutStatus::Locked {
            seconds_left,
            attempt_count,
        } = self.guard.check(identifier, now)
        {
            self.audit.append(
                AuditEvent::BruteForceDetected {
                    identifier: identifier.to_string(),
                    attempt_count,
                },
                now,
            );
            tracing::warn!(identifier, seconds_left, "login rejected, identifier locked");
            return Ok(LoginOutcome::Locked { seconds_left });
        }

        // Step 2: fetch the stored credential and verify.
        let Some(record) = self.users.auth_record(username).await? else {
            return Ok(self.failed_login(identifier, username, "unknown username"));
        };

        let credentials = self.credentials.clone();
        let candidate = password.to_string();
        let stored = record.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || credentials.verify(&candidate, &stored))
            .await
            .map_err(|e| ServiceError::Internal(format!("verify task failed: {e}")))?;

        let valid = match verified {
            Ok(valid) => valid,
            Err(e) => {
                // A stored hash that does not parse means corruption or
                // tampering. Treat the attempt as a mismatch and flag it.
                tracing::error!(
                    user_id = record.user.id,
                    error = %e,
                    "stored credential hash is malformed"
                );
                self.audit.append(
                    AuditEvent::SuspiciousActivity {
                        description: format!(
                            "stored credential hash for {username} is malformed"
                        ),
                        user_id: Some(record.user.id),
                    },
                    now,
                );
                false
            }
        };

        // Step 3: account the failure.
        if !valid {
            return Ok(self.failed_login(identifier, username, "invalid password"));
        }

        // Step 4: success. Reset the counter and issue a token.
        self.guard.clear(identifier);
        let now = Utc::now();
        let token = self.tokens.issue(record.user.id, &record.user.username, now)?;

        self.audit.append(
            AuditEvent::Login {
                username: record.user.username.clone(),
                identifier: identifier.to_string(),
            },
            now,
        );
        self.audit.append(
            AuditEvent::TokenIssued {
                user_id: record.user.id,
                token_prefix: token_prefix(&token),
            },
            now,
        );
        tracing::info!(user_id = record.user.id, username = %record.user.username, "login succeeded");

        Ok(LoginOutcome::Success {
            token,
            expires_in: TokenService::TTL_SECS,
        })
    }

    /// End a session. The token must still be valid; the logout is
    /// audited under the account's name.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let claims = self.authenticate(token)?;
        self.audit.append(
            AuditEvent::Logout {
                username: claims.username.clone(),
            },
            Utc::now(),
        );
        tracing::info!(user_id = claims.sub, "logout");
        Ok(())
    }

    /// Verify a bearer token and return its claims.
    ///
    /// This is what request middleware calls once per request. Failures
    /// are audited with a redacted token prefix and collapse to
    /// [`ServiceError::Unauthorized`].
    pub fn authenticate(&self, token: &str) -> Result<TokenClaims> {
        let now = Utc::now();
        match self.tokens.verify(token, now) {
            Ok(claims) => Ok(claims),
            Err(e) => {
                self.audit.append(
                    AuditEvent::TokenValidationFailed {
                        reason: e.to_string(),
                        token_prefix: token_prefix(token),
                    },
                    now,
                );
                tracing::warn!(error = %e, "token rejected");
                Err(ServiceError::Unauthorized)
            }
        }
    }

    // -- Vault --------------------------------------------------------------

    /// Encrypt and store a new vault entry for the token's owner.
    pub async fn vault_create(&self, token: &str, entry: NewVaultEntry) -> Result<VaultItem> {
        let claims = self.authenticate(token)?;
        if entry.title.trim().is_empty() {
            return Err(ServiceError::Validation("title is required".into()));
        }
        if entry.secret.is_empty() {
            return Err(ServiceError::Validation("secret is required".into()));
        }

        let blob = self.cipher()?.encrypt_to_base64(entry.secret.as_bytes())?;
        let item = self
            .items
            .create(
                claims.sub,
                NewVaultItem {
                    title: entry.title,
                    username: entry.username,
                    url: entry.url,
                    encrypted_secret: blob,
                    notes: entry.notes,
                },
            )
            .await?;

        self.audit_vault(claims.sub, VaultAction::Create, Some(item.id), true);
        tracing::info!(user_id = claims.sub, item_id = item.id, "vault entry created");
        Ok(item)
    }

    /// List the owner's entries with secrets decrypted, newest first.
    pub async fn vault_list(&self, token: &str) -> Result<Vec<VaultEntry>> {
        let claims = self.authenticate(token)?;
        let cipher = self.cipher()?;
        let items = self.items.list(claims.sub).await?;

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let secret = match cipher.decrypt_from_base64(&item.encrypted_secret) {
                Ok(plain) => match String::from_utf8(plain) {
                    Ok(secret) => Some(secret),
                    Err(_) => {
                        self.flag_undecryptable(claims.sub, item.id);
                        None
                    }
                },
                Err(_) => {
                    self.flag_undecryptable(claims.sub, item.id);
                    None
                }
            };
            entries.push(VaultEntry {
                id: item.id,
                title: item.title,
                username: item.username,
                url: item.url,
                secret,
                notes: item.notes,
                created_at: item.created_at,
                updated_at: item.updated_at,
            });
        }

        self.audit_vault(claims.sub, VaultAction::List, None, true);
        Ok(entries)
    }

    /// Apply a partial update to one of the owner's entries. A new
    /// secret is re-encrypted before it reaches storage.
    pub async fn vault_update(
        &self,
        token: &str,
        item_id: i64,
        update: VaultEntryUpdate,
    ) -> Result<VaultItem> {
        let claims = self.authenticate(token)?;
        self.cipher()?;

        if update.title.is_none()
            && update.username.is_none()
            && update.url.is_none()
            && update.secret.is_none()
            && update.notes.is_none()
        {
            return Err(ServiceError::Validation("no fields to update".into()));
        }
        if let Some(title) = &update.title
            && title.trim().is_empty()
        {
            return Err(ServiceError::Validation("title must not be empty".into()));
        }

        let encrypted_secret = match update.secret {
            Some(secret) => {
                if secret.is_empty() {
                    return Err(ServiceError::Validation("secret must not be empty".into()));
                }
                Some(self.cipher()?.encrypt_to_base64(secret.as_bytes())?)
            }
            None => None,
        };

        let result = self
            .items
            .update(
                claims.sub,
                item_id,
                VaultItemUpdate {
                    title: update.title,
                    username: update.username,
                    url: update.url,
                    encrypted_secret,
                    notes: update.notes,
                },
            )
            .await;

        match result {
            Ok(item) => {
                self.audit_vault(claims.sub, VaultAction::Update, Some(item.id), true);
                tracing::info!(user_id = claims.sub, item_id = item.id, "vault entry updated");
                Ok(item)
            }
            Err(err) => {
                self.audit_vault(claims.sub, VaultAction::Update, Some(item_id), false);
                Err(err.into())
            }
        }
    }

    /// Delete one of the owner's entries.
    pub async fn vault_delete(&self, token: &str, item_id: i64) -> Result<()> {
        let claims = self.authenticate(token)?;
        self.cipher()?;

        match self.items.delete(claims.sub, item_id).await {
            Ok(()) => {
                self.audit_vault(claims.sub, VaultAction::Delete, Some(item_id), true);
                tracing::info!(user_id = claims.sub, item_id, "vault entry deleted");
                Ok(())
            }
            Err(err) => {
                self.audit_vault(claims.sub, VaultAction::Delete, Some(item_id), false);
                Err(err.into())
            }
        }
    }

    // -- Maintenance --------------------------------------------------------

    /// One maintenance pass: drop lockout entries with no failures left
    /// in the window and delete audit partitions past retention.
    pub fn run_maintenance(&self) {
        let now = Utc::now();
        let dropped = self.guard.sweep(now);
        match self.audit.retention_sweep(self.audit_retention_days, now) {
            Ok(removed) => {
                tracing::debug!(
                    stale_identifiers = dropped,
                    removed_partitions = removed,
                    "maintenance pass complete"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "audit retention sweep failed");
            }
        }
    }

    /// Run [`SecurityService::run_maintenance`] on a fixed interval until
    /// the returned handle is aborted.
    ///
    /// Takes the service behind an [`Arc`] so the loop shares the same
    /// lockout state as the request path; clone the handle before
    /// spawning.
    pub fn spawn_maintenance(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // interval fires immediately; consume the first tick so the
            // initial pass happens one period in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.run_maintenance();
            }
        })
    }

    // -- Internal helpers ---------------------------------------------------

    /// PBKDF2 is CPU-bound, so hashing runs on the blocking pool.
    async fn hash_password(&self, password: String) -> Result<String> {
        let credentials = self.credentials.clone();
        let hash = tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| ServiceError::Internal(format!("hash task failed: {e}")))?;
        hash.map_err(|e| match e {
            SecurityError::Credential { reason } => ServiceError::Validation(reason),
            other => ServiceError::Internal(other.to_string()),
        })
    }

    /// Record a failed attempt, audit it, and report how many tries the
    /// identifier has left. Crossing the threshold is audited right away.
    fn failed_login(&self, identifier: &str, username: &str, reason: &str) -> LoginOutcome {
        let now = Utc::now();
        self.guard.record_failure(identifier, now);
        self.audit.append(
            AuditEvent::FailedLogin {
                username: username.to_string(),
                identifier: identifier.to_string(),
                reason: reason.to_string(),
            },
            now,
        );
        tracing::warn!(identifier, username, reason, "login attempt failed");

        match self.guard.check(identifier, now) {
            LockoutStatus::Allowed { attempts_left } => {
                LoginOutcome::InvalidCredentials { attempts_left }
            }
            LockoutStatus::Locked { attempt_count, .. } => {
                self.audit.append(
                    AuditEvent::BruteForceDetected {
                        identifier: identifier.to_string(),
                        attempt_count,
                    },
                    now,
                );
                LoginOutcome::InvalidCredentials { attempts_left: 0 }
            }
        }
    }

    /// The vault cipher, or [`ServiceError::CryptoConfig`] when this
    /// deployment has no vault key.
    fn cipher(&self) -> Result<&VaultCipher> {
        self.cipher.as_ref().ok_or_else(|| {
            tracing::error!("vault operation attempted without a vault key");
            ServiceError::CryptoConfig
        })
    }

    fn audit_vault(&self, user_id: i64, action: VaultAction, item_id: Option<i64>, success: bool) {
        self.audit.append(
            AuditEvent::VaultAccess {
                user_id,
                action,
                item_id,
                success,
            },
            Utc::now(),
        );
    }

    /// Audit a blob that failed authenticated decryption.
    fn flag_undecryptable(&self, user_id: i64, item_id: i64) {
        tracing::error!(user_id, item_id, "vault blob failed authenticated decryption");
        self.audit.append(
            AuditEvent::SuspiciousActivity {
                description: format!("vault item {item_id} failed authenticated decryption"),
                user_id: Some(user_id),
            },
            Utc::now(),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
