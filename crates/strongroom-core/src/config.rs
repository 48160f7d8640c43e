//! Runtime configuration for the security subsystem.
//!
//! Secrets ride in as raw bytes and never appear in `Debug` output. The
//! usual entry points are [`SecurityConfig::from_env`] for deployments and
//! [`SecurityConfig::generate`] for tests and throwaway instances.

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Duration;
use ring::rand::{SecureRandom, SystemRandom};

use crate::cipher;
use crate::error::{Result, SecurityError};
use crate::{audit, lockout};

/// Environment variable holding the token-signing secret (required).
pub const ENV_TOKEN_SECRET: &str = "STRONGROOM_TOKEN_SECRET";
/// Environment variable holding the base64-encoded 32-byte vault key.
pub const ENV_VAULT_KEY: &str = "STRONGROOM_VAULT_KEY";
/// Environment variable overriding the lockout window, in seconds.
pub const ENV_LOCKOUT_WINDOW_SECS: &str = "STRONGROOM_LOCKOUT_WINDOW_SECS";
/// Environment variable overriding the lockout attempt threshold.
pub const ENV_MAX_ATTEMPTS: &str = "STRONGROOM_MAX_ATTEMPTS";
/// Environment variable overriding audit retention, in days.
pub const ENV_AUDIT_RETENTION_DAYS: &str = "STRONGROOM_AUDIT_RETENTION_DAYS";
/// Environment variable overriding the audit log directory.
pub const ENV_AUDIT_DIR: &str = "STRONGROOM_AUDIT_DIR";

/// Default audit log directory, relative to the working directory.
pub const DEFAULT_AUDIT_DIR: &str = "security-logs";

/// Assembled security settings.
#[derive(Clone)]
pub struct SecurityConfig {
    /// HMAC key material for session tokens.
    pub token_secret: Vec<u8>,
    /// 32-byte AES key for vault encryption. `None` disables vault
    /// operations while the rest of the subsystem keeps working.
    pub vault_key: Option<Vec<u8>>,
    /// Sliding window for failed-login accounting.
    pub lockout_window: Duration,
    /// Failures within the window before an identifier locks.
    pub max_attempts: usize,
    /// Age at which audit partitions become eligible for deletion.
    pub audit_retention_days: i64,
    /// Directory receiving `security-YYYY-MM-DD.log` files.
    pub audit_dir: PathBuf,
}

impl SecurityConfig {
    /// Build a config from explicit key material, with default lockout and
    /// retention settings.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::CryptoConfig`] when `token_secret` is
    /// empty or `vault_key` is not exactly 32 bytes.
    pub fn new(token_secret: Vec<u8>, vault_key: Option<Vec<u8>>) -> Result<Self> {
        if token_secret.is_empty() {
            return Err(SecurityError::CryptoConfig {
                reason: "token secret must not be empty".into(),
            });
        }
        if let Some(key) = &vault_key {
            if key.len() != cipher::KEY_LEN {
                return Err(SecurityError::CryptoConfig {
                    reason: format!(
                        "vault key must be {} bytes, got {}",
                        cipher::KEY_LEN,
                        key.len()
                    ),
                });
            }
        }

        Ok(Self {
            token_secret,
            vault_key,
            lockout_window: Duration::seconds(lockout::DEFAULT_WINDOW_SECS),
            max_attempts: lockout::DEFAULT_MAX_ATTEMPTS,
            audit_retention_days: audit::DEFAULT_RETENTION_DAYS,
            audit_dir: PathBuf::from(DEFAULT_AUDIT_DIR),
        })
    }

    /// Read configuration from `STRONGROOM_*` environment variables.
    ///
    /// [`ENV_TOKEN_SECRET`] is required. [`ENV_VAULT_KEY`] is optional and
    /// must decode from standard base64 to 32 bytes when present. Unset
    /// tuning variables fall back to their defaults; empty values count as
    /// unset.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Config`] for a missing secret or an
    /// unparseable override, [`SecurityError::CryptoConfig`] for invalid
    /// key material.
    pub fn from_env() -> Result<Self> {
        let token_secret = env_var(ENV_TOKEN_SECRET).ok_or_else(|| SecurityError::Config {
            reason: format!("{ENV_TOKEN_SECRET} must be set and non-empty"),
        })?;

        let vault_key = match env_var(ENV_VAULT_KEY) {
            Some(encoded) => Some(decode_vault_key(&encoded)?),
            None => None,
        };

        let mut config = Self::new(token_secret.into_bytes(), vault_key)?;

        if let Some(secs) = env_parse::<i64>(ENV_LOCKOUT_WINDOW_SECS)? {
            if secs <= 0 {
                return Err(SecurityError::Config {
                    reason: format!("{ENV_LOCKOUT_WINDOW_SECS} must be positive"),
                });
            }
            config.lockout_window = Duration::seconds(secs);
        }
        if let Some(attempts) = env_parse::<usize>(ENV_MAX_ATTEMPTS)? {
            if attempts == 0 {
                return Err(SecurityError::Config {
                    reason: format!("{ENV_MAX_ATTEMPTS} must be at least 1"),
                });
            }
            config.max_attempts = attempts;
        }
        if let Some(days) = env_parse::<i64>(ENV_AUDIT_RETENTION_DAYS)? {
            if days <= 0 {
                return Err(SecurityError::Config {
                    reason: format!("{ENV_AUDIT_RETENTION_DAYS} must be positive"),
                });
            }
            config.audit_retention_days = days;
        }
        if let Some(dir) = env_var(ENV_AUDIT_DIR) {
            config.audit_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Mint a config with freshly generated random key material, writing
    /// audit entries under `audit_dir`. Intended for tests and ephemeral
    /// instances; production deployments should supply stable keys.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Internal`] when the system RNG fails.
    pub fn generate(audit_dir: impl Into<PathBuf>) -> Result<Self> {
        let rng = SystemRandom::new();
        let mut token_secret = vec![0u8; 32];
        let mut vault_key = vec![0u8; cipher::KEY_LEN];
        rng.fill(&mut token_secret)
            .map_err(|_| SecurityError::Internal("system RNG failure".into()))?;
        rng.fill(&mut vault_key)
            .map_err(|_| SecurityError::Internal("system RNG failure".into()))?;

        let mut config = Self::new(token_secret, Some(vault_key))?;
        config.audit_dir = audit_dir.into();
        Ok(config)
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("token_secret_len", &self.token_secret.len())
            .field("vault_key_set", &self.vault_key.is_some())
            .field("lockout_window_secs", &self.lockout_window.num_seconds())
            .field("max_attempts", &self.max_attempts)
            .field("audit_retention_days", &self.audit_retention_days)
            .field("audit_dir", &self.audit_dir)
            .finish()
    }
}

fn decode_vault_key(encoded: &str) -> Result<Vec<u8>> {
    let key = BASE64
        .decode(encoded)
        .map_err(|_| SecurityError::CryptoConfig {
            reason: format!("{ENV_VAULT_KEY} is not valid base64"),
        })?;
    if key.len() != cipher::KEY_LEN {
        return Err(SecurityError::CryptoConfig {
            reason: format!(
                "{} must decode to {} bytes, got {}",
                ENV_VAULT_KEY,
                cipher::KEY_LEN,
                key.len()
            ),
        });
    }
    Ok(key)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| SecurityError::Config {
                reason: format!("{name} must be a number, got {raw:?}"),
            }),
        None => Ok(None),
    }
}
