//! Append-only security audit log.
//!
//! One JSON object per line, one file per UTC calendar day
//! (`security-YYYY-MM-DD.log`). Writes are best-effort: a failed append is
//! reported through `tracing` and the triggering security operation
//! carries on. The log is observability, not a correctness dependency of
//! the decision it describes.
//!
//! Entries never contain full tokens or plaintext secrets. Token values
//! pass through [`token_prefix`] before they reach an event.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SecurityError};

/// Default retention horizon for partition files, in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// How many leading characters of a token survive redaction.
const TOKEN_PREFIX_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Event model
// ---------------------------------------------------------------------------

/// Severity attached to every entry, for downstream alerting triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Vault operation recorded in an [`AuditEvent::VaultAccess`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultAction {
    Create,
    List,
    Update,
    Delete,
}

impl VaultAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for VaultAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security-relevant event kinds and their payloads.
///
/// The `identifier` fields carry the caller-supplied lockout identifier
/// (conventionally "address-username"), never secret material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    /// An account was created (or creation was refused).
    Signup { username: String, success: bool },
    /// A login succeeded.
    Login { username: String, identifier: String },
    /// A session ended at the caller's request.
    Logout { username: String },
    /// A login attempt failed.
    FailedLogin {
        username: String,
        identifier: String,
        reason: String,
    },
    /// An identifier hit the lockout threshold.
    BruteForceDetected {
        identifier: String,
        attempt_count: usize,
    },
    /// A transport-level rate limit fired. Emitted by the embedding
    /// process, which owns request-level limits.
    RateLimitExceeded { identifier: String, endpoint: String },
    /// A vault item was touched.
    VaultAccess {
        user_id: i64,
        action: VaultAction,
        item_id: Option<i64>,
        success: bool,
    },
    /// Something that warrants investigation (tampered blob, unparseable
    /// stored hash).
    SuspiciousActivity {
        description: String,
        user_id: Option<i64>,
    },
    /// A session token was minted.
    TokenIssued { user_id: i64, token_prefix: String },
    /// A presented token failed verification.
    TokenValidationFailed { reason: String, token_prefix: String },
}

impl AuditEvent {
    /// Fixed severity for this event kind.
    pub fn severity(&self) -> Severity {
        match self {
            Self::FailedLogin { .. }
            | Self::RateLimitExceeded { .. }
            | Self::TokenValidationFailed { .. } => Severity::Warning,
            Self::BruteForceDetected { .. } | Self::SuspiciousActivity { .. } => {
                Severity::Critical
            }
            Self::Signup { .. }
            | Self::Login { .. }
            | Self::Logout { .. }
            | Self::VaultAccess { .. }
            | Self::TokenIssued { .. } => Severity::Info,
        }
    }

    /// Wire label of this event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Signup { .. } => "SIGNUP",
            Self::Login { .. } => "LOGIN",
            Self::Logout { .. } => "LOGOUT",
            Self::FailedLogin { .. } => "FAILED_LOGIN",
            Self::BruteForceDetected { .. } => "BRUTE_FORCE_DETECTED",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::VaultAccess { .. } => "VAULT_ACCESS",
            Self::SuspiciousActivity { .. } => "SUSPICIOUS_ACTIVITY",
            Self::TokenIssued { .. } => "TOKEN_ISSUED",
            Self::TokenValidationFailed { .. } => "TOKEN_VALIDATION_FAILED",
        }
    }
}

/// Shape of one serialized line: timestamp, then the tagged event with its
/// fields, then severity.
#[derive(Serialize)]
struct AuditRecord<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a AuditEvent,
    severity: Severity,
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// Day-partitioned JSONL audit writer.
pub struct AuditLog {
    dir: PathBuf,
    // Appends hold this across serialize-and-write, so concurrent callers
    // cannot interleave mid-line within a partition.
    writer: Mutex<()>,
}

impl AuditLog {
    /// Open an audit log rooted at `dir`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Io`] when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        tracing::debug!(dir = %dir.display(), "opened audit log");
        Ok(Self {
            dir,
            writer: Mutex::new(()),
        })
    }

    /// Directory holding the partition files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append `event` with timestamp `now`.
    ///
    /// Best-effort: failures are reported via `tracing::error!` and
    /// swallowed, never surfaced to the security operation that triggered
    /// the entry.
    pub fn append(&self, event: AuditEvent, now: DateTime<Utc>) {
        if let Err(e) = self.try_append(&event, now) {
            tracing::error!(error = %e, event = event.kind(), "audit append failed");
        }
    }

    fn try_append(&self, event: &AuditEvent, now: DateTime<Utc>) -> Result<()> {
        let record = AuditRecord {
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
            severity: event.severity(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.partition_path(now.date_naive());

        let _guard = self
            .writer
            .lock()
            .map_err(|_| SecurityError::Internal("audit writer lock poisoned".into()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }

    /// Delete partition files older than `max_age_days` relative to `now`.
    ///
    /// Returns how many files were removed. A file that fails to delete is
    /// reported and skipped; filenames that are not `security-*.log`
    /// partitions are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Io`] when the directory cannot be read.
    pub fn retention_sweep(&self, max_age_days: i64, now: DateTime<Utc>) -> Result<usize> {
        let horizon = now.date_naive() - chrono::Duration::days(max_age_days);
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(date) = partition_date(&name.to_string_lossy()) else {
                continue;
            };
            if date >= horizon {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    removed += 1;
                    tracing::info!(
                        file = %entry.path().display(),
                        "removed expired audit partition"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        file = %entry.path().display(),
                        "failed to remove expired audit partition"
                    );
                }
            }
        }

        Ok(removed)
    }

    /// Partition file path for `date`.
    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("security-{}.log", date.format("%Y-%m-%d")))
    }
}

/// Parse the partition date out of a `security-YYYY-MM-DD.log` filename.
fn partition_date(name: &str) -> Option<NaiveDate> {
    let date = name.strip_prefix("security-")?.strip_suffix(".log")?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Redact a token for logging: the first 10 characters plus a marker.
///
/// The prefix alone is not reversible into a usable credential.
pub fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_PREFIX_LEN).collect();
    format!("{prefix}...")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
