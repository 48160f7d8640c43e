//! Error types for the strongroom-service crate.
//!
//! [`ServiceError`] is what embedding callers (an HTTP layer, a CLI) see.
//! Messages are written for end users: they never distinguish a wrong
//! password from an unknown username, and storage or crypto detail stays
//! out of the display text.

use strongroom_core::SecurityError;
use strongroom_store::StoreError;
use thiserror::Error;

/// Alias for `Result<T, ServiceError>`.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by [`crate::SecurityService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    // -- Caller errors ------------------------------------------------------
    /// The request was malformed (empty username, nothing to update).
    #[error("{0}")]
    Validation(String),

    /// The username is already taken.
    #[error("username is already taken")]
    Conflict,

    /// Authentication failed. Covers bad credentials and bad tokens alike.
    #[error("invalid credentials")]
    Unauthorized,

    /// The requested record does not exist, or belongs to someone else.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    // -- Server errors ------------------------------------------------------
    /// Vault encryption is not configured on this deployment.
    #[error("vault encryption is not configured")]
    CryptoConfig,

    /// The persistence layer failed.
    #[error("storage error")]
    Storage(#[source] StoreError),

    /// Unexpected internal failure. The detail goes to logs, not callers.
    #[error("internal error")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::Conflict,
            StoreError::NotFound { entity, .. } => Self::NotFound { entity },
            StoreError::InvalidArgument(reason) => Self::Validation(reason),
            other => Self::Storage(other),
        }
    }
}

impl From<SecurityError> for ServiceError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::TokenExpired | SecurityError::TokenInvalid { .. } => Self::Unauthorized,
            SecurityError::CryptoConfig { .. } => Self::CryptoConfig,
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_reveals_nothing() {
        assert_eq!(ServiceError::Unauthorized.to_string(), "invalid credentials");
    }

    #[test]
    fn storage_detail_stays_out_of_display() {
        let err = ServiceError::from(StoreError::TaskJoin("worker died".into()));
        assert_eq!(err.to_string(), "storage error");
    }

    #[test]
    fn store_conflict_maps_to_conflict() {
        let err = ServiceError::from(StoreError::Conflict {
            entity: "user",
            key: "alice".into(),
        });
        assert!(matches!(err, ServiceError::Conflict));
    }

    #[test]
    fn store_not_found_keeps_the_entity() {
        let err = ServiceError::from(StoreError::NotFound {
            entity: "vault item",
            id: "7".into(),
        });
        match err {
            ServiceError::NotFound { entity } => assert_eq!(entity, "vault item"),
            other => panic!("expected NotFound, got: {other}"),
        }
    }

    #[test]
    fn token_errors_map_to_unauthorized() {
        assert!(matches!(
            ServiceError::from(SecurityError::TokenExpired),
            ServiceError::Unauthorized
        ));
        assert!(matches!(
            ServiceError::from(SecurityError::TokenInvalid {
                reason: "signature mismatch".into()
            }),
            ServiceError::Unauthorized
        ));
    }

    #[test]
    fn missing_key_maps_to_crypto_config() {
        let err = ServiceError::from(SecurityError::CryptoConfig {
            reason: "key must be 32 bytes".into(),
        });
        assert!(matches!(err, ServiceError::CryptoConfig));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServiceError>();
    }
}
