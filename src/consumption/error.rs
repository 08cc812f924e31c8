// Error types for the consumption ledger and purchase flow
// Storage-agnostic: every store implementation maps its failures onto Persistence

use thiserror::Error;
use uuid::Uuid;

/// Coarse classification used by callers to decide how to react to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-supplied data is malformed or references something unknown
    Validation,
    /// Account or beverage exists but is deactivated
    InactiveResource,
    /// Load/save failure; safe to retry
    Persistence,
    /// Resource already exists
    Conflict,
}

/// Main error type for the consumption core
///
/// A limit rejection is not represented here: it is a normal `Rejected`
/// outcome recorded in the purchase audit trail.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Field-level failures from a request DTO, kept intact for the caller
    #[error("Invalid request: {0}")]
    InvalidFields(validator::ValidationErrors),

    #[error("Account not found: {0}")]
    UnknownAccount(String),

    #[error("Beverage not found: {0}")]
    UnknownBeverage(Uuid),

    #[error("Account {0} is deactivated")]
    InactiveAccount(String),

    #[error("Beverage {0} is currently unavailable")]
    InactiveBeverage(Uuid),

    #[error("Invalid allowance policy: {0}")]
    InvalidPolicy(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The purchase record was appended but the account increment was not
    /// persisted. The account total no longer reflects the approved purchase.
    #[error("Purchase {purchase_id} recorded but account update failed: {reason}")]
    Inconsistent { purchase_id: Uuid, reason: String },
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidRequest(_)
            | LedgerError::InvalidFields(_)
            | LedgerError::UnknownAccount(_)
            | LedgerError::UnknownBeverage(_)
            | LedgerError::InvalidPolicy(_) => ErrorKind::Validation,
            LedgerError::InactiveAccount(_) | LedgerError::InactiveBeverage(_) => {
                ErrorKind::InactiveResource
            }
            LedgerError::AccountExists(_) => ErrorKind::Conflict,
            LedgerError::Persistence(_) | LedgerError::Inconsistent { .. } => {
                ErrorKind::Persistence
            }
        }
    }

    /// Only storage failures are worth retrying
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Persistence
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Persistence(err.to_string())
    }
}

impl From<validator::ValidationErrors> for LedgerError {
    fn from(err: validator::ValidationErrors) -> Self {
        LedgerError::InvalidFields(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LedgerError::UnknownAccount("ETH123456".to_string());
        assert_eq!(error.to_string(), "Account not found: ETH123456");

        let error = LedgerError::InactiveAccount("ETH123456".to_string());
        assert_eq!(error.to_string(), "Account ETH123456 is deactivated");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LedgerError::InvalidRequest("bad".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::UnknownBeverage(Uuid::nil()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::InactiveBeverage(Uuid::nil()).kind(),
            ErrorKind::InactiveResource
        );
        assert_eq!(
            LedgerError::Inconsistent {
                purchase_id: Uuid::nil(),
                reason: "disk full".into()
            }
            .kind(),
            ErrorKind::Persistence
        );
    }

    #[test]
    fn test_only_persistence_is_retriable() {
        assert!(LedgerError::Persistence("timeout".into()).is_retriable());
        assert!(!LedgerError::InvalidRequest("volume".into()).is_retriable());
        assert!(!LedgerError::InactiveAccount("ETH1".into()).is_retriable());
        assert!(!LedgerError::AccountExists("ETH1".into()).is_retriable());
    }

    #[test]
    fn test_error_from_validator_keeps_fields() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("volume_ml", validator::ValidationError::new("volume_too_small"));

        let err: LedgerError = errors.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        match err {
            LedgerError::InvalidFields(errors) => {
                assert!(errors.field_errors().contains_key("volume_ml"))
            }
            other => panic!("expected InvalidFields, got {:?}", other),
        }
    }

    #[test]
    fn test_error_from_sqlx() {
        let err: LedgerError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, LedgerError::Persistence(_)));
    }
}
