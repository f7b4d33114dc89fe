/// Storage errors
///
/// Every repository and scoped-transaction operation reports failures through
/// [`StoreError`]. Raw `sqlx` errors are classified by SQLSTATE so callers
/// can tell a missing row from a constraint conflict from a policy rejection.

use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// SQLSTATE raised when a row-level security `WITH CHECK` rejects a write
const INSUFFICIENT_PRIVILEGE: &str = "42501";
const QUERY_CANCELED: &str = "57014";

#[derive(Debug, Error)]
pub enum StoreError {
    /// The transaction could not be opened or the tenant marker could not be set.
    /// No work ran.
    #[error("failed to open tenant scope: {0}")]
    TenantScope(#[source] sqlx::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unique or foreign-key constraint violation
    #[error("constraint violation: {constraint}")]
    Conflict { constraint: String },

    /// A write was rejected by a row-level security policy
    #[error("row-level security policy rejected the write")]
    PolicyViolation(#[source] sqlx::Error),

    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// The unit of work exceeded its deadline and was rolled back
    #[error("database operation exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        StoreError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Name of the violated constraint, if this is a conflict
    pub fn constraint(&self) -> Option<&str> {
        match self {
            StoreError::Conflict { constraint } => Some(constraint),
            _ => None,
        }
    }

    /// Whether the server cancelled a statement for exceeding `statement_timeout`
    pub(crate) fn is_statement_timeout(&self) -> bool {
        match self {
            StoreError::Database(err) => err
                .as_database_error()
                .and_then(|db_err| db_err.code())
                .as_deref()
                == Some(QUERY_CANCELED),
            _ => false,
        }
    }
}

enum Class {
    Conflict(String),
    Check(String),
    Policy,
    Other,
}

/// Field reported for a violated check constraint
fn checked_field(constraint: &str) -> &'static str {
    match constraint {
        "tenants_slug_format" => "slug",
        "users_role_check" => "role",
        _ => "input",
    }
}

fn classify(err: &sqlx::Error) -> Class {
    let Some(db_err) = err.as_database_error() else {
        return Class::Other;
    };

    let constraint = || db_err.constraint().unwrap_or("unknown").to_string();

    match db_err.code().as_deref() {
        // unique_violation, foreign_key_violation
        Some("23505") | Some("23503") => Class::Conflict(constraint()),
        // check_violation: malformed input that slipped past validation
        Some("23514") => Class::Check(constraint()),
        Some(INSUFFICIENT_PRIVILEGE) => Class::Policy,
        _ => Class::Other,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound("row");
        }

        match classify(&err) {
            Class::Conflict(constraint) => {
                warn!(constraint = %constraint, "Constraint violation");
                StoreError::Conflict { constraint }
            }
            Class::Check(constraint) => {
                warn!(constraint = %constraint, "Check constraint violation");
                StoreError::validation(checked_field(&constraint), "violates a data constraint")
            }
            Class::Policy => {
                error!(error = %err, "Row-level security policy rejected write");
                StoreError::PolicyViolation(err)
            }
            Class::Other => StoreError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_pool_errors_stay_database_errors() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(err.constraint().is_none());
    }

    #[test]
    fn test_check_constraints_name_their_field() {
        assert_eq!(checked_field("tenants_slug_format"), "slug");
        assert_eq!(checked_field("users_role_check"), "role");
        assert_eq!(checked_field("some_future_check"), "input");
    }

    #[test]
    fn test_validation_message() {
        let err = StoreError::validation("limit", "must be between 1 and 100");
        assert_eq!(err.to_string(), "invalid limit: must be between 1 and 100");
    }

    #[test]
    fn test_timeout_message_names_deadline() {
        let err = StoreError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }
}
