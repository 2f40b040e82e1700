use crate::core::models::ids::{ExpenseId, GroupId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

impl FieldError {
    pub fn new(field: &str, title: impl Into<String>, description: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            title: title.into(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// Failures raised by the backing store. Any of these aborts the whole unit of work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// A primary-key or unique constraint rejected the write
    #[error("unique constraint `{0}` violated")]
    UniqueViolation(String),

    /// A referenced row is missing, or a referenced row is still in use
    #[error("foreign key constraint `{0}` violated")]
    ForeignKeyViolation(String),

    /// The store lock could not be acquired in time
    #[error("timed out waiting for store lock after {0} ms")]
    LockTimeout(u64),

    /// The store cannot serve requests
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Stable classification a client can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidMembership,
    ShareSumMismatch,
    Validation,
    Persistence,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Group with given ID not found
    #[error("Group {0} not found")]
    GroupNotFound(GroupId),

    /// Expense with given ID not found
    #[error("Expense {0} not found")]
    ExpenseNotFound(ExpenseId),

    /// Payer or split users are not members of the group
    #[error("The following users are not members of group {group_id}: {}", join_ids(.user_ids))]
    InvalidMembership { group_id: GroupId, user_ids: Vec<UserId> },

    /// Split amounts don't add up to the expense total
    #[error("Total of share amounts ({shares}) does not match expense total ({total})")]
    ShareSumMismatch { shares: Decimal, total: Decimal },

    /// Generic input validation error with detailed field information
    #[error("Invalid input for field `{0}`: {1}")]
    InvalidInput(String, FieldError),

    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::GroupNotFound(_) | LedgerError::ExpenseNotFound(_) => ErrorKind::NotFound,
            LedgerError::InvalidMembership { .. } => ErrorKind::InvalidMembership,
            LedgerError::ShareSumMismatch { .. } => ErrorKind::ShareSumMismatch,
            LedgerError::InvalidInput(..) => ErrorKind::Validation,
            LedgerError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Whether repeating the same call may succeed. Only transient store failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Persistence(PersistenceError::LockTimeout(_) | PersistenceError::Unavailable(_))
        )
    }

    pub fn invalid_input(field: &str, title: impl Into<String>, description: impl Into<String>) -> Self {
        LedgerError::InvalidInput(field.to_string(), FieldError::new(field, title, description))
    }
}

fn join_ids(ids: &[UserId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
