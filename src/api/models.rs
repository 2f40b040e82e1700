use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::errors::{ErrorKind, LedgerError, PersistenceError};
use crate::core::models::{GroupId, NewExpense, NewSplit, UserId};

// Request structs for JSON payloads
#[derive(Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub created_by: UserId,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateExpenseRequest {
    pub payer_user_id: Option<UserId>,
    pub description: Option<String>,
    #[schema(value_type = String, example = "90.00")]
    pub total_amount: Decimal,
    pub expense_date: Option<DateTime<Utc>>,
    pub splits: Vec<NewSplit>,
}

impl CreateExpenseRequest {
    pub fn into_new_expense(self, group_id: GroupId) -> NewExpense {
        NewExpense {
            group_id,
            payer_user_id: self.payer_user_id,
            description: self.description,
            total_amount: self.total_amount,
            expense_date: self.expense_date,
            splits: self.splits,
        }
    }
}

// Error response struct
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub retryable: bool,
}

// Newtype wrapper for LedgerError to implement IntoResponse
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::GroupNotFound(_) | LedgerError::ExpenseNotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InvalidMembership { .. }
            | LedgerError::ShareSumMismatch { .. }
            | LedgerError::InvalidInput(..) => StatusCode::BAD_REQUEST,
            LedgerError::Persistence(PersistenceError::UniqueViolation(_))
            | LedgerError::Persistence(PersistenceError::ForeignKeyViolation(_)) => StatusCode::CONFLICT,
            LedgerError::Persistence(PersistenceError::LockTimeout(_))
            | LedgerError::Persistence(PersistenceError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
