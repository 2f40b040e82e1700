use super::group::Member;
use super::ids::{ExpenseId, GroupId, SplitId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Expense {
    pub id: ExpenseId,
    pub group_id: GroupId,
    /// Expenses without a payer are recorded but never touch the balance ledger.
    pub payer_user_id: Option<UserId>,
    pub description: Option<String>,
    pub total_amount: Decimal,
    pub expense_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One member's portion of an expense.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Split {
    pub id: SplitId,
    pub expense_id: ExpenseId,
    pub user_id: UserId,
    pub share_amount: Decimal,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

/// An expense together with its splits and the payer's membership record.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpenseDetails {
    #[serde(flatten)]
    pub expense: Expense,
    pub splits: Vec<Split>,
    pub payer: Option<Member>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    pub expenses: Vec<ExpenseDetails>,
    pub total_amount: Decimal,
    pub unpaid_amount: Decimal,
}

/// Caller input for a single split.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NewSplit {
    pub user_id: UserId,
    pub share_amount: Decimal,
    #[serde(default)]
    pub is_paid: bool,
}

/// Caller input for `create_expense`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NewExpense {
    pub group_id: GroupId,
    pub payer_user_id: Option<UserId>,
    pub description: Option<String>,
    pub total_amount: Decimal,
    pub expense_date: Option<DateTime<Utc>>,
    pub splits: Vec<NewSplit>,
}
