use super::ids::{GroupId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Ordered (group, debtor, creditor) triple identifying one ledger row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BalanceKey {
    pub group_id: GroupId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
}

impl BalanceKey {
    pub fn new(group_id: GroupId, from_user_id: UserId, to_user_id: UserId) -> Self {
        BalanceKey {
            group_id,
            from_user_id,
            to_user_id,
        }
    }

    /// The same pair in the opposite direction.
    pub fn reversed(&self) -> Self {
        BalanceKey {
            group_id: self.group_id,
            from_user_id: self.to_user_id,
            to_user_id: self.from_user_id,
        }
    }
}

/// `from_user_id` owes `to_user_id` the amount `amount_owed`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Balance {
    pub group_id: GroupId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount_owed: Decimal,
    pub last_updated: DateTime<Utc>,
}
