//! Pairwise debt ledger updates.
//!
//! An expense with payer `P` produces one [`DebtDelta`] per split whose user is not `P`:
//! the split user owes `P` their share. Deltas are staged on a unit of work and applied by
//! the store with [`apply_debt`], which nets the new debt against any debt running the
//! other way before growing the forward row.
//!
//! For every ordered pair the directional difference `owed(u -> P) - owed(P -> u)` moves by
//! exactly the delta amount, and no row ever goes negative.

use crate::core::models::{BalanceKey, Expense, Split};
use rust_decimal::Decimal;

/// `key.from_user_id` takes on `amount` of new debt toward `key.to_user_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebtDelta {
    pub key: BalanceKey,
    pub amount: Decimal,
}

/// Result of netting a new debt against a pair of directional rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NettedDebt {
    /// New value of the forward row (debtor -> creditor).
    pub forward: Decimal,
    /// New value of the reverse row (creditor -> debtor).
    pub reverse: Decimal,
    /// Portion of the debt absorbed by the reverse row.
    pub offset: Decimal,
}

/// Net `amount` of new debt against the current forward and reverse row values.
///
/// Missing rows are passed as zero.
pub fn apply_debt(forward: Decimal, reverse: Decimal, amount: Decimal) -> NettedDebt {
    let offset = amount.min(reverse).max(Decimal::ZERO);
    NettedDebt {
        forward: forward + (amount - offset),
        reverse: reverse - offset,
        offset,
    }
}

/// Ledger deltas created by recording `expense`. Empty when the expense has no payer.
pub fn expense_deltas(expense: &Expense, splits: &[Split]) -> Vec<DebtDelta> {
    let Some(payer) = expense.payer_user_id else {
        return Vec::new();
    };
    splits
        .iter()
        .filter(|s| s.user_id != payer && s.share_amount > Decimal::ZERO)
        .map(|s| DebtDelta {
            key: BalanceKey::new(expense.group_id, s.user_id, payer),
            amount: s.share_amount,
        })
        .collect()
}

/// Deltas that undo the contribution of `expense`: the payer takes on each share back
/// toward the split user, which nets the original debt away.
pub fn reversal_deltas(expense: &Expense, splits: &[Split]) -> Vec<DebtDelta> {
    expense_deltas(expense, splits)
        .into_iter()
        .map(|d| DebtDelta {
            key: d.key.reversed(),
            amount: d.amount,
        })
        .collect()
}
