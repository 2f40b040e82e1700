//! Expense and split validation.
//!
//! Checks run in two passes: [`validate_expense_input`] looks only at the request and runs
//! before any store read, [`validate_against_group`] needs the group's current members.
//! Both run before anything is written.

use crate::constants::{AMOUNT_SCALE, MAX_DESCRIPTION_LEN, SPLIT_TOLERANCE};
use crate::core::errors::LedgerError;
use crate::core::models::{GroupWithMembers, NewExpense, UserId};
use log::warn;
use rust_decimal::Decimal;
use std::collections::HashSet;

pub fn validate_string_input(field: &str, value: &str, max_length: usize) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::invalid_input(
            field,
            format!("Invalid {}", field),
            format!("{} cannot be empty", field),
        ));
    }
    if value.chars().count() > max_length {
        return Err(LedgerError::invalid_input(
            field,
            format!("{} Too Long", field),
            format!("{} cannot exceed {} characters", field, max_length),
        ));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(LedgerError::invalid_input(
            field,
            format!("Invalid {}", field),
            format!("{} contains invalid characters", field),
        ));
    }
    Ok(())
}

fn validate_amount(field: &str, amount: Decimal, allow_zero: bool) -> Result<(), LedgerError> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::invalid_input(
            field,
            "Invalid Amount",
            "Amount cannot be negative",
        ));
    }
    if amount.is_zero() && !allow_zero {
        return Err(LedgerError::invalid_input(
            field,
            "Invalid Amount",
            "Amount must be greater than 0",
        ));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::invalid_input(
            field,
            "Invalid Amount",
            format!("Amount cannot have more than {} decimal places", AMOUNT_SCALE),
        ));
    }
    Ok(())
}

/// Request-only checks: amounts, description, and split user uniqueness.
pub fn validate_expense_input(input: &NewExpense) -> Result<(), LedgerError> {
    validate_amount("total_amount", input.total_amount, false)?;
    if let Some(description) = &input.description {
        validate_string_input("description", description, MAX_DESCRIPTION_LEN)?;
    }
    if input.splits.is_empty() {
        return Err(LedgerError::invalid_input(
            "splits",
            "Invalid splits",
            "At least one split is required",
        ));
    }

    let mut seen = HashSet::with_capacity(input.splits.len());
    for split in &input.splits {
        validate_amount("share_amount", split.share_amount, true)?;
        if !seen.insert(split.user_id) {
            warn!(
                "Duplicate split user {} in expense for group {}",
                split.user_id, input.group_id
            );
            return Err(LedgerError::invalid_input(
                "splits",
                "Duplicate split user",
                format!("User {} appears in more than one split", split.user_id),
            ));
        }
    }
    Ok(())
}

/// Membership and share-sum checks against the group as currently stored.
pub fn validate_against_group(input: &NewExpense, group: &GroupWithMembers) -> Result<(), LedgerError> {
    let mut offenders: Vec<UserId> = Vec::new();
    if let Some(payer) = input.payer_user_id {
        if !group.is_member(payer) {
            offenders.push(payer);
        }
    }
    for split in &input.splits {
        if !group.is_member(split.user_id) && !offenders.contains(&split.user_id) {
            offenders.push(split.user_id);
        }
    }
    if !offenders.is_empty() {
        warn!("Users {:?} are not members of group {}", offenders, group.group.id);
        return Err(LedgerError::InvalidMembership {
            group_id: group.group.id,
            user_ids: offenders,
        });
    }

    let shares: Decimal = input.splits.iter().map(|s| s.share_amount).sum();
    if (shares - input.total_amount).abs() > SPLIT_TOLERANCE {
        warn!(
            "Split shares {} do not match total {} in group {}",
            shares, input.total_amount, group.group.id
        );
        return Err(LedgerError::ShareSumMismatch {
            shares,
            total: input.total_amount,
        });
    }
    Ok(())
}
