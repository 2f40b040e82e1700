use crate::constants::{
    EXPENSE_CREATED, EXPENSE_DELETED, GROUP_CREATED, GROUP_DELETED, GROUP_UPDATED, MAX_DESCRIPTION_LEN,
    MAX_GROUP_NAME_LEN, MEMBER_ADDED, MEMBER_REMOVED,
};
use crate::core::errors::LedgerError;
use crate::core::ledger;
use crate::core::models::{
    AppLog, Balance, Expense, ExpenseDetails, ExpenseId, ExpenseSummary, Group, GroupId, GroupWithMembers, Member,
    NewExpense, Split, SplitId, UserId,
};
use crate::core::validation::{validate_against_group, validate_expense_input, validate_string_input};
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{Storage, UnitOfWork};
use chrono::Utc;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde_json::json;

pub struct LedgerService<L: LoggingService, S: Storage> {
    storage: S,
    logging: L,
}

impl<L: LoggingService, S: Storage> LedgerService<L, S> {
    pub fn new(storage: S, logging: L) -> Self {
        info!("Initializing LedgerService");
        LedgerService { storage, logging }
    }

    async fn require_group(&self, group_id: GroupId) -> Result<GroupWithMembers, LedgerError> {
        self.storage
            .get_group(group_id)
            .await?
            .ok_or(LedgerError::GroupNotFound(group_id))
    }

    async fn require_expense(&self, expense_id: ExpenseId) -> Result<ExpenseDetails, LedgerError> {
        self.storage
            .get_expense(expense_id)
            .await?
            .ok_or(LedgerError::ExpenseNotFound(expense_id))
    }

    /// Records an audit entry for a write that has already committed. A failure here is
    /// reported but does not fail the caller.
    async fn log_and_audit(
        &self,
        group_id: Option<GroupId>,
        action: &str,
        details: serde_json::Value,
        user_id: Option<UserId>,
    ) {
        if let Err(e) = self.logging.log_action(action, group_id, details, user_id).await {
            warn!("Failed to record audit entry {}: {}", action, e);
        }
    }

    pub async fn create_group(
        &self,
        name: String,
        description: Option<String>,
        created_by: UserId,
    ) -> Result<Group, LedgerError> {
        info!("Creating group '{}' for user {}", name, created_by);
        validate_string_input("name", &name, MAX_GROUP_NAME_LEN)?;
        if let Some(description) = &description {
            validate_string_input("description", description, MAX_DESCRIPTION_LEN)?;
        }

        let now = Utc::now();
        let group = Group {
            id: GroupId::new(),
            name,
            description,
            created_by,
            created_at: now,
            updated_at: now,
        };

        let mut uow = UnitOfWork::begin(&self.storage);
        uow.insert_group(group.clone());
        uow.insert_member(Member {
            group_id: group.id,
            user_id: created_by,
            is_admin: true,
            joined_at: now,
        });
        uow.commit().await?;
        debug!("Group created with ID: {}", group.id);

        self.log_and_audit(
            Some(group.id),
            GROUP_CREATED,
            json!({ "group_id": group.id, "name": group.name }),
            Some(created_by),
        )
        .await;
        Ok(group)
    }

    /// Renames a group or replaces its description. Fields left as `None` keep their value.
    pub async fn update_group(
        &self,
        group_id: GroupId,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Group, LedgerError> {
        info!("Updating group {}", group_id);
        if name.is_none() && description.is_none() {
            return Err(LedgerError::invalid_input(
                "group",
                "Nothing to update",
                "Provide a name or a description",
            ));
        }
        if let Some(name) = &name {
            validate_string_input("name", name, MAX_GROUP_NAME_LEN)?;
        }
        if let Some(description) = &description {
            validate_string_input("description", description, MAX_DESCRIPTION_LEN)?;
        }

        let mut group = self.require_group(group_id).await?.group;
        if let Some(name) = name {
            group.name = name;
        }
        if description.is_some() {
            group.description = description;
        }
        group.updated_at = Utc::now();

        let mut uow = UnitOfWork::begin(&self.storage);
        uow.update_group(group.clone());
        uow.commit().await?;
        debug!("Group updated: {:?}", group);

        self.log_and_audit(
            Some(group_id),
            GROUP_UPDATED,
            json!({ "group_id": group_id, "name": group.name, "description": group.description }),
            None,
        )
        .await;
        Ok(group)
    }

    /// Deletes a group together with its memberships. The store refuses while the group still
    /// has expenses or open balances.
    pub async fn delete_group(&self, group_id: GroupId) -> Result<(), LedgerError> {
        info!("Deleting group {}", group_id);
        let group = self.require_group(group_id).await?;

        let mut uow = UnitOfWork::begin(&self.storage);
        uow.delete_group(group_id);
        if let Err(e) = uow.commit().await {
            warn!("Could not delete group {}: {}", group_id, e);
            return Err(e);
        }

        self.log_and_audit(
            Some(group_id),
            GROUP_DELETED,
            json!({ "group_id": group_id, "name": group.group.name, "member_count": group.members.len() }),
            None,
        )
        .await;
        Ok(())
    }

    pub async fn get_group(&self, group_id: GroupId) -> Result<GroupWithMembers, LedgerError> {
        self.require_group(group_id).await
    }

    pub async fn list_user_groups(&self, user_id: UserId) -> Result<Vec<Group>, LedgerError> {
        debug!("Listing groups for user {}", user_id);
        self.storage.get_user_groups(user_id).await
    }

    pub async fn add_member(&self, group_id: GroupId, user_id: UserId, is_admin: bool) -> Result<Member, LedgerError> {
        info!("Adding user {} to group {}", user_id, group_id);
        self.require_group(group_id).await?;

        let member = Member {
            group_id,
            user_id,
            is_admin,
            joined_at: Utc::now(),
        };
        let mut uow = UnitOfWork::begin(&self.storage);
        uow.insert_member(member.clone());
        if let Err(e) = uow.commit().await {
            warn!("Could not add user {} to group {}: {}", user_id, group_id, e);
            return Err(e);
        }

        self.log_and_audit(
            Some(group_id),
            MEMBER_ADDED,
            json!({ "group_id": group_id, "user_id": user_id, "is_admin": is_admin }),
            Some(user_id),
        )
        .await;
        Ok(member)
    }

    /// Removes a membership. The store refuses while the member is still referenced by
    /// an expense, a split or a ledger row.
    pub async fn remove_member(&self, group_id: GroupId, user_id: UserId) -> Result<(), LedgerError> {
        info!("Removing user {} from group {}", user_id, group_id);
        let group = self.require_group(group_id).await?;
        if !group.is_member(user_id) {
            warn!("User {} is not a member of group {}", user_id, group_id);
            return Err(LedgerError::InvalidMembership {
                group_id,
                user_ids: vec![user_id],
            });
        }
        let is_last_admin = group.member(user_id).is_some_and(|m| m.is_admin)
            && !group.members.iter().any(|m| m.is_admin && m.user_id != user_id);
        if is_last_admin {
            warn!("Refusing to remove the last admin {} of group {}", user_id, group_id);
            return Err(LedgerError::invalid_input(
                "user_id",
                "Last admin",
                "The last admin of a group cannot be removed",
            ));
        }

        let mut uow = UnitOfWork::begin(&self.storage);
        uow.delete_member(group_id, user_id);
        uow.commit().await?;

        self.log_and_audit(
            Some(group_id),
            MEMBER_REMOVED,
            json!({ "group_id": group_id, "user_id": user_id }),
            Some(user_id),
        )
        .await;
        Ok(())
    }

    /// Validates and records an expense with its splits. When a payer is given, every other
    /// split user's share is added to what they owe the payer, in the same unit of work.
    pub async fn create_expense(&self, input: NewExpense) -> Result<ExpenseDetails, LedgerError> {
        info!(
            "Creating expense of {} in group {} with {} splits",
            input.total_amount,
            input.group_id,
            input.splits.len()
        );
        validate_expense_input(&input)?;
        let group = self.require_group(input.group_id).await?;
        validate_against_group(&input, &group)?;

        let now = Utc::now();
        let expense = Expense {
            id: ExpenseId::new(),
            group_id: input.group_id,
            payer_user_id: input.payer_user_id,
            description: input.description,
            total_amount: input.total_amount,
            expense_date: input.expense_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        let splits: Vec<Split> = input
            .splits
            .into_iter()
            .map(|s| Split {
                id: SplitId::new(),
                expense_id: expense.id,
                user_id: s.user_id,
                share_amount: s.share_amount,
                is_paid: s.is_paid,
                created_at: now,
            })
            .collect();
        let deltas = ledger::expense_deltas(&expense, &splits);

        let mut uow = UnitOfWork::begin(&self.storage);
        uow.insert_expense(expense.clone());
        for split in &splits {
            uow.insert_split(split.clone());
        }
        let delta_count = deltas.len();
        for delta in deltas {
            uow.apply_debt(delta, now);
        }
        uow.commit().await?;
        debug!(
            "Expense {} created with {} splits and {} ledger updates",
            expense.id,
            splits.len(),
            delta_count
        );

        self.log_and_audit(
            Some(expense.group_id),
            EXPENSE_CREATED,
            json!({
                "expense_id": expense.id,
                "total_amount": expense.total_amount,
                "payer_user_id": expense.payer_user_id,
                "split_user_ids": splits.iter().map(|s| s.user_id).collect::<Vec<_>>()
            }),
            expense.payer_user_id,
        )
        .await;

        let payer = expense.payer_user_id.and_then(|p| group.member(p).cloned());
        Ok(ExpenseDetails { expense, splits, payer })
    }

    pub async fn get_expense(&self, expense_id: ExpenseId) -> Result<ExpenseDetails, LedgerError> {
        self.require_expense(expense_id).await
    }

    /// Deletes an expense and its splits and takes its contribution back out of the ledger.
    pub async fn delete_expense(&self, expense_id: ExpenseId) -> Result<(), LedgerError> {
        info!("Deleting expense {}", expense_id);
        let details = self.require_expense(expense_id).await?;
        let reversal = ledger::reversal_deltas(&details.expense, &details.splits);

        let now = Utc::now();
        let mut uow = UnitOfWork::begin(&self.storage);
        uow.delete_expense(expense_id);
        for delta in reversal {
            uow.apply_debt(delta, now);
        }
        uow.commit().await?;

        self.log_and_audit(
            Some(details.expense.group_id),
            EXPENSE_DELETED,
            json!({ "expense_id": expense_id, "total_amount": details.expense.total_amount }),
            details.expense.payer_user_id,
        )
        .await;
        Ok(())
    }

    pub async fn list_expenses(&self, group_id: GroupId) -> Result<Vec<ExpenseDetails>, LedgerError> {
        self.require_group(group_id).await?;
        self.storage.get_expenses_by_group(group_id).await
    }

    /// Expenses of a group with totals computed from the stored rows on every call.
    pub async fn get_expense_summary(&self, group_id: GroupId) -> Result<ExpenseSummary, LedgerError> {
        let expenses = self.list_expenses(group_id).await?;
        let total_amount: Decimal = expenses.iter().map(|e| e.expense.total_amount).sum();
        let unpaid_amount: Decimal = expenses
            .iter()
            .flat_map(|e| e.splits.iter())
            .filter(|s| !s.is_paid)
            .map(|s| s.share_amount)
            .sum();
        debug!(
            "Summary for group {}: {} expenses, total {}, unpaid {}",
            group_id,
            expenses.len(),
            total_amount,
            unpaid_amount
        );
        Ok(ExpenseSummary {
            expenses,
            total_amount,
            unpaid_amount,
        })
    }

    /// Every open directional ledger row of the group, as stored. No netting is applied on read.
    pub async fn get_group_balances(&self, group_id: GroupId) -> Result<Vec<Balance>, LedgerError> {
        self.require_group(group_id).await?;
        self.storage.get_balances(group_id).await
    }

    pub async fn get_app_logs(&self) -> Result<Vec<AppLog>, LedgerError> {
        self.logging.get_logs().await
    }
}
