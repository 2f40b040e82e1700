use crate::core::errors::LedgerError;
use crate::core::ledger::DebtDelta;
use crate::core::models::{
    Balance, Expense, ExpenseDetails, ExpenseId, Group, GroupId, GroupWithMembers, Member, Split, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;

/// A single staged write. A batch of these is applied by [`Storage::apply`] all-or-nothing.
#[derive(Clone, Debug)]
pub enum WriteOp {
    InsertGroup(Group),
    /// Replaces the stored group row with the same id.
    UpdateGroup(Group),
    /// Removes the group and its memberships. Refused while expenses or open ledger rows remain.
    DeleteGroup(GroupId),
    InsertMember(Member),
    DeleteMember { group_id: GroupId, user_id: UserId },
    InsertExpense(Expense),
    InsertSplit(Split),
    /// Removes the expense and every split it owns.
    DeleteExpense(ExpenseId),
    /// Nets the delta against the reverse row, then upserts the forward row. Rows that
    /// reach zero are removed.
    ApplyDebt { delta: DebtDelta, at: DateTime<Utc> },
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Applies every op in order as one transaction. On any failure nothing is visible.
    async fn apply(&self, ops: Vec<WriteOp>) -> Result<(), LedgerError>;

    async fn get_group(&self, group_id: GroupId) -> Result<Option<GroupWithMembers>, LedgerError>;
    async fn get_user_groups(&self, user_id: UserId) -> Result<Vec<Group>, LedgerError>;
    async fn get_expense(&self, expense_id: ExpenseId) -> Result<Option<ExpenseDetails>, LedgerError>;
    async fn get_expenses_by_group(&self, group_id: GroupId) -> Result<Vec<ExpenseDetails>, LedgerError>;
    async fn get_balances(&self, group_id: GroupId) -> Result<Vec<Balance>, LedgerError>;
}

/// Scoped unit of work. Writes are staged here and reach the store only on [`commit`];
/// dropping the unit of work discards them.
///
/// [`commit`]: UnitOfWork::commit
pub struct UnitOfWork<'s, S: Storage + ?Sized> {
    storage: &'s S,
    ops: Vec<WriteOp>,
}

impl<'s, S: Storage + ?Sized> UnitOfWork<'s, S> {
    pub fn begin(storage: &'s S) -> Self {
        UnitOfWork {
            storage,
            ops: Vec::new(),
        }
    }

    pub fn insert_group(&mut self, group: Group) {
        self.ops.push(WriteOp::InsertGroup(group));
    }

    pub fn update_group(&mut self, group: Group) {
        self.ops.push(WriteOp::UpdateGroup(group));
    }

    pub fn delete_group(&mut self, group_id: GroupId) {
        self.ops.push(WriteOp::DeleteGroup(group_id));
    }

    pub fn insert_member(&mut self, member: Member) {
        self.ops.push(WriteOp::InsertMember(member));
    }

    pub fn delete_member(&mut self, group_id: GroupId, user_id: UserId) {
        self.ops.push(WriteOp::DeleteMember { group_id, user_id });
    }

    pub fn insert_expense(&mut self, expense: Expense) {
        self.ops.push(WriteOp::InsertExpense(expense));
    }

    pub fn insert_split(&mut self, split: Split) {
        self.ops.push(WriteOp::InsertSplit(split));
    }

    pub fn delete_expense(&mut self, expense_id: ExpenseId) {
        self.ops.push(WriteOp::DeleteExpense(expense_id));
    }

    pub fn apply_debt(&mut self, delta: DebtDelta, at: DateTime<Utc>) {
        self.ops.push(WriteOp::ApplyDebt { delta, at });
    }

    pub fn staged(&self) -> usize {
        self.ops.len()
    }

    pub async fn commit(mut self) -> Result<(), LedgerError> {
        let ops = std::mem::take(&mut self.ops);
        debug!("Committing unit of work with {} writes", ops.len());
        self.storage.apply(ops).await
    }

    /// Discards staged writes. Equivalent to dropping the unit of work.
    pub fn rollback(self) {}
}

impl<S: Storage + ?Sized> Drop for UnitOfWork<'_, S> {
    fn drop(&mut self) {
        if !self.ops.is_empty() {
            debug!("Rolling back unit of work with {} staged writes", self.ops.len());
        }
    }
}

pub mod in_memory;
