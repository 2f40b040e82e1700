use crate::core::errors::{LedgerError, PersistenceError};
use crate::core::ledger;
use crate::core::models::{
    Balance, BalanceKey, Expense, ExpenseDetails, ExpenseId, Group, GroupId, GroupWithMembers, Member, Split,
    UserId,
};
use crate::infrastructure::storage::{Storage, WriteOp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Every table sits behind one lock so a batch commits atomically across tables.
#[derive(Default)]
struct Tables {
    groups: HashMap<GroupId, Group>,
    members: BTreeMap<(GroupId, UserId), Member>,
    expenses: HashMap<ExpenseId, Expense>,
    splits: HashMap<ExpenseId, Vec<Split>>,
    balances: BTreeMap<BalanceKey, Balance>,
}

/// Inverse of one applied write, replayed newest-first when a batch fails.
enum Undo {
    RemoveGroup(GroupId),
    RestoreGroup(Group, Vec<Member>),
    RemoveMember(GroupId, UserId),
    RestoreMember(Member),
    RemoveExpense(ExpenseId),
    RestoreExpense(Expense, Vec<Split>),
    RemoveSplit(ExpenseId, UserId),
    RestoreBalance(BalanceKey, Option<Balance>),
}

#[derive(Clone)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
    lock_timeout: Duration,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        InMemoryStorage {
            tables: Arc::new(RwLock::new(Tables::default())),
            lock_timeout,
        }
    }

    fn lock_timeout_error(&self) -> LedgerError {
        PersistenceError::LockTimeout(self.lock_timeout.as_millis() as u64).into()
    }

    async fn read_tables(&self) -> Result<RwLockReadGuard<'_, Tables>, LedgerError> {
        tokio::time::timeout(self.lock_timeout, self.tables.read())
            .await
            .map_err(|_| self.lock_timeout_error())
    }

    async fn write_tables(&self) -> Result<RwLockWriteGuard<'_, Tables>, LedgerError> {
        tokio::time::timeout(self.lock_timeout, self.tables.write())
            .await
            .map_err(|_| self.lock_timeout_error())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Tables {
    fn require_group(&self, group_id: GroupId, constraint: &str) -> Result<(), PersistenceError> {
        if self.groups.contains_key(&group_id) {
            Ok(())
        } else {
            Err(PersistenceError::ForeignKeyViolation(constraint.to_string()))
        }
    }

    fn require_member(&self, group_id: GroupId, user_id: UserId, constraint: &str) -> Result<(), PersistenceError> {
        if self.members.contains_key(&(group_id, user_id)) {
            Ok(())
        } else {
            Err(PersistenceError::ForeignKeyViolation(constraint.to_string()))
        }
    }

    /// Whether any expense, split or ledger row still points at this membership.
    fn member_in_use(&self, group_id: GroupId, user_id: UserId) -> bool {
        let in_expenses = self
            .expenses
            .values()
            .filter(|e| e.group_id == group_id)
            .any(|e| {
                e.payer_user_id == Some(user_id)
                    || self
                        .splits
                        .get(&e.id)
                        .is_some_and(|splits| splits.iter().any(|s| s.user_id == user_id))
            });
        in_expenses
            || self
                .balances
                .values()
                .filter(|b| b.group_id == group_id && !b.amount_owed.is_zero())
                .any(|b| b.from_user_id == user_id || b.to_user_id == user_id)
    }

    /// Whether any expense or open ledger row still belongs to this group.
    fn group_in_use(&self, group_id: GroupId) -> bool {
        self.expenses.values().any(|e| e.group_id == group_id)
            || self
                .balances
                .values()
                .any(|b| b.group_id == group_id && !b.amount_owed.is_zero())
    }

    /// Writes a ledger row, dropping it once it is settled.
    fn set_balance(&mut self, key: BalanceKey, amount_owed: Decimal, at: DateTime<Utc>) {
        if amount_owed.is_zero() {
            self.balances.remove(&key);
            return;
        }
        self.balances.insert(
            key,
            Balance {
                group_id: key.group_id,
                from_user_id: key.from_user_id,
                to_user_id: key.to_user_id,
                amount_owed,
                last_updated: at,
            },
        );
    }

    fn apply_op(&mut self, op: WriteOp, undo: &mut Vec<Undo>) -> Result<(), PersistenceError> {
        match op {
            WriteOp::InsertGroup(group) => {
                if self.groups.contains_key(&group.id) {
                    return Err(PersistenceError::UniqueViolation("groups_pkey".to_string()));
                }
                undo.push(Undo::RemoveGroup(group.id));
                self.groups.insert(group.id, group);
            }
            WriteOp::UpdateGroup(group) => {
                // Updating a row that no longer exists changes nothing.
                if let Some(existing) = self.groups.get_mut(&group.id) {
                    let previous = std::mem::replace(existing, group);
                    undo.push(Undo::RestoreGroup(previous, Vec::new()));
                }
            }
            WriteOp::DeleteGroup(group_id) => {
                if self.group_in_use(group_id) {
                    return Err(PersistenceError::ForeignKeyViolation("groups_referenced".to_string()));
                }
                if let Some(group) = self.groups.remove(&group_id) {
                    let keys: Vec<(GroupId, UserId)> =
                        self.members.keys().filter(|(g, _)| *g == group_id).copied().collect();
                    let members = keys.iter().filter_map(|k| self.members.remove(k)).collect();
                    undo.push(Undo::RestoreGroup(group, members));
                }
            }
            WriteOp::InsertMember(member) => {
                self.require_group(member.group_id, "group_members_group_id_fkey")?;
                let key = (member.group_id, member.user_id);
                if self.members.contains_key(&key) {
                    return Err(PersistenceError::UniqueViolation("uq_group_members".to_string()));
                }
                undo.push(Undo::RemoveMember(key.0, key.1));
                self.members.insert(key, member);
            }
            WriteOp::DeleteMember { group_id, user_id } => {
                if self.member_in_use(group_id, user_id) {
                    return Err(PersistenceError::ForeignKeyViolation(
                        "group_members_referenced".to_string(),
                    ));
                }
                if let Some(member) = self.members.remove(&(group_id, user_id)) {
                    undo.push(Undo::RestoreMember(member));
                }
            }
            WriteOp::InsertExpense(expense) => {
                self.require_group(expense.group_id, "group_expenses_group_id_fkey")?;
                if let Some(payer) = expense.payer_user_id {
                    self.require_member(expense.group_id, payer, "group_expenses_payer_fkey")?;
                }
                if self.expenses.contains_key(&expense.id) {
                    return Err(PersistenceError::UniqueViolation("group_expenses_pkey".to_string()));
                }
                undo.push(Undo::RemoveExpense(expense.id));
                self.expenses.insert(expense.id, expense);
            }
            WriteOp::InsertSplit(split) => {
                let group_id = self
                    .expenses
                    .get(&split.expense_id)
                    .map(|e| e.group_id)
                    .ok_or_else(|| PersistenceError::ForeignKeyViolation("expense_splits_expense_id_fkey".to_string()))?;
                self.require_member(group_id, split.user_id, "expense_splits_member_fkey")?;
                let splits = self.splits.entry(split.expense_id).or_default();
                if splits.iter().any(|s| s.user_id == split.user_id) {
                    return Err(PersistenceError::UniqueViolation("uq_expense_splits_user".to_string()));
                }
                undo.push(Undo::RemoveSplit(split.expense_id, split.user_id));
                splits.push(split);
            }
            WriteOp::DeleteExpense(expense_id) => {
                if let Some(expense) = self.expenses.remove(&expense_id) {
                    let splits = self.splits.remove(&expense_id).unwrap_or_default();
                    undo.push(Undo::RestoreExpense(expense, splits));
                }
            }
            WriteOp::ApplyDebt { delta, at } => {
                let key = delta.key;
                let reverse_key = key.reversed();
                self.require_member(key.group_id, key.from_user_id, "group_balances_from_user_fkey")?;
                self.require_member(key.group_id, key.to_user_id, "group_balances_to_user_fkey")?;

                let forward_row = self.balances.get(&key).cloned();
                let reverse_row = self.balances.get(&reverse_key).cloned();
                let netted = ledger::apply_debt(
                    forward_row.as_ref().map_or(Decimal::ZERO, |b| b.amount_owed),
                    reverse_row.as_ref().map_or(Decimal::ZERO, |b| b.amount_owed),
                    delta.amount,
                );

                if netted.offset > Decimal::ZERO {
                    self.set_balance(reverse_key, netted.reverse, at);
                }
                self.set_balance(key, netted.forward, at);
                undo.push(Undo::RestoreBalance(reverse_key, reverse_row));
                undo.push(Undo::RestoreBalance(key, forward_row));
            }
        }
        Ok(())
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::RemoveGroup(group_id) => {
                    self.groups.remove(&group_id);
                }
                Undo::RestoreGroup(group, members) => {
                    for member in members {
                        self.members.insert((member.group_id, member.user_id), member);
                    }
                    self.groups.insert(group.id, group);
                }
                Undo::RemoveMember(group_id, user_id) => {
                    self.members.remove(&(group_id, user_id));
                }
                Undo::RestoreMember(member) => {
                    self.members.insert((member.group_id, member.user_id), member);
                }
                Undo::RemoveExpense(expense_id) => {
                    self.expenses.remove(&expense_id);
                }
                Undo::RestoreExpense(expense, splits) => {
                    if !splits.is_empty() {
                        self.splits.insert(expense.id, splits);
                    }
                    self.expenses.insert(expense.id, expense);
                }
                Undo::RemoveSplit(expense_id, user_id) => {
                    if let Some(splits) = self.splits.get_mut(&expense_id) {
                        splits.retain(|s| s.user_id != user_id);
                        if splits.is_empty() {
                            self.splits.remove(&expense_id);
                        }
                    }
                }
                Undo::RestoreBalance(key, row) => match row {
                    Some(balance) => {
                        self.balances.insert(key, balance);
                    }
                    None => {
                        self.balances.remove(&key);
                    }
                },
            }
        }
    }

    fn group_with_members(&self, group: &Group) -> GroupWithMembers {
        GroupWithMembers {
            group: group.clone(),
            members: self
                .members
                .values()
                .filter(|m| m.group_id == group.id)
                .cloned()
                .collect(),
        }
    }

    fn expense_details(&self, expense: &Expense) -> ExpenseDetails {
        ExpenseDetails {
            expense: expense.clone(),
            splits: self.splits.get(&expense.id).cloned().unwrap_or_default(),
            payer: expense
                .payer_user_id
                .and_then(|payer| self.members.get(&(expense.group_id, payer)).cloned()),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn apply(&self, ops: Vec<WriteOp>) -> Result<(), LedgerError> {
        // Nothing below awaits once the guard is held, so a cancelled caller
        // cannot leave a half-applied batch behind.
        let mut tables = self.write_tables().await?;
        let mut undo = Vec::with_capacity(ops.len());
        for op in ops {
            if let Err(err) = tables.apply_op(op, &mut undo) {
                warn!("Rolling back {} applied writes: {}", undo.len(), err);
                tables.rollback(undo);
                return Err(err.into());
            }
        }
        Ok(())
    }

    async fn get_group(&self, group_id: GroupId) -> Result<Option<GroupWithMembers>, LedgerError> {
        let tables = self.read_tables().await?;
        Ok(tables.groups.get(&group_id).map(|g| tables.group_with_members(g)))
    }

    async fn get_user_groups(&self, user_id: UserId) -> Result<Vec<Group>, LedgerError> {
        let tables = self.read_tables().await?;
        let mut groups: Vec<Group> = tables
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| tables.groups.get(&m.group_id).cloned())
            .collect();
        groups.sort_by_key(|g| g.created_at);
        Ok(groups)
    }

    async fn get_expense(&self, expense_id: ExpenseId) -> Result<Option<ExpenseDetails>, LedgerError> {
        let tables = self.read_tables().await?;
        Ok(tables.expenses.get(&expense_id).map(|e| tables.expense_details(e)))
    }

    async fn get_expenses_by_group(&self, group_id: GroupId) -> Result<Vec<ExpenseDetails>, LedgerError> {
        let tables = self.read_tables().await?;
        let mut expenses: Vec<ExpenseDetails> = tables
            .expenses
            .values()
            .filter(|e| e.group_id == group_id)
            .map(|e| tables.expense_details(e))
            .collect();
        expenses.sort_by_key(|d| (d.expense.expense_date, d.expense.created_at));
        Ok(expenses)
    }

    async fn get_balances(&self, group_id: GroupId) -> Result<Vec<Balance>, LedgerError> {
        let tables = self.read_tables().await?;
        Ok(tables
            .balances
            .values()
            .filter(|b| b.group_id == group_id && !b.amount_owed.is_zero())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::DebtDelta;
    use crate::core::models::SplitId;
    use crate::infrastructure::storage::UnitOfWork;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn group(owner: UserId) -> (Group, Member) {
        let now = Utc::now();
        let group = Group {
            id: GroupId::new(),
            name: "Trip".to_string(),
            description: None,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };
        let member = Member {
            group_id: group.id,
            user_id: owner,
            is_admin: true,
            joined_at: now,
        };
        (group, member)
    }

    fn member(group_id: GroupId, user_id: UserId) -> Member {
        Member {
            group_id,
            user_id,
            is_admin: false,
            joined_at: Utc::now(),
        }
    }

    async fn seeded(storage: &InMemoryStorage, users: &[UserId]) -> GroupId {
        let (g, owner) = group(users[0]);
        let group_id = g.id;
        let mut uow = UnitOfWork::begin(storage);
        uow.insert_group(g);
        uow.insert_member(owner);
        for &u in &users[1..] {
            uow.insert_member(member(group_id, u));
        }
        uow.commit().await.unwrap();
        group_id
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_trace() {
        let storage = InMemoryStorage::new();
        let (a, b) = (UserId::new(), UserId::new());
        let group_id = seeded(&storage, &[a, b]).await;

        let mut uow = UnitOfWork::begin(&storage);
        uow.apply_debt(
            DebtDelta {
                key: BalanceKey::new(group_id, b, a),
                amount: dec!(12.50),
            },
            Utc::now(),
        );
        // Duplicate membership violates the unique constraint after the debt was applied.
        uow.insert_member(member(group_id, b));
        let err = uow.commit().await.unwrap_err();

        assert_eq!(
            err,
            LedgerError::Persistence(PersistenceError::UniqueViolation("uq_group_members".to_string()))
        );
        assert!(storage.get_balances(group_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_unit_of_work_writes_nothing() {
        let storage = InMemoryStorage::new();
        let a = UserId::new();
        let (g, owner) = group(a);
        let group_id = g.id;
        {
            let mut uow = UnitOfWork::begin(&storage);
            uow.insert_group(g);
            uow.insert_member(owner);
            assert_eq!(uow.staged(), 2);
        }
        assert!(storage.get_group(group_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn split_for_removed_member_is_rejected_at_commit() {
        let storage = InMemoryStorage::new();
        let (a, b) = (UserId::new(), UserId::new());
        let group_id = seeded(&storage, &[a, b]).await;

        let now = Utc::now();
        let expense = Expense {
            id: ExpenseId::new(),
            group_id,
            payer_user_id: Some(a),
            description: None,
            total_amount: dec!(20),
            expense_date: now,
            created_at: now,
            updated_at: now,
        };
        let mut uow = UnitOfWork::begin(&storage);
        uow.insert_expense(expense.clone());
        uow.insert_split(Split {
            id: SplitId::new(),
            expense_id: expense.id,
            user_id: b,
            share_amount: dec!(20),
            is_paid: false,
            created_at: now,
        });

        // Membership revoked after validation but before commit.
        let mut revoke = UnitOfWork::begin(&storage);
        revoke.delete_member(group_id, b);
        revoke.commit().await.unwrap();

        let err = uow.commit().await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Persistence(PersistenceError::ForeignKeyViolation(_))
        ));
        assert!(storage.get_expense(expense.id).await.unwrap().is_none());
        assert!(storage.get_expenses_by_group(group_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn member_with_ledger_rows_cannot_be_deleted() {
        let storage = InMemoryStorage::new();
        let (a, b) = (UserId::new(), UserId::new());
        let group_id = seeded(&storage, &[a, b]).await;

        let mut uow = UnitOfWork::begin(&storage);
        uow.apply_debt(
            DebtDelta {
                key: BalanceKey::new(group_id, b, a),
                amount: dec!(5),
            },
            Utc::now(),
        );
        uow.commit().await.unwrap();

        let mut uow = UnitOfWork::begin(&storage);
        uow.delete_member(group_id, b);
        assert!(matches!(
            uow.commit().await,
            Err(LedgerError::Persistence(PersistenceError::ForeignKeyViolation(_)))
        ));
        assert!(storage.get_group(group_id).await.unwrap().unwrap().is_member(b));
    }

    #[tokio::test]
    async fn writer_times_out_while_lock_is_held() {
        let storage = InMemoryStorage::with_lock_timeout(Duration::from_millis(20));
        let _guard = storage.tables.read().await;

        let (g, owner) = group(UserId::new());
        let mut uow = UnitOfWork::begin(&storage);
        uow.insert_group(g);
        uow.insert_member(owner);
        let err = uow.commit().await.unwrap_err();

        assert_eq!(err, LedgerError::Persistence(PersistenceError::LockTimeout(20)));
        assert!(err.is_retryable());
    }

    fn debt(group_id: GroupId, from: UserId, to: UserId, amount: Decimal) -> DebtDelta {
        DebtDelta {
            key: BalanceKey::new(group_id, from, to),
            amount,
        }
    }

    #[tokio::test]
    async fn settled_rows_are_removed() {
        let storage = InMemoryStorage::new();
        let (a, b) = (UserId::new(), UserId::new());
        let group_id = seeded(&storage, &[a, b]).await;

        let mut uow = UnitOfWork::begin(&storage);
        uow.apply_debt(debt(group_id, b, a, dec!(30)), Utc::now());
        uow.apply_debt(debt(group_id, a, b, dec!(30)), Utc::now());
        uow.commit().await.unwrap();

        assert!(storage.get_balances(group_id).await.unwrap().is_empty());

        // With nothing outstanding the membership is no longer referenced.
        let mut uow = UnitOfWork::begin(&storage);
        uow.delete_member(group_id, b);
        uow.commit().await.unwrap();
        assert!(!storage.get_group(group_id).await.unwrap().unwrap().is_member(b));
    }

    #[tokio::test]
    async fn partial_offset_keeps_only_the_open_direction() {
        let storage = InMemoryStorage::new();
        let (a, b) = (UserId::new(), UserId::new());
        let group_id = seeded(&storage, &[a, b]).await;

        let mut uow = UnitOfWork::begin(&storage);
        uow.apply_debt(debt(group_id, b, a, dec!(30)), Utc::now());
        uow.apply_debt(debt(group_id, a, b, dec!(45)), Utc::now());
        uow.commit().await.unwrap();

        let balances = storage.get_balances(group_id).await.unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].from_user_id, a);
        assert_eq!(balances[0].to_user_id, b);
        assert_eq!(balances[0].amount_owed, dec!(15));
    }

    #[tokio::test]
    async fn rolled_back_unit_of_work_writes_nothing() {
        let storage = InMemoryStorage::new();
        let (a, b) = (UserId::new(), UserId::new());
        let group_id = seeded(&storage, &[a, b]).await;

        let mut uow = UnitOfWork::begin(&storage);
        uow.apply_debt(debt(group_id, b, a, dec!(7)), Utc::now());
        uow.delete_group(group_id);
        uow.rollback();

        assert!(storage.get_balances(group_id).await.unwrap().is_empty());
        assert!(storage.get_group(group_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn group_with_open_balances_cannot_be_deleted() {
        let storage = InMemoryStorage::new();
        let (a, b) = (UserId::new(), UserId::new());
        let group_id = seeded(&storage, &[a, b]).await;

        let mut uow = UnitOfWork::begin(&storage);
        uow.apply_debt(debt(group_id, b, a, dec!(12)), Utc::now());
        uow.commit().await.unwrap();

        let mut uow = UnitOfWork::begin(&storage);
        uow.delete_group(group_id);
        assert_eq!(
            uow.commit().await.unwrap_err(),
            LedgerError::Persistence(PersistenceError::ForeignKeyViolation("groups_referenced".to_string()))
        );
        assert_eq!(storage.get_group(group_id).await.unwrap().unwrap().members.len(), 2);
    }

    #[tokio::test]
    async fn deleting_a_group_drops_its_memberships() {
        let storage = InMemoryStorage::new();
        let (a, b) = (UserId::new(), UserId::new());
        let group_id = seeded(&storage, &[a, b]).await;

        let mut uow = UnitOfWork::begin(&storage);
        uow.delete_group(group_id);
        uow.commit().await.unwrap();

        assert!(storage.get_group(group_id).await.unwrap().is_none());
        assert!(storage.get_user_groups(a).await.unwrap().is_empty());
        assert!(storage.get_user_groups(b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_group_delete_restores_memberships() {
        let storage = InMemoryStorage::new();
        let (a, b) = (UserId::new(), UserId::new());
        let group_id = seeded(&storage, &[a, b]).await;

        let mut uow = UnitOfWork::begin(&storage);
        uow.delete_group(group_id);
        // Re-adding to the deleted group fails the batch after the delete was applied.
        uow.insert_member(member(group_id, UserId::new()));
        assert!(matches!(
            uow.commit().await,
            Err(LedgerError::Persistence(PersistenceError::ForeignKeyViolation(_)))
        ));

        let restored = storage.get_group(group_id).await.unwrap().unwrap();
        assert!(restored.is_member(a) && restored.is_member(b));
        assert_eq!(storage.get_user_groups(b).await.unwrap().len(), 1);
    }
}
