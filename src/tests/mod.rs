mod concurrency_tests;

use crate::core::models::{GroupId, NewExpense, NewSplit, UserId};
use crate::core::services::LedgerService;
use crate::infrastructure::logging::in_memory::InMemoryLogging;
use crate::infrastructure::storage::in_memory::InMemoryStorage;
use rust_decimal::Decimal;

pub fn create_test_service() -> LedgerService<InMemoryLogging, InMemoryStorage> {
    let _ = env_logger::try_init();
    let storage = InMemoryStorage::new();
    let logging = InMemoryLogging::new();
    LedgerService::new(storage, logging)
}

/// Creates a group owned by the first user with every other user added as a plain member.
pub async fn create_group_with(service: &LedgerService<InMemoryLogging, InMemoryStorage>, users: &[UserId]) -> GroupId {
    let group = service
        .create_group("Test Group".to_string(), None, users[0])
        .await
        .unwrap();
    for &user in &users[1..] {
        service.add_member(group.id, user, false).await.unwrap();
    }
    group.id
}

pub fn new_expense(group_id: GroupId, payer: Option<UserId>, total: Decimal, shares: &[(UserId, Decimal)]) -> NewExpense {
    NewExpense {
        group_id,
        payer_user_id: payer,
        description: Some("Dinner".to_string()),
        total_amount: total,
        expense_date: None,
        splits: shares
            .iter()
            .map(|&(user_id, share_amount)| NewSplit {
                user_id,
                share_amount,
                is_paid: false,
            })
            .collect(),
    }
}

/// Current amount owed on the directional row `from -> to`, zero when the row is absent.
pub async fn owed(
    service: &LedgerService<InMemoryLogging, InMemoryStorage>,
    group_id: GroupId,
    from: UserId,
    to: UserId,
) -> Decimal {
    service
        .get_group_balances(group_id)
        .await
        .unwrap()
        .into_iter()
        .find(|b| b.from_user_id == from && b.to_user_id == to)
        .map_or(Decimal::ZERO, |b| b.amount_owed)
}
