use crate::core::models::UserId;
use crate::tests::{create_group_with, create_test_service, new_expense, owed};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expenses_lose_no_updates() {
    let service = Arc::new(create_test_service());
    let (payer, user) = (UserId::new(), UserId::new());
    let group_id = create_group_with(&service, &[payer, user]).await;

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .create_expense(new_expense(group_id, Some(payer), dec!(1.25), &[(user, dec!(1.25))]))
                    .await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(owed(&service, group_id, user, payer).await, dec!(62.50));
    assert_eq!(service.list_expenses(group_id).await.unwrap().len(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opposite_debts_conserve_difference() {
    let service = Arc::new(create_test_service());
    let (a, b) = (UserId::new(), UserId::new());
    let group_id = create_group_with(&service, &[a, b]).await;

    // 20 expenses where a pays for b (b owes 3 each) and 20 where b pays for a (a owes 2 each).
    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let input = if i % 2 == 0 {
                    new_expense(group_id, Some(a), dec!(3), &[(b, dec!(3))])
                } else {
                    new_expense(group_id, Some(b), dec!(2), &[(a, dec!(2))])
                };
                service.create_expense(input).await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let b_to_a = owed(&service, group_id, b, a).await;
    let a_to_b = owed(&service, group_id, a, b).await;
    assert_eq!(b_to_a - a_to_b, dec!(20));
    assert!(b_to_a >= Decimal::ZERO && a_to_b >= Decimal::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_expenses_do_not_disturb_concurrent_successes() {
    let service = Arc::new(create_test_service());
    let (payer, user) = (UserId::new(), UserId::new());
    let group_id = create_group_with(&service, &[payer, user]).await;

    let tasks: Vec<_> = (0..30)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                // Every third expense has shares that do not add up.
                let share = if i % 3 == 0 { dec!(4) } else { dec!(5) };
                service
                    .create_expense(new_expense(group_id, Some(payer), dec!(5), &[(user, share)]))
                    .await
            })
        })
        .collect();

    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 20);

    assert_eq!(owed(&service, group_id, user, payer).await, dec!(100));
    assert_eq!(service.list_expenses(group_id).await.unwrap().len(), 20);
}
