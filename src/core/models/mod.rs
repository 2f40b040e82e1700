pub mod audit;
pub mod balance;
pub mod expense;
pub mod group;
pub mod ids;

pub use audit::AppLog;
pub use balance::{Balance, BalanceKey};
pub use expense::{Expense, ExpenseDetails, ExpenseSummary, NewExpense, NewSplit, Split};
pub use group::{Group, GroupWithMembers, Member};
pub use ids::{ExpenseId, GroupId, SplitId, UserId};
