use rust_decimal::Decimal;

/// Allowed absolute gap between the sum of shares and an expense total.
pub const SPLIT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Amounts carry at most this many decimal places.
pub const AMOUNT_SCALE: u32 = 2;

pub const MAX_GROUP_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 255;

// Audit actions
pub const GROUP_CREATED: &str = "GROUP_CREATED";
pub const GROUP_UPDATED: &str = "GROUP_UPDATED";
pub const GROUP_DELETED: &str = "GROUP_DELETED";
pub const MEMBER_ADDED: &str = "MEMBER_ADDED";
pub const MEMBER_REMOVED: &str = "MEMBER_REMOVED";
pub const EXPENSE_CREATED: &str = "EXPENSE_CREATED";
pub const EXPENSE_DELETED: &str = "EXPENSE_DELETED";
