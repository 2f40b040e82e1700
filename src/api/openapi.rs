use utoipa::OpenApi;

use crate::{
    api::models::{AddMemberRequest, CreateExpenseRequest, CreateGroupRequest, ErrorResponse, UpdateGroupRequest},
    core::{
        errors::ErrorKind,
        models::{Balance, Expense, ExpenseDetails, ExpenseSummary, Group, GroupWithMembers, Member, NewSplit, Split},
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::handlers::create_group,
        super::handlers::get_group,
        super::handlers::update_group,
        super::handlers::delete_group,
        super::handlers::add_member,
        super::handlers::remove_member,
        super::handlers::get_group_balances,
        super::handlers::create_expense,
        super::handlers::list_expenses,
        super::handlers::get_expense_summary,
        super::handlers::get_expense,
        super::handlers::delete_expense,
        super::handlers::list_user_groups
    ),
    components(schemas(
        CreateGroupRequest,
        UpdateGroupRequest,
        AddMemberRequest,
        CreateExpenseRequest,
        NewSplit,
        ErrorResponse,
        ErrorKind,
        Group,
        GroupWithMembers,
        Member,
        Expense,
        Split,
        ExpenseDetails,
        ExpenseSummary,
        Balance
    )),
    info(
        title = "Splitledger API",
        description = "API for recording group expenses and tracking who owes whom",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_path_documents_update_and_delete() {
        let doc = ApiDoc::openapi();
        let item = &doc.paths.paths["/groups/{group_id}"];
        assert!(item.get.is_some());
        assert!(item.patch.is_some());
        assert!(item.delete.is_some());
    }

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/groups",
            "/groups/{group_id}",
            "/groups/{group_id}/members",
            "/groups/{group_id}/members/{user_id}",
            "/groups/{group_id}/balances",
            "/groups/{group_id}/expenses",
            "/groups/{group_id}/expenses/summary",
            "/expenses/{expense_id}",
            "/users/{user_id}/groups",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
