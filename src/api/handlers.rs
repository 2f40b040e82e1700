use crate::{
    api::models::*,
    core::{
        models::{Balance, ExpenseDetails, ExpenseId, ExpenseSummary, Group, GroupId, GroupWithMembers, Member, UserId},
        services::LedgerService,
    },
    infrastructure::{logging::in_memory::InMemoryLogging, storage::in_memory::InMemoryStorage},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use std::sync::Arc;

pub type SharedService = Arc<LedgerService<InMemoryLogging, InMemoryStorage>>;

// Define API routes
pub fn api_routes(service: SharedService) -> Router {
    Router::new()
        .route("/groups", post(create_group))
        .route(
            "/groups/{group_id}",
            get(get_group).patch(update_group).delete(delete_group),
        )
        .route("/groups/{group_id}/members", post(add_member))
        .route("/groups/{group_id}/members/{user_id}", delete(remove_member))
        .route("/groups/{group_id}/balances", get(get_group_balances))
        .route("/groups/{group_id}/expenses", post(create_expense).get(list_expenses))
        .route("/groups/{group_id}/expenses/summary", get(get_expense_summary))
        .route("/expenses/{expense_id}", get(get_expense).delete(delete_expense))
        .route("/users/{user_id}/groups", get(list_user_groups))
        .with_state(service)
}

#[utoipa::path(
    post,
    path = "/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created; the creator is its first admin", body = Group),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 503, description = "Store busy, retry", body = ErrorResponse)
    )
)]
pub(crate) async fn create_group(
    State(service): State<SharedService>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = service.create_group(req.name, req.description, req.created_by).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    get,
    path = "/groups/{group_id}",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Group with its members", body = GroupWithMembers),
        (status = 404, description = "Group not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_group(
    State(service): State<SharedService>,
    Path(group_id): Path<GroupId>,
) -> Result<Json<GroupWithMembers>, ApiError> {
    Ok(Json(service.get_group(group_id).await?))
}

#[utoipa::path(
    patch,
    path = "/groups/{group_id}",
    request_body = UpdateGroupRequest,
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Group updated", body = Group),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    )
)]
pub(crate) async fn update_group(
    State(service): State<SharedService>,
    Path(group_id): Path<GroupId>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<Json<Group>, ApiError> {
    Ok(Json(service.update_group(group_id, req.name, req.description).await?))
}

#[utoipa::path(
    delete,
    path = "/groups/{group_id}",
    params(
        ("group_id" = String, Path, description = "ID of the group to delete")
    ),
    responses(
        (status = 204, description = "Group and its memberships deleted"),
        (status = 404, description = "Group not found", body = ErrorResponse),
        (status = 409, description = "Group still has expenses or open balances", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_group(
    State(service): State<SharedService>,
    Path(group_id): Path<GroupId>,
) -> Result<StatusCode, ApiError> {
    service.delete_group(group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/groups/{group_id}/members",
    request_body = AddMemberRequest,
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 201, description = "Member added", body = Member),
        (status = 404, description = "Group not found", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse)
    )
)]
pub(crate) async fn add_member(
    State(service): State<SharedService>,
    Path(group_id): Path<GroupId>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Member>), ApiError> {
    let member = service.add_member(group_id, req.user_id, req.is_admin).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    delete,
    path = "/groups/{group_id}/members/{user_id}",
    params(
        ("group_id" = String, Path, description = "ID of the group"),
        ("user_id" = String, Path, description = "ID of the member to remove")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 400, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse),
        (status = 409, description = "Member still referenced by expenses or balances", body = ErrorResponse)
    )
)]
pub(crate) async fn remove_member(
    State(service): State<SharedService>,
    Path((group_id, user_id)): Path<(GroupId, UserId)>,
) -> Result<StatusCode, ApiError> {
    service.remove_member(group_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/groups/{group_id}/balances",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Directional balance rows", body = [Balance]),
        (status = 404, description = "Group not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_group_balances(
    State(service): State<SharedService>,
    Path(group_id): Path<GroupId>,
) -> Result<Json<Vec<Balance>>, ApiError> {
    Ok(Json(service.get_group_balances(group_id).await?))
}

#[utoipa::path(
    post,
    path = "/groups/{group_id}/expenses",
    request_body = CreateExpenseRequest,
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 201, description = "Expense recorded and balances updated", body = ExpenseDetails),
        (status = 400, description = "Invalid input, non-members, or shares not matching total", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse),
        (status = 409, description = "Membership changed before commit", body = ErrorResponse),
        (status = 503, description = "Store busy, retry", body = ErrorResponse)
    )
)]
pub(crate) async fn create_expense(
    State(service): State<SharedService>,
    Path(group_id): Path<GroupId>,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<ExpenseDetails>), ApiError> {
    let expense = service.create_expense(req.into_new_expense(group_id)).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

#[utoipa::path(
    get,
    path = "/groups/{group_id}/expenses",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Expenses with splits and payer", body = [ExpenseDetails]),
        (status = 404, description = "Group not found", body = ErrorResponse)
    )
)]
pub(crate) async fn list_expenses(
    State(service): State<SharedService>,
    Path(group_id): Path<GroupId>,
) -> Result<Json<Vec<ExpenseDetails>>, ApiError> {
    Ok(Json(service.list_expenses(group_id).await?))
}

#[utoipa::path(
    get,
    path = "/groups/{group_id}/expenses/summary",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Expenses with total and unpaid amounts", body = ExpenseSummary),
        (status = 404, description = "Group not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_expense_summary(
    State(service): State<SharedService>,
    Path(group_id): Path<GroupId>,
) -> Result<Json<ExpenseSummary>, ApiError> {
    Ok(Json(service.get_expense_summary(group_id).await?))
}

#[utoipa::path(
    get,
    path = "/expenses/{expense_id}",
    params(
        ("expense_id" = String, Path, description = "ID of the expense")
    ),
    responses(
        (status = 200, description = "Expense with splits and payer", body = ExpenseDetails),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_expense(
    State(service): State<SharedService>,
    Path(expense_id): Path<ExpenseId>,
) -> Result<Json<ExpenseDetails>, ApiError> {
    Ok(Json(service.get_expense(expense_id).await?))
}

#[utoipa::path(
    delete,
    path = "/expenses/{expense_id}",
    params(
        ("expense_id" = String, Path, description = "ID of the expense")
    ),
    responses(
        (status = 204, description = "Expense deleted and its balance contribution reversed"),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 503, description = "Store busy, retry", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_expense(
    State(service): State<SharedService>,
    Path(expense_id): Path<ExpenseId>,
) -> Result<StatusCode, ApiError> {
    service.delete_expense(expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/groups",
    params(
        ("user_id" = String, Path, description = "ID of the user")
    ),
    responses(
        (status = 200, description = "Groups the user belongs to", body = [Group])
    )
)]
pub(crate) async fn list_user_groups(
    State(service): State<SharedService>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(service.list_user_groups(user_id).await?))
}
