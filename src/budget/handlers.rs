//! Route handlers for the budget item API.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error, UserID,
    budget::{
        BudgetItem, BudgetItemForm, BudgetItemId, BudgetItemView, create_budget_item,
        delete_budget_item, get_budget_item, get_budget_items, get_monthly_spending,
        update_budget_item,
    },
    db::lock_connection,
    json::ApiJson,
    money::Amount,
    month::MonthRange,
    query::ApiPath,
    timezone::local_today,
};

/// The state needed by the budget item handlers.
#[derive(Debug, Clone)]
pub struct BudgetItemState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone that decides which month is the current month.
    pub local_timezone: String,
}

impl FromRef<AppState> for BudgetItemState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.config.local_timezone.clone(),
        }
    }
}

/// List the logged in user's budget items with their figures for the current month.
pub async fn list_budget_items_endpoint(
    State(state): State<BudgetItemState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<BudgetItemView>>, Error> {
    let month = MonthRange::containing(local_today(&state.local_timezone)?);
    let connection = lock_connection(&state.db_connection)?;

    let budget_items = get_budget_items(user_id, &connection)?;
    let spending = get_monthly_spending(user_id, month, &connection)?;

    let views = budget_items
        .iter()
        .map(|item| {
            let spent = spending.get(&item.id).copied().unwrap_or(Amount::ZERO);
            BudgetItemView::new(item, spent)
        })
        .collect();

    Ok(Json(views))
}

/// Create a budget item for the logged in user.
pub async fn create_budget_item_endpoint(
    State(state): State<BudgetItemState>,
    Extension(user_id): Extension<UserID>,
    ApiJson(form): ApiJson<BudgetItemForm>,
) -> Result<(StatusCode, Json<BudgetItemView>), Error> {
    let data = form.into_new()?;
    let connection = lock_connection(&state.db_connection)?;

    let budget_item = create_budget_item(user_id, data, &connection)?;

    Ok((StatusCode::CREATED, Json(BudgetItemView::new(&budget_item, Amount::ZERO))))
}

/// Get one of the logged in user's budget items.
pub async fn get_budget_item_endpoint(
    State(state): State<BudgetItemState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(budget_item_id): ApiPath<BudgetItemId>,
) -> Result<Json<BudgetItemView>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let budget_item = get_budget_item(budget_item_id, user_id, &connection)?;

    view_with_spending(&budget_item, user_id, &state.local_timezone, &connection).map(Json)
}

/// Replace all the fields of one of the logged in user's budget items.
pub async fn replace_budget_item_endpoint(
    State(state): State<BudgetItemState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(budget_item_id): ApiPath<BudgetItemId>,
    ApiJson(form): ApiJson<BudgetItemForm>,
) -> Result<Json<BudgetItemView>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let current = get_budget_item(budget_item_id, user_id, &connection)?;

    let data = form.into_replacement(&current)?;
    let budget_item = update_budget_item(budget_item_id, user_id, data, &connection)?;

    view_with_spending(&budget_item, user_id, &state.local_timezone, &connection).map(Json)
}

/// Change some of the fields of one of the logged in user's budget items.
pub async fn patch_budget_item_endpoint(
    State(state): State<BudgetItemState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(budget_item_id): ApiPath<BudgetItemId>,
    ApiJson(form): ApiJson<BudgetItemForm>,
) -> Result<Json<BudgetItemView>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let current = get_budget_item(budget_item_id, user_id, &connection)?;

    let data = form.into_patch(&current)?;
    let budget_item = update_budget_item(budget_item_id, user_id, data, &connection)?;

    view_with_spending(&budget_item, user_id, &state.local_timezone, &connection).map(Json)
}

/// Delete one of the logged in user's budget items.
pub async fn delete_budget_item_endpoint(
    State(state): State<BudgetItemState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(budget_item_id): ApiPath<BudgetItemId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_budget_item(budget_item_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

fn view_with_spending(
    budget_item: &BudgetItem,
    user_id: UserID,
    local_timezone: &str,
    connection: &Connection,
) -> Result<BudgetItemView, Error> {
    let month = MonthRange::containing(local_today(local_timezone)?);
    let spent = get_monthly_spending(user_id, month, connection)?
        .get(&budget_item.id)
        .copied()
        .unwrap_or(Amount::ZERO);

    Ok(BudgetItemView::new(budget_item, spent))
}
