//! Budget items ("partidas"): the categories a user assigns money to each month.

mod db;
mod domain;
mod handlers;

pub use db::{
    create_budget_item, create_budget_item_table, delete_budget_item, get_budget_item,
    get_budget_items, get_monthly_spending, update_budget_item,
};
pub use domain::{
    BudgetItem, BudgetItemData, BudgetItemForm, BudgetItemId, BudgetItemKind, BudgetItemName,
    BudgetItemView, MAX_BUDGET_ITEM_NAME_LENGTH,
};
pub use handlers::{
    create_budget_item_endpoint, delete_budget_item_endpoint, get_budget_item_endpoint,
    list_budget_items_endpoint, patch_budget_item_endpoint, replace_budget_item_endpoint,
};
