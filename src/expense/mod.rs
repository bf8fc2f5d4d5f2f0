//! Expenses ("gastos"), optionally counted against one of the user's budget items.

mod db;
mod domain;
mod handlers;

pub use db::{
    ExpenseFilter, create_expense, create_expense_table, delete_expense, get_expense,
    get_expenses, update_expense,
};
pub use domain::{Expense, ExpenseData, ExpenseForm, ExpenseId, ExpenseKind, ExpenseView};
pub use handlers::{
    create_expense_endpoint, delete_expense_endpoint, get_expense_endpoint,
    list_expenses_endpoint, patch_expense_endpoint, replace_expense_endpoint,
};
