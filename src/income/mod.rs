//! Incomes ("ingresos").

mod db;
mod domain;
mod handlers;

pub use db::{
    create_income, create_income_table, delete_income, get_income, get_incomes, update_income,
};
pub use domain::{Income, IncomeData, IncomeForm, IncomeId, IncomeKind, IncomeView};
pub use handlers::{
    create_income_endpoint, delete_income_endpoint, get_income_endpoint, list_incomes_endpoint,
    patch_income_endpoint, replace_income_endpoint,
};
