//! The route handler for the monthly financial summary.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error, UserID,
    budget::{BudgetItemView, get_budget_items, get_monthly_spending},
    db::lock_connection,
    expense::{ExpenseFilter, ExpenseView, get_expenses},
    income::{IncomeView, get_incomes},
    money::{Amount, serialize_two_places},
    month::MonthRange,
    query::{ApiQuery, DateRange, parse_optional_date},
    timezone::local_today,
};

use super::{
    aggregation::{group_expenses_by_category, savings_percentage},
    suggestions::build_suggestions,
};

/// How many of the month's incomes and expenses the summary includes.
const RECENT_RECORDS_LIMIT: usize = 5;

/// The state needed for building the summary.
#[derive(Debug, Clone)]
pub struct SummaryState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone that decides which month is the current month.
    pub local_timezone: String,
}

impl FromRef<AppState> for SummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.config.local_timezone.clone(),
        }
    }
}

/// The query parameters for the summary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryQuery {
    /// A date in the month to summarize, defaults to today.
    pub fecha: Option<String>,
}

/// Key figures and suggestions for one month of a user's finances.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub total_ingresos: Amount,
    pub total_gastos: Amount,
    /// Income minus expenses.
    #[serde(serialize_with = "serialize_two_places")]
    pub saldo: Decimal,
    /// The balance as a percentage of income.
    #[serde(serialize_with = "serialize_two_places")]
    pub ahorro_porcentaje: Decimal,
    pub gastos_por_categoria: BTreeMap<String, Amount>,
    pub partidas: Vec<BudgetItemView>,
    pub sugerencias: Vec<String>,
    pub ingresos_recientes: Vec<IncomeView>,
    pub gastos_recientes: Vec<ExpenseView>,
}

/// Build the summary of the month containing `date` for `user_id`.
pub fn build_summary(
    user_id: UserID,
    date: Date,
    connection: &Connection,
) -> Result<FinancialSummary, Error> {
    let month = MonthRange::containing(date);

    let incomes = get_incomes(user_id, DateRange::from(month), connection)?;
    let expenses = get_expenses(
        user_id,
        ExpenseFilter {
            date_range: DateRange::from(month),
            budget_item_id: None,
        },
        connection,
    )?;

    let spending = get_monthly_spending(user_id, month, connection)?;
    let budget_items: Vec<BudgetItemView> = get_budget_items(user_id, connection)?
        .iter()
        .map(|item| {
            let spent = spending.get(&item.id).copied().unwrap_or(Amount::ZERO);
            BudgetItemView::new(item, spent)
        })
        .collect();

    let total_income: Amount = incomes.iter().map(|income| income.amount).sum();
    let total_expenses: Amount = expenses.iter().map(|expense| expense.amount).sum();
    let balance = total_income.as_decimal() - total_expenses.as_decimal();

    let suggestions = build_suggestions(
        total_income.as_decimal(),
        total_expenses.as_decimal(),
        &budget_items,
    );

    Ok(FinancialSummary {
        total_ingresos: total_income,
        total_gastos: total_expenses,
        saldo: balance,
        ahorro_porcentaje: savings_percentage(total_income.as_decimal(), balance),
        gastos_por_categoria: group_expenses_by_category(&expenses),
        partidas: budget_items,
        sugerencias: suggestions,
        ingresos_recientes: incomes
            .iter()
            .take(RECENT_RECORDS_LIMIT)
            .map(IncomeView::from)
            .collect(),
        gastos_recientes: expenses
            .iter()
            .take(RECENT_RECORDS_LIMIT)
            .map(ExpenseView::from)
            .collect(),
    })
}

/// Get the financial summary of the logged in user for the current month, or
/// the month of the `fecha` query parameter.
pub async fn get_summary_endpoint(
    State(state): State<SummaryState>,
    Extension(user_id): Extension<UserID>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> Result<Json<FinancialSummary>, Error> {
    let date = match parse_optional_date("fecha", query.fecha.as_deref())? {
        Some(date) => date,
        None => local_today(&state.local_timezone)?,
    };

    let connection = lock_connection(&state.db_connection)?;

    build_summary(user_id, date, &connection).map(Json)
}
