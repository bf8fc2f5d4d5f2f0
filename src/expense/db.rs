//! Database operations for expenses.

use rusqlite::{Connection, Row, named_params};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    budget::{BudgetItemId, BudgetItemName},
    expense::{Expense, ExpenseData, ExpenseId},
    query::DateRange,
};

const SELECT_EXPENSE: &str = "SELECT expense.id, expense.budget_item_id, budget_item.name, \
    expense.amount, expense.date, expense.kind, expense.category, expense.note, \
    expense.created_at, expense.updated_at \
    FROM expense LEFT JOIN budget_item ON expense.budget_item_id = budget_item.id";

/// Which of a user's expenses to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    /// Only include expenses dated in this range.
    pub date_range: DateRange,
    /// Only include expenses of this budget item and expenses without a budget item.
    pub budget_item_id: Option<BudgetItemId>,
}

/// Create an expense for `user_id` and return it with its generated ID.
///
/// The caller should check that the budget item, if any, belongs to the user.
pub fn create_expense(
    user_id: UserID,
    data: ExpenseData,
    connection: &Connection,
) -> Result<Expense, Error> {
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO expense (user_id, budget_item_id, amount, date, kind, category, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        (
            user_id.as_i64(),
            data.budget_item_id,
            data.amount,
            data.date,
            data.kind.as_str(),
            &data.category,
            &data.note,
            now,
        ),
    )?;

    get_expense(connection.last_insert_rowid(), user_id, connection)
}

/// Retrieve the expense `expense_id` owned by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the expense does not exist or belongs to another user.
pub fn get_expense(
    expense_id: ExpenseId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Expense, Error> {
    connection
        .prepare(&format!(
            "{SELECT_EXPENSE} WHERE expense.id = :id AND expense.user_id = :user_id;"
        ))?
        .query_row(
            named_params! { ":id": expense_id, ":user_id": user_id.as_i64() },
            map_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve the expenses of `user_id` that match `filter`, newest first.
pub fn get_expenses(
    user_id: UserID,
    filter: ExpenseFilter,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_EXPENSE}
            WHERE expense.user_id = :user_id
                AND (:from IS NULL OR expense.date >= :from)
                AND (:to IS NULL OR expense.date <= :to)
                AND (:budget_item_id IS NULL
                    OR expense.budget_item_id = :budget_item_id
                    OR expense.budget_item_id IS NULL)
            ORDER BY expense.date DESC, expense.created_at DESC, expense.id DESC;"
        ))?
        .query_map(
            named_params! {
                ":user_id": user_id.as_i64(),
                ":from": filter.date_range.from,
                ":to": filter.date_range.to,
                ":budget_item_id": filter.budget_item_id,
            },
            map_row,
        )?
        .map(|maybe_expense| maybe_expense.map_err(|error| error.into()))
        .collect()
}

/// Replace the fields of the expense `expense_id` and return the updated expense.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the expense does not exist or belongs to another user.
pub fn update_expense(
    expense_id: ExpenseId,
    user_id: UserID,
    data: ExpenseData,
    connection: &Connection,
) -> Result<Expense, Error> {
    let rows_affected = connection.execute(
        "UPDATE expense
         SET budget_item_id = ?1, amount = ?2, date = ?3, kind = ?4, category = ?5, note = ?6, updated_at = ?7
         WHERE id = ?8 AND user_id = ?9",
        (
            data.budget_item_id,
            data.amount,
            data.date,
            data.kind.as_str(),
            &data.category,
            &data.note,
            OffsetDateTime::now_utc(),
            expense_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_expense(expense_id, user_id, connection)
}

/// Delete the expense `expense_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the expense does not exist or belongs to another user.
pub fn delete_expense(
    expense_id: ExpenseId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM expense WHERE id = ?1 AND user_id = ?2",
        (expense_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Initialize the expense table and indexes.
///
/// The budget item table must be created first.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS expense (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            budget_item_id INTEGER,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            kind TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            note TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(budget_item_id) REFERENCES budget_item(id) ON UPDATE CASCADE ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_expense_user_date ON expense(user_id, date);
        CREATE INDEX IF NOT EXISTS idx_expense_budget_item ON expense(budget_item_id);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let budget_item_name = row
        .get::<usize, Option<String>>(2)?
        .map(|name| BudgetItemName::new_unchecked(&name));
    let raw_kind: String = row.get(5)?;
    let kind = raw_kind.parse().map_err(|error: Error| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Expense {
        id: row.get(0)?,
        budget_item_id: row.get(1)?,
        budget_item_name,
        amount: row.get(3)?,
        date: row.get(4)?,
        kind,
        category: row.get(6)?,
        note: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
