//! Database operations for budget items.

use std::collections::HashMap;

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    budget::{BudgetItem, BudgetItemData, BudgetItemId, BudgetItemName},
    money::Amount,
    month::MonthRange,
};

const SELECT_BUDGET_ITEM: &str =
    "SELECT id, name, kind, assigned_amount, created_at, updated_at FROM budget_item";

/// Create a budget item for `user_id` and return it with its generated ID.
///
/// # Errors
///
/// Returns an [Error::DuplicateBudgetItemName] if the user already has a
/// budget item with the same name.
pub fn create_budget_item(
    user_id: UserID,
    data: BudgetItemData,
    connection: &Connection,
) -> Result<BudgetItem, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .execute(
            "INSERT INTO budget_item (user_id, name, kind, assigned_amount, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            (
                user_id.as_i64(),
                data.name.as_ref(),
                data.kind.as_str(),
                data.assigned_amount,
                now,
            ),
        )
        .map_err(|error| map_unique_name_error(error, &data.name))?;

    let id = connection.last_insert_rowid();

    Ok(BudgetItem {
        id,
        name: data.name,
        kind: data.kind,
        assigned_amount: data.assigned_amount,
        created_at: now,
        updated_at: now,
    })
}

/// Retrieve the budget item `budget_item_id` owned by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the budget item does not exist or belongs to another user.
pub fn get_budget_item(
    budget_item_id: BudgetItemId,
    user_id: UserID,
    connection: &Connection,
) -> Result<BudgetItem, Error> {
    connection
        .prepare(&format!(
            "{SELECT_BUDGET_ITEM} WHERE id = :id AND user_id = :user_id;"
        ))?
        .query_row(
            &[(":id", &budget_item_id), (":user_id", &user_id.as_i64())],
            map_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve all of the budget items of `user_id` ordered alphabetically by name.
pub fn get_budget_items(user_id: UserID, connection: &Connection) -> Result<Vec<BudgetItem>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_BUDGET_ITEM} WHERE user_id = :user_id ORDER BY name ASC, id ASC;"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_item| maybe_item.map_err(|error| error.into()))
        .collect()
}

/// Replace the fields of the budget item `budget_item_id` and return the updated item.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the budget item does not exist or belongs
/// to another user, or an [Error::DuplicateBudgetItemName] if the new name is taken.
pub fn update_budget_item(
    budget_item_id: BudgetItemId,
    user_id: UserID,
    data: BudgetItemData,
    connection: &Connection,
) -> Result<BudgetItem, Error> {
    let rows_affected = connection
        .execute(
            "UPDATE budget_item SET name = ?1, kind = ?2, assigned_amount = ?3, updated_at = ?4
             WHERE id = ?5 AND user_id = ?6",
            (
                data.name.as_ref(),
                data.kind.as_str(),
                data.assigned_amount,
                OffsetDateTime::now_utc(),
                budget_item_id,
                user_id.as_i64(),
            ),
        )
        .map_err(|error| map_unique_name_error(error, &data.name))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_budget_item(budget_item_id, user_id, connection)
}

/// Delete the budget item `budget_item_id`. Its expenses are kept but no
/// longer linked to a budget item.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the budget item does not exist or belongs to another user.
pub fn delete_budget_item(
    budget_item_id: BudgetItemId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM budget_item WHERE id = ?1 AND user_id = ?2",
        (budget_item_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// The total amount `user_id` spent on each of their budget items in `month`.
///
/// Budget items without expenses in the month are not included.
pub fn get_monthly_spending(
    user_id: UserID,
    month: MonthRange,
    connection: &Connection,
) -> Result<HashMap<BudgetItemId, Amount>, Error> {
    let mut statement = connection.prepare(
        "SELECT budget_item_id, amount FROM expense
         WHERE user_id = ?1 AND budget_item_id IS NOT NULL AND date >= ?2 AND date < ?3",
    )?;

    let rows = statement.query_map((user_id.as_i64(), month.start, month.end), |row| {
        Ok((row.get::<_, BudgetItemId>(0)?, row.get::<_, Amount>(1)?))
    })?;

    let mut spending = HashMap::new();

    for row in rows {
        let (budget_item_id, amount) = row?;
        let total = spending.entry(budget_item_id).or_insert(Amount::ZERO);
        *total = *total + amount;
    }

    Ok(spending)
}

/// Initialize the budget item table and indexes.
pub fn create_budget_item_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS budget_item (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            assigned_amount TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, name),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_budget_item_user ON budget_item(user_id);",
    )?;

    Ok(())
}

fn map_unique_name_error(error: rusqlite::Error, name: &BudgetItemName) -> Error {
    match error {
        // Code 2067 occurs when a UNIQUE constraint failed.
        rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
            if sql_error.extended_code == 2067 && desc.ends_with("budget_item.name") =>
        {
            Error::DuplicateBudgetItemName(name.to_string())
        }
        error => error.into(),
    }
}

fn map_row(row: &Row) -> Result<BudgetItem, rusqlite::Error> {
    let raw_name: String = row.get(1)?;
    let raw_kind: String = row.get(2)?;
    let kind = raw_kind.parse().map_err(|error: Error| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(BudgetItem {
        id: row.get(0)?,
        name: BudgetItemName::new_unchecked(&raw_name),
        kind,
        assigned_amount: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
