//! Database operations for incomes.

use rusqlite::{Connection, Row, named_params};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    income::{Income, IncomeData, IncomeId},
    query::DateRange,
};

const SELECT_INCOME: &str =
    "SELECT id, amount, date, kind, note, created_at, updated_at FROM income";

/// Create an income for `user_id` and return it with its generated ID.
pub fn create_income(
    user_id: UserID,
    data: IncomeData,
    connection: &Connection,
) -> Result<Income, Error> {
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO income (user_id, amount, date, kind, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        (
            user_id.as_i64(),
            data.amount,
            data.date,
            data.kind.as_str(),
            &data.note,
            now,
        ),
    )?;

    get_income(connection.last_insert_rowid(), user_id, connection)
}

/// Retrieve the income `income_id` owned by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the income does not exist or belongs to another user.
pub fn get_income(
    income_id: IncomeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Income, Error> {
    connection
        .prepare(&format!(
            "{SELECT_INCOME} WHERE id = :id AND user_id = :user_id;"
        ))?
        .query_row(
            named_params! { ":id": income_id, ":user_id": user_id.as_i64() },
            map_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve the incomes of `user_id` dated in `date_range`, newest first.
pub fn get_incomes(
    user_id: UserID,
    date_range: DateRange,
    connection: &Connection,
) -> Result<Vec<Income>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_INCOME}
            WHERE user_id = :user_id
                AND (:from IS NULL OR date >= :from)
                AND (:to IS NULL OR date <= :to)
            ORDER BY date DESC, created_at DESC, id DESC;"
        ))?
        .query_map(
            named_params! {
                ":user_id": user_id.as_i64(),
                ":from": date_range.from,
                ":to": date_range.to,
            },
            map_row,
        )?
        .map(|maybe_income| maybe_income.map_err(|error| error.into()))
        .collect()
}

/// Replace the fields of the income `income_id` and return the updated income.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the income does not exist or belongs to another user.
pub fn update_income(
    income_id: IncomeId,
    user_id: UserID,
    data: IncomeData,
    connection: &Connection,
) -> Result<Income, Error> {
    let rows_affected = connection.execute(
        "UPDATE income SET amount = ?1, date = ?2, kind = ?3, note = ?4, updated_at = ?5
         WHERE id = ?6 AND user_id = ?7",
        (
            data.amount,
            data.date,
            data.kind.as_str(),
            &data.note,
            OffsetDateTime::now_utc(),
            income_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_income(income_id, user_id, connection)
}

/// Delete the income `income_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the income does not exist or belongs to another user.
pub fn delete_income(
    income_id: IncomeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM income WHERE id = ?1 AND user_id = ?2",
        (income_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Initialize the income table and indexes.
pub fn create_income_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS income (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            kind TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_income_user_date ON income(user_id, date);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Income, rusqlite::Error> {
    let raw_kind: String = row.get(3)?;
    let kind = raw_kind.parse().map_err(|error: Error| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Income {
        id: row.get(0)?,
        amount: row.get(1)?,
        date: row.get(2)?,
        kind,
        note: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
