//! Route handlers for the income API.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error, UserID,
    db::lock_connection,
    income::{
        IncomeForm, IncomeId, IncomeView, create_income, delete_income, get_income, get_incomes,
        update_income,
    },
    json::ApiJson,
    query::{ApiPath, ApiQuery, DateRange, DateRangeQuery},
    timezone::local_today,
};

/// The state needed by the income handlers.
#[derive(Debug, Clone)]
pub struct IncomeState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone used to decide the default date of new incomes.
    pub local_timezone: String,
}

impl FromRef<AppState> for IncomeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.config.local_timezone.clone(),
        }
    }
}

/// List the logged in user's incomes, newest first.
///
/// Accepts the query parameters `desde` and `hasta`.
pub async fn list_incomes_endpoint(
    State(state): State<IncomeState>,
    Extension(user_id): Extension<UserID>,
    ApiQuery(query): ApiQuery<DateRangeQuery>,
) -> Result<Json<Vec<IncomeView>>, Error> {
    let date_range = DateRange::try_from(&query)?;
    let connection = lock_connection(&state.db_connection)?;

    let incomes = get_incomes(user_id, date_range, &connection)?;

    Ok(Json(incomes.iter().map(IncomeView::from).collect()))
}

/// Create an income for the logged in user.
pub async fn create_income_endpoint(
    State(state): State<IncomeState>,
    Extension(user_id): Extension<UserID>,
    ApiJson(form): ApiJson<IncomeForm>,
) -> Result<(StatusCode, Json<IncomeView>), Error> {
    let data = form.into_new(local_today(&state.local_timezone)?)?;
    let connection = lock_connection(&state.db_connection)?;

    let income = create_income(user_id, data, &connection)?;

    Ok((StatusCode::CREATED, Json(IncomeView::from(&income))))
}

/// Get one of the logged in user's incomes.
pub async fn get_income_endpoint(
    State(state): State<IncomeState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(income_id): ApiPath<IncomeId>,
) -> Result<Json<IncomeView>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let income = get_income(income_id, user_id, &connection)?;

    Ok(Json(IncomeView::from(&income)))
}

/// Replace one of the logged in user's incomes.
pub async fn replace_income_endpoint(
    State(state): State<IncomeState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(income_id): ApiPath<IncomeId>,
    ApiJson(form): ApiJson<IncomeForm>,
) -> Result<Json<IncomeView>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let current = get_income(income_id, user_id, &connection)?;

    let data = form.into_replacement(&current)?;
    let income = update_income(income_id, user_id, data, &connection)?;

    Ok(Json(IncomeView::from(&income)))
}

/// Change some of the fields of one of the logged in user's incomes.
pub async fn patch_income_endpoint(
    State(state): State<IncomeState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(income_id): ApiPath<IncomeId>,
    ApiJson(form): ApiJson<IncomeForm>,
) -> Result<Json<IncomeView>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let current = get_income(income_id, user_id, &connection)?;

    let data = form.into_patch(&current)?;
    let income = update_income(income_id, user_id, data, &connection)?;

    Ok(Json(IncomeView::from(&income)))
}

/// Delete one of the logged in user's incomes.
pub async fn delete_income_endpoint(
    State(state): State<IncomeState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(income_id): ApiPath<IncomeId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_income(income_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
