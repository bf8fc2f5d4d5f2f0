//! Route handlers for the expense API.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error, UserID,
    budget::get_budget_item,
    db::lock_connection,
    expense::{
        ExpenseData, ExpenseFilter, ExpenseForm, ExpenseId, ExpenseView, create_expense,
        delete_expense, get_expense, get_expenses, update_expense,
    },
    json::ApiJson,
    query::{ApiPath, ApiQuery, DateRange, DateRangeQuery, parse_optional_id},
    timezone::local_today,
};

/// The state needed by the expense handlers.
#[derive(Debug, Clone)]
pub struct ExpenseState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone used to decide the default date of new expenses.
    pub local_timezone: String,
}

impl FromRef<AppState> for ExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.config.local_timezone.clone(),
        }
    }
}

/// The raw query parameters for listing expenses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseQuery {
    #[serde(flatten)]
    pub date_range: DateRangeQuery,
    /// Only include expenses of this budget item, and expenses without one.
    pub partida: Option<String>,
}

impl TryFrom<ExpenseQuery> for ExpenseFilter {
    type Error = Error;

    fn try_from(query: ExpenseQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            date_range: DateRange::try_from(&query.date_range)?,
            budget_item_id: parse_optional_id("partida", query.partida.as_deref())?,
        })
    }
}

/// List the logged in user's expenses, newest first.
///
/// Accepts the query parameters `desde`, `hasta` and `partida`.
pub async fn list_expenses_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    ApiQuery(query): ApiQuery<ExpenseQuery>,
) -> Result<Json<Vec<ExpenseView>>, Error> {
    let filter = ExpenseFilter::try_from(query)?;
    let connection = lock_connection(&state.db_connection)?;

    let expenses = get_expenses(user_id, filter, &connection)?;

    Ok(Json(expenses.iter().map(ExpenseView::from).collect()))
}

/// Create an expense for the logged in user.
pub async fn create_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    ApiJson(form): ApiJson<ExpenseForm>,
) -> Result<(StatusCode, Json<ExpenseView>), Error> {
    let data = form.into_new(local_today(&state.local_timezone)?)?;
    let connection = lock_connection(&state.db_connection)?;

    check_budget_item_owner(&data, user_id, &connection)?;
    let expense = create_expense(user_id, data, &connection)?;

    Ok((StatusCode::CREATED, Json(ExpenseView::from(&expense))))
}

/// Get one of the logged in user's expenses.
pub async fn get_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(expense_id): ApiPath<ExpenseId>,
) -> Result<Json<ExpenseView>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let expense = get_expense(expense_id, user_id, &connection)?;

    Ok(Json(ExpenseView::from(&expense)))
}

/// Replace one of the logged in user's expenses.
pub async fn replace_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(expense_id): ApiPath<ExpenseId>,
    ApiJson(form): ApiJson<ExpenseForm>,
) -> Result<Json<ExpenseView>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let current = get_expense(expense_id, user_id, &connection)?;

    let data = form.into_replacement(&current)?;
    check_budget_item_owner(&data, user_id, &connection)?;
    let expense = update_expense(expense_id, user_id, data, &connection)?;

    Ok(Json(ExpenseView::from(&expense)))
}

/// Change some of the fields of one of the logged in user's expenses.
pub async fn patch_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(expense_id): ApiPath<ExpenseId>,
    ApiJson(form): ApiJson<ExpenseForm>,
) -> Result<Json<ExpenseView>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let current = get_expense(expense_id, user_id, &connection)?;

    let data = form.into_patch(&current)?;
    check_budget_item_owner(&data, user_id, &connection)?;
    let expense = update_expense(expense_id, user_id, data, &connection)?;

    Ok(Json(ExpenseView::from(&expense)))
}

/// Delete one of the logged in user's expenses.
pub async fn delete_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(expense_id): ApiPath<ExpenseId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_expense(expense_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

fn check_budget_item_owner(
    data: &ExpenseData,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let Some(budget_item_id) = data.budget_item_id else {
        return Ok(());
    };

    match get_budget_item(budget_item_id, user_id, connection) {
        Ok(_) => Ok(()),
        Err(Error::NotFound) => Err(Error::InvalidBudgetItem(budget_item_id)),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod expense_endpoint_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use time::OffsetDateTime;

    use crate::{
        AppState, endpoints,
        endpoints::format_endpoint,
        test_utils::{bearer, create_test_user, get_test_server, get_test_state},
    };

    fn set_up() -> (TestServer, AppState, String) {
        let state = get_test_state();
        let user = create_test_user(&state, "ana@example.com");
        let auth = bearer(&state, user.id);
        let server = get_test_server(state.clone());

        (server, state, auth)
    }

    async fn post(server: &TestServer, path: &str, auth: &str, body: Value) -> Value {
        let response = server
            .post(path)
            .add_header("Authorization", auth.to_owned())
            .json(&body)
            .await;

        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()
    }

    async fn list(server: &TestServer, auth: &str, query: &str) -> Vec<Value> {
        let response = server
            .get(&format!("{}{query}", endpoints::EXPENSES))
            .add_header("Authorization", auth.to_owned())
            .await;

        response.assert_status_ok();
        response.json::<Vec<Value>>()
    }

    #[tokio::test]
    async fn create_expense_with_budget_item() {
        let (server, _, auth) = set_up();
        let item = post(
            &server,
            endpoints::BUDGET_ITEMS,
            &auth,
            json!({"nombre": "Supermercado", "monto_asignado": 1000}),
        )
        .await;

        let body = post(
            &server,
            endpoints::EXPENSES,
            &auth,
            json!({"partida": item["id"], "monto": "35.5", "fecha": "2025-03-04", "observacion": null}),
        )
        .await;

        assert_eq!(body["partida"], item["id"]);
        assert_eq!(body["partida_nombre"], "Supermercado");
        assert_eq!(body["monto"], "35.50");
        assert_eq!(body["fecha"], "2025-03-04");
        assert_eq!(body["tipo"], "variable");
        assert_eq!(body["categoria"], "");
        assert_eq!(body["observacion"], "");
    }

    #[tokio::test]
    async fn create_expense_defaults_to_today() {
        let (server, _, auth) = set_up();

        let body = post(
            &server,
            endpoints::EXPENSES,
            &auth,
            json!({"categoria": "Regalos", "monto": 10}),
        )
        .await;

        // The test config uses UTC as the local timezone.
        let today = OffsetDateTime::now_utc().date().to_string();
        assert_eq!(body["fecha"], today);
        assert_eq!(body["partida"], Value::Null);
        assert_eq!(body["partida_nombre"], "Regalos");
    }

    #[tokio::test]
    async fn create_expense_without_budget_item_or_category_fails() {
        let (server, _, auth) = set_up();

        let response = server
            .post(endpoints::EXPENSES)
            .add_header("Authorization", auth)
            .json(&json!({"monto": 10, "categoria": null}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({
            "detail": "Debes seleccionar una partida o indicar una categoría para el gasto."
        }));
    }

    #[tokio::test]
    async fn create_expense_with_other_users_budget_item_fails() {
        let (server, state, auth) = set_up();
        let other_user = create_test_user(&state, "beto@example.com");
        let other_auth = bearer(&state, other_user.id);
        let item = post(
            &server,
            endpoints::BUDGET_ITEMS,
            &other_auth,
            json!({"nombre": "Ocio", "monto_asignado": 1}),
        )
        .await;

        let response = server
            .post(endpoints::EXPENSES)
            .add_header("Authorization", auth)
            .json(&json!({"partida": item["id"], "monto": 10}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_filters_by_date_and_budget_item() {
        let (server, _, auth) = set_up();
        let groceries = post(
            &server,
            endpoints::BUDGET_ITEMS,
            &auth,
            json!({"nombre": "Supermercado", "monto_asignado": 1}),
        )
        .await;
        let transport = post(
            &server,
            endpoints::BUDGET_ITEMS,
            &auth,
            json!({"nombre": "Transporte", "monto_asignado": 1}),
        )
        .await;
        for (budget_item, date) in [
            (&groceries["id"], "2025-03-01"),
            (&transport["id"], "2025-03-15"),
            (&Value::Null, "2025-03-20"),
            (&groceries["id"], "2025-04-02"),
        ] {
            post(
                &server,
                endpoints::EXPENSES,
                &auth,
                json!({"partida": budget_item, "categoria": "Varios", "monto": 1, "fecha": date}),
            )
            .await;
        }

        let all = list(&server, &auth, "").await;
        let dates: Vec<&str> = all.iter().map(|e| e["fecha"].as_str().unwrap()).collect();
        assert_eq!(dates, ["2025-04-02", "2025-03-20", "2025-03-15", "2025-03-01"]);

        let march = list(&server, &auth, "?desde=2025-03-01&hasta=2025-03-31").await;
        assert_eq!(march.len(), 3);

        let groceries_or_none = list(
            &server,
            &auth,
            &format!("?partida={}&desde=&hasta=2025-03-31", groceries["id"]),
        )
        .await;
        let dates: Vec<&str> = groceries_or_none
            .iter()
            .map(|e| e["fecha"].as_str().unwrap())
            .collect();
        assert_eq!(dates, ["2025-03-20", "2025-03-01"]);
    }

    #[tokio::test]
    async fn list_with_invalid_date_is_bad_request() {
        let (server, _, auth) = set_up();

        let response = server
            .get(&format!("{}?desde=ayer", endpoints::EXPENSES))
            .add_header("Authorization", auth)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_numeric_id_is_json_not_found() {
        let (server, _, auth) = set_up();

        let responses = [
            server
                .get("/api/v1/gastos/abc/")
                .add_header("Authorization", auth.clone())
                .await,
            server
                .delete("/api/v1/partidas/abc/")
                .add_header("Authorization", auth.clone())
                .await,
            server
                .patch("/api/v1/ingresos/abc/")
                .add_header("Authorization", auth.clone())
                .json(&json!({"monto": 1}))
                .await,
        ];

        for response in responses {
            response.assert_status(StatusCode::NOT_FOUND);
            response.assert_json(&json!({"detail": "No encontrado."}));
        }
    }

    #[tokio::test]
    async fn patch_and_delete_expense() {
        let (server, _, auth) = set_up();
        let expense = post(
            &server,
            endpoints::EXPENSES,
            &auth,
            json!({"categoria": "Regalos", "monto": 10, "fecha": "2025-03-04"}),
        )
        .await;
        let path = format_endpoint(endpoints::EXPENSE, expense["id"].as_i64().unwrap());

        let response = server
            .patch(&path)
            .add_header("Authorization", auth.clone())
            .json(&json!({"monto": "12.00", "tipo": "fijo"}))
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["monto"], "12.00");
        assert_eq!(body["tipo"], "fijo");
        assert_eq!(body["categoria"], "Regalos");
        assert_eq!(body["fecha"], "2025-03-04");

        server
            .put(&path)
            .add_header("Authorization", auth.clone())
            .json(&json!({"categoria": "Otros"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .delete(&path)
            .add_header("Authorization", auth.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&path)
            .add_header("Authorization", auth)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_budget_item_keeps_expense() {
        let (server, _, auth) = set_up();
        let item = post(
            &server,
            endpoints::BUDGET_ITEMS,
            &auth,
            json!({"nombre": "Ocio", "monto_asignado": 1}),
        )
        .await;
        let expense = post(
            &server,
            endpoints::EXPENSES,
            &auth,
            json!({"partida": item["id"], "monto": 10}),
        )
        .await;

        server
            .delete(&format_endpoint(endpoints::BUDGET_ITEM, item["id"].as_i64().unwrap()))
            .add_header("Authorization", auth.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = server
            .get(&format_endpoint(endpoints::EXPENSE, expense["id"].as_i64().unwrap()))
            .add_header("Authorization", auth)
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["partida"], Value::Null);
        assert_eq!(body["partida_nombre"], Value::Null);
    }
}
