//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::{
    AppState, Error,
    auth::{
        auth_guard, change_password, confirm_password_reset, get_client_config, get_profile,
        google_log_in, log_in, refresh_access_token, register_user, request_password_reset,
        update_profile_endpoint,
    },
    budget::{
        create_budget_item_endpoint, delete_budget_item_endpoint, get_budget_item_endpoint,
        list_budget_items_endpoint, patch_budget_item_endpoint, replace_budget_item_endpoint,
    },
    endpoints,
    expense::{
        create_expense_endpoint, delete_expense_endpoint, get_expense_endpoint,
        list_expenses_endpoint, patch_expense_endpoint, replace_expense_endpoint,
    },
    income::{
        create_income_endpoint, delete_income_endpoint, get_income_endpoint,
        list_incomes_endpoint, patch_income_endpoint, replace_income_endpoint,
    },
    summary::get_summary_endpoint,
};

/// The largest request body accepted, which limits the size of profile photos.
pub const MAX_REQUEST_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN, post(log_in))
        .route(endpoints::REFRESH, post(refresh_access_token))
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::GOOGLE_LOG_IN, post(google_log_in))
        .route(endpoints::AUTH_CONFIG, get(get_client_config))
        .route(endpoints::PASSWORD_RESET, post(request_password_reset))
        .route(
            endpoints::PASSWORD_RESET_CONFIRM,
            post(confirm_password_reset),
        );

    let protected_routes = Router::new()
        .route(
            endpoints::ME,
            get(get_profile)
                .put(update_profile_endpoint)
                .patch(update_profile_endpoint),
        )
        .route(endpoints::PASSWORD_CHANGE, post(change_password))
        .route(
            endpoints::BUDGET_ITEMS,
            get(list_budget_items_endpoint).post(create_budget_item_endpoint),
        )
        .route(
            endpoints::BUDGET_ITEM,
            get(get_budget_item_endpoint)
                .put(replace_budget_item_endpoint)
                .patch(patch_budget_item_endpoint)
                .delete(delete_budget_item_endpoint),
        )
        .route(
            endpoints::EXPENSES,
            get(list_expenses_endpoint).post(create_expense_endpoint),
        )
        .route(
            endpoints::EXPENSE,
            get(get_expense_endpoint)
                .put(replace_expense_endpoint)
                .patch(patch_expense_endpoint)
                .delete(delete_expense_endpoint),
        )
        .route(
            endpoints::INCOMES,
            get(list_incomes_endpoint).post(create_income_endpoint),
        )
        .route(
            endpoints::INCOME,
            get(get_income_endpoint)
                .put(replace_income_endpoint)
                .patch(patch_income_endpoint)
                .delete(delete_income_endpoint),
        )
        .route(endpoints::SUMMARY, get(get_summary_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::MEDIA, ServeDir::new(&state.config.media_dir))
        .fallback(get_404_not_found)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
