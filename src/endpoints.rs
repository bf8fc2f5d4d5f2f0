//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/v1/gastos/{gasto_id}/', use [format_endpoint].

/// The route for logging in with an email and password.
pub const LOG_IN: &str = "/api/v1/auth/login/";
/// The route for exchanging a refresh token for an access token.
pub const REFRESH: &str = "/api/v1/auth/refresh/";
/// The route for registering a new account.
pub const REGISTER: &str = "/api/v1/auth/register/";
/// The route for logging in with a Google ID token.
pub const GOOGLE_LOG_IN: &str = "/api/v1/auth/login/google/";
/// The route for the public log in settings.
pub const AUTH_CONFIG: &str = "/api/v1/auth/config/";
/// The route for requesting a password reset link.
pub const PASSWORD_RESET: &str = "/api/v1/auth/password/reset/";
/// The route for setting a new password with a reset link.
pub const PASSWORD_RESET_CONFIRM: &str = "/api/v1/auth/password/reset/confirm/";
/// The route for changing the logged in user's password.
pub const PASSWORD_CHANGE: &str = "/api/v1/auth/password/change/";
/// The route for the logged in user's profile.
pub const ME: &str = "/api/v1/auth/me/";

/// The route to list and create budget items.
pub const BUDGET_ITEMS: &str = "/api/v1/partidas/";
/// The route to access a single budget item.
pub const BUDGET_ITEM: &str = "/api/v1/partidas/{budget_item_id}/";
/// The route to list and create expenses.
pub const EXPENSES: &str = "/api/v1/gastos/";
/// The route to access a single expense.
pub const EXPENSE: &str = "/api/v1/gastos/{expense_id}/";
/// The route to list and create incomes.
pub const INCOMES: &str = "/api/v1/ingresos/";
/// The route to access a single income.
pub const INCOME: &str = "/api/v1/ingresos/{income_id}/";
/// The route for the monthly financial summary.
pub const SUMMARY: &str = "/api/v1/resumen/";

/// The route for uploaded files, e.g. profile photos.
pub const MEDIA: &str = "/media";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
