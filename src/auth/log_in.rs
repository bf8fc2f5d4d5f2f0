//! Handlers for logging in with an email and password, and for exchanging a
//! refresh token for a new access token.

use axum::{Json, extract::State};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Email, Error, User,
    auth::token::{TokenType, create_token, create_token_pair, decode_token},
    db::lock_connection,
    json::ApiJson,
    user::{UserView, get_user_by_email, get_user_by_id, record_login},
};

/// The raw data entered by the user in the log-in form.
///
/// The password is stored as a plain string. There is no need for validation here since
/// it will be compared against the password in the database, which has been verified.
#[derive(Debug, Clone, Deserialize)]
pub struct LogInData {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
}

/// The tokens and user details sent to a client that has logged in.
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    /// The access token.
    pub access: String,
    /// The refresh token.
    pub refresh: String,
    /// The user that logged in.
    pub user: UserView,
}

/// Record that `user` logged in and issue them a new pair of tokens.
pub(crate) fn log_in_user(
    user: &User,
    state: &AppState,
    connection: &Connection,
) -> Result<AuthResponse, Error> {
    record_login(user.id, OffsetDateTime::now_utc(), connection)?;

    let tokens = create_token_pair(user.id, &state.config, &state.jwt_keys)?;

    Ok(AuthResponse {
        access: tokens.access,
        refresh: tokens.refresh,
        user: UserView::new(user, &state.config.public_url),
    })
}

/// Handler for log-in requests.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The email does not belong to a registered user.
/// - The password is not correct, or the account has no usable password.
/// - An internal error occurred when verifying the password.
pub async fn log_in(
    State(state): State<AppState>,
    ApiJson(user_data): ApiJson<LogInData>,
) -> Result<Json<AuthResponse>, Error> {
    let email = Email::new(&user_data.email).map_err(|_| Error::InvalidCredentials)?;

    let connection = lock_connection(&state.db_connection)?;

    let user = match get_user_by_email(&email, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    let is_password_valid = user
        .password_hash
        .verify(&user_data.password)
        .map_err(|error| {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            Error::HashingError(error.to_string())
        })?;

    if !is_password_valid {
        return Err(Error::InvalidCredentials);
    }

    log_in_user(&user, &state, &connection).map(Json)
}

/// The body of a token refresh request.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshData {
    /// A refresh token issued at log in.
    pub refresh: String,
}

/// A freshly issued access token.
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    /// The access token.
    pub access: String,
}

/// Handler for exchanging a refresh token for a new access token.
///
/// # Errors
///
/// Returns an [Error::InvalidToken] if the refresh token is invalid, has
/// expired, is an access token, or belongs to a user that no longer exists.
pub async fn refresh_access_token(
    State(state): State<AppState>,
    ApiJson(data): ApiJson<RefreshData>,
) -> Result<Json<AccessToken>, Error> {
    let user_id = decode_token(&data.refresh, TokenType::Refresh, &state.jwt_keys)?;

    {
        let connection = lock_connection(&state.db_connection)?;

        match get_user_by_id(user_id, &connection) {
            Ok(_) => {}
            Err(Error::NotFound) => return Err(Error::InvalidToken),
            Err(error) => return Err(error),
        }
    }

    let access = create_token(
        user_id,
        TokenType::Access,
        state.config.access_token_lifetime,
        &state.jwt_keys,
    )?;

    Ok(Json(AccessToken { access }))
}

#[cfg(test)]
mod log_in_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints,
        test_utils::{TEST_PASSWORD, create_test_user, get_test_server, get_test_state},
        user::get_user_by_id,
    };

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let state = get_test_state();
        let user = create_test_user(&state, "ana@example.com");
        let server = get_test_server(state.clone());

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "ana@example.com", "password": TEST_PASSWORD}))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert!(body["access"].is_string());
        assert!(body["refresh"].is_string());
        assert_eq!(body["user"]["email"], "ana@example.com");
        assert_eq!(body["user"]["id"], user.id.as_i64());

        let user = get_user_by_id(user.id, &state.db_connection.lock().unwrap()).unwrap();
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn log_in_ignores_email_case() {
        let state = get_test_state();
        create_test_user(&state, "ana@example.com");
        let server = get_test_server(state);

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "ANA@example.com", "password": TEST_PASSWORD}))
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let state = get_test_state();
        create_test_user(&state, "ana@example.com");
        let server = get_test_server(state);

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "ana@example.com", "password": "wrongpassword"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body = response.json::<Value>();
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_email() {
        let server = get_test_server(get_test_state());

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "nadie@example.com", "password": TEST_PASSWORD}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn log_in_fails_with_missing_password() {
        let server = get_test_server(get_test_state());

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "ana@example.com"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[cfg(test)]
mod refresh_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        auth::token::{TokenType, create_token, create_token_pair},
        endpoints,
        test_utils::{create_test_user, get_test_server, get_test_state},
        UserID,
    };

    #[tokio::test]
    async fn refresh_gives_new_access_token() {
        let state = get_test_state();
        let user = create_test_user(&state, "ana@example.com");
        let tokens = create_token_pair(user.id, &state.config, &state.jwt_keys).unwrap();
        let server = get_test_server(state);

        let response = server
            .post(endpoints::REFRESH)
            .json(&json!({"refresh": tokens.refresh}))
            .await;

        response.assert_status_ok();
        assert!(response.json::<Value>()["access"].is_string());
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let state = get_test_state();
        let user = create_test_user(&state, "ana@example.com");
        let tokens = create_token_pair(user.id, &state.config, &state.jwt_keys).unwrap();
        let server = get_test_server(state);

        let response = server
            .post(endpoints::REFRESH)
            .json(&json!({"refresh": tokens.access}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_rejects_token_of_deleted_user() {
        let state = get_test_state();
        let refresh = create_token(
            UserID::new(999),
            TokenType::Refresh,
            state.config.refresh_token_lifetime,
            &state.jwt_keys,
        )
        .unwrap();
        let server = get_test_server(state);

        let response = server
            .post(endpoints::REFRESH)
            .json(&json!({"refresh": refresh}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
