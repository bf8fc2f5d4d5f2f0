//! Authentication middleware that validates bearer tokens on protected routes.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::token::{JwtKeys, TokenType, decode_token},
    db::lock_connection,
    user::get_user_by_id,
};

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The keys for verifying access tokens.
    pub jwt_keys: JwtKeys,
    /// The database connection for checking that the user still exists.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            jwt_keys: state.jwt_keys.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Middleware function that checks for a valid access token in the `Authorization` header.
///
/// The user ID is placed into request and then the request executed normally if the token is
/// valid, otherwise a 401 response with a JSON error body is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let bearer =
        match TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &state).await {
            Ok(TypedHeader(Authorization(bearer))) => bearer,
            Err(rejection) if rejection.is_missing() => {
                return Error::MissingToken.into_response();
            }
            Err(rejection) => {
                tracing::debug!("Malformed authorization header: {rejection}");
                return Error::InvalidToken.into_response();
            }
        };

    let user_id = match decode_token(bearer.token(), TokenType::Access, &state.jwt_keys) {
        Ok(user_id) => user_id,
        Err(error) => return error.into_response(),
    };

    let user_exists = match lock_connection(&state.db_connection) {
        Ok(connection) => get_user_by_id(user_id, &connection),
        Err(error) => return error.into_response(),
    };

    match user_exists {
        Ok(_) => {}
        Err(Error::NotFound) => return Error::InvalidToken.into_response(),
        Err(error) => return error.into_response(),
    }

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}

#[cfg(test)]
mod auth_guard_tests {
    use axum::{Extension, Router, http::StatusCode, middleware, routing::get};
    use axum_test::TestServer;
    use serde_json::json;
    use time::Duration;

    use crate::{
        UserID,
        auth::{
            middleware::{AuthState, auth_guard},
            token::{TokenType, create_token},
        },
        test_utils::{create_test_user, get_test_state},
    };

    async fn test_handler(Extension(user_id): Extension<UserID>) -> String {
        user_id.to_string()
    }

    const TEST_PROTECTED_ROUTE: &str = "/protected";

    fn get_test_server() -> (TestServer, AuthState, UserID) {
        let app_state = get_test_state();
        let user = create_test_user(&app_state, "ana@example.com");
        let state = AuthState {
            jwt_keys: app_state.jwt_keys.clone(),
            db_connection: app_state.db_connection.clone(),
        };

        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(test_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

        (
            TestServer::new(app).expect("Could not create test server."),
            state,
            user.id,
        )
    }

    fn token(state: &AuthState, user_id: UserID, token_type: TokenType) -> String {
        create_token(user_id, token_type, Duration::minutes(5), &state.jwt_keys).unwrap()
    }

    #[tokio::test]
    async fn get_protected_route_with_valid_token() {
        let (server, state, user_id) = get_test_server();

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_header(
                "Authorization",
                format!("Bearer {}", token(&state, user_id, TokenType::Access)),
            )
            .await;

        response.assert_status_ok();
        response.assert_text(user_id.to_string());
    }

    #[tokio::test]
    async fn get_protected_route_without_token() {
        let (server, _, _) = get_test_server();

        let response = server.get(TEST_PROTECTED_ROUTE).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(
            &json!({"detail": "No se proporcionaron las credenciales de autenticación."}),
        );
    }

    #[tokio::test]
    async fn get_protected_route_with_refresh_token() {
        let (server, state, user_id) = get_test_server();

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_header(
                "Authorization",
                format!("Bearer {}", token(&state, user_id, TokenType::Refresh)),
            )
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn get_protected_route_with_garbage_token() {
        let (server, _, _) = get_test_server();

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_header("Authorization", "Bearer foo.bar.baz")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(&json!({"detail": "El token es inválido o ha expirado."}));
    }

    #[tokio::test]
    async fn get_protected_route_for_deleted_user() {
        let (server, state, _) = get_test_server();

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_header(
                "Authorization",
                format!(
                    "Bearer {}",
                    token(&state, UserID::new(999), TokenType::Access)
                ),
            )
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
