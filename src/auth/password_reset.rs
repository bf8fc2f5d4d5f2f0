//! Resetting a forgotten password through a link sent by email.
//!
//! Reset tokens are not stored. A token is a timestamp and a hash over the
//! app's secret key and the user's password hash and last log in time, so it
//! stops working once the password changes or the user logs in again.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha512};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Email, Error, PasswordHash, User, UserID,
    db::lock_connection,
    json::ApiJson,
    mailer::{OutgoingEmail, deliver},
    user::{get_user_by_email, get_user_by_id, set_password},
};

/// The number of hex characters of the hash kept in a token.
const TOKEN_HASH_LENGTH: usize = 40;

/// The path of the web client's page for choosing a new password.
const RESET_PAGE_PATH: &str = "recuperar-clave";

/// The message sent for every reset request, whether or not the email is registered.
pub const RESET_REQUESTED_MESSAGE: &str =
    "Si el correo está registrado, te enviaremos un enlace para restablecer tu contraseña.";

/// The message sent after the password has been reset.
pub const RESET_COMPLETE_MESSAGE: &str = "Tu contraseña se restableció correctamente.";

/// Encode a user ID for use in a reset link.
pub fn encode_uid(user_id: UserID) -> String {
    hex::encode(user_id.to_string())
}

/// Decode a user ID created with [encode_uid].
pub fn decode_uid(uid: &str) -> Option<UserID> {
    let bytes = hex::decode(uid).ok()?;
    let text = String::from_utf8(bytes).ok()?;

    text.parse().ok().map(UserID::new)
}

/// Create a password reset token for `user` issued at `now`.
pub fn make_reset_token(user: &User, secret_key: &str, now: OffsetDateTime) -> String {
    let timestamp = now.unix_timestamp().max(0) as u64;

    format!(
        "{}-{}",
        to_base36(timestamp),
        token_hash(user, secret_key, timestamp)
    )
}

/// Whether `token` was issued to `user` no longer than `timeout` before `now`.
pub fn check_reset_token(
    user: &User,
    token: &str,
    secret_key: &str,
    timeout: Duration,
    now: OffsetDateTime,
) -> bool {
    let Some((raw_timestamp, hash)) = token.split_once('-') else {
        return false;
    };

    let Some(timestamp) = from_base36(raw_timestamp) else {
        return false;
    };

    if !constant_time_eq(
        token_hash(user, secret_key, timestamp).as_bytes(),
        hash.as_bytes(),
    ) {
        return false;
    }

    let age = now.unix_timestamp() - timestamp as i64;

    (0..=timeout.whole_seconds()).contains(&age)
}

fn token_hash(user: &User, secret_key: &str, timestamp: u64) -> String {
    let last_login = user
        .last_login
        .map(|last_login| last_login.unix_timestamp_nanos().to_string())
        .unwrap_or_default();

    let mut hasher = Sha512::new();
    hasher.update(secret_key.as_bytes());
    hasher.update(b"|password-reset|");
    hasher.update(user.id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(user.password_hash.as_ref().as_bytes());
    hasher.update(b"|");
    hasher.update(last_login.as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp.to_string().as_bytes());

    let mut hash = hex::encode(hasher.finalize());
    hash.truncate(TOKEN_HASH_LENGTH);
    hash
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .fold(0, |difference, (a, b)| difference | (a ^ b))
            == 0
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_owned();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    String::from_utf8_lossy(&digits).into_owned()
}

fn from_base36(text: &str) -> Option<u64> {
    if text.is_empty() || text.len() > 13 {
        return None;
    }

    u64::from_str_radix(text, 36).ok()
}

/// The link to the web client's password reset page for `user`.
pub fn reset_link(user: &User, state: &AppState, now: OffsetDateTime) -> String {
    format!(
        "{}/{RESET_PAGE_PATH}/{}/{}",
        state.config.frontend_url.trim_end_matches('/'),
        encode_uid(user.id),
        make_reset_token(user, &state.config.secret_key, now)
    )
}

fn reset_email(user: &User, link: &str, from: &str) -> OutgoingEmail {
    OutgoingEmail {
        from: from.to_owned(),
        to: user.email.to_string(),
        subject: "Restablece tu contraseña de Finova".to_owned(),
        body: format!(
            "Hola {},\n\n\
             Recibimos una solicitud para restablecer la contraseña de tu cuenta de Finova. \
             Abre el siguiente enlace para elegir una nueva contraseña:\n\n\
             {link}\n\n\
             Si no solicitaste este cambio, puedes ignorar este correo.\n",
            user.full_name()
        ),
    }
}

/// The body of a password reset request.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRequest {
    /// The email address of the account.
    pub email: String,
}

/// Handler for requesting a password reset link.
///
/// The response is the same whether or not an account with the email exists.
///
/// # Errors
///
/// Returns an [Error::InvalidEmail] if the email address is not valid.
pub async fn request_password_reset(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PasswordResetRequest>,
) -> Result<Json<Value>, Error> {
    let email = Email::new(&request.email)?;

    let user = {
        let connection = lock_connection(&state.db_connection)?;

        match get_user_by_email(&email, &connection) {
            Ok(user) => Some(user),
            Err(Error::NotFound) => None,
            Err(error) => return Err(error),
        }
    };

    match user {
        Some(user) => {
            let link = reset_link(&user, &state, OffsetDateTime::now_utc());
            let email = reset_email(&user, &link, &state.config.default_from_email);

            if let Err(error) = deliver(state.mailer.clone(), email).await {
                tracing::error!("Could not send password reset email to user {}: {error}", user.id);
            }
        }
        None => tracing::info!("Password reset requested for unknown email {email}"),
    }

    Ok(Json(json!({ "detail": RESET_REQUESTED_MESSAGE })))
}

/// The body of a request to set a new password with a reset link.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetConfirmation {
    /// The encoded user ID from the reset link.
    pub uid: String,
    /// The token from the reset link.
    pub token: String,
    /// The new password.
    pub password: String,
}

/// Handler for setting a new password with the details from a reset link.
///
/// # Errors
///
/// Returns an [Error::InvalidResetLink] if the link is not valid for any user,
/// or an [Error::TooWeak] if the new password is too easy to guess.
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ApiJson(confirmation): ApiJson<PasswordResetConfirmation>,
) -> Result<Json<Value>, Error> {
    let user_id = decode_uid(&confirmation.uid).ok_or(Error::InvalidResetLink)?;

    let connection = lock_connection(&state.db_connection)?;

    let user = match get_user_by_id(user_id, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidResetLink),
        Err(error) => return Err(error),
    };

    let is_token_valid = check_reset_token(
        &user,
        &confirmation.token,
        &state.config.secret_key,
        state.config.password_reset_timeout,
        OffsetDateTime::now_utc(),
    );

    if !is_token_valid {
        return Err(Error::InvalidResetLink);
    }

    let password_hash = PasswordHash::from_raw_password(
        &confirmation.password,
        &user.password_user_inputs(),
        state.config.password_hash_cost,
    )?;

    set_password(user.id, &password_hash, &connection)?;
    tracing::info!("Password reset for user {}", user.id);

    Ok(Json(json!({ "detail": RESET_COMPLETE_MESSAGE })))
}


#[cfg(test)]
mod password_reset_endpoint_tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        auth::password_reset::{RESET_COMPLETE_MESSAGE, RESET_REQUESTED_MESSAGE},
        endpoints,
        test_utils::{
            RecordingMailer, TEST_PASSWORD, create_test_user, get_test_server, get_test_state,
        },
    };

    const NEW_PASSWORD: &str = "anotherverysafeandsecurepassphrase";

    /// Get the uid and token from the reset link in an email body.
    fn parse_link(body: &str) -> (String, String) {
        let link = body
            .lines()
            .find(|line| line.contains("/recuperar-clave/"))
            .expect("Could not find reset link in email");
        let mut parts = link.rsplit('/');
        let token = parts.next().unwrap().to_owned();
        let uid = parts.next().unwrap().to_owned();

        (uid, token)
    }

    #[tokio::test]
    async fn reset_flow_sets_new_password() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = get_test_state().with_mailer(mailer.clone());
        create_test_user(&state, "ana@example.com");
        let server = get_test_server(state);

        let response = server
            .post(endpoints::PASSWORD_RESET)
            .json(&json!({"email": "ana@example.com"}))
            .await;
        response.assert_status_ok();
        response.assert_json(&json!({"detail": RESET_REQUESTED_MESSAGE}));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");
        assert!(sent[0].body.contains("http://localhost:3000/recuperar-clave/"));
        let (uid, token) = parse_link(&sent[0].body);

        let response = server
            .post(endpoints::PASSWORD_RESET_CONFIRM)
            .json(&json!({"uid": uid, "token": token, "password": NEW_PASSWORD}))
            .await;
        response.assert_status_ok();
        response.assert_json(&json!({"detail": RESET_COMPLETE_MESSAGE}));

        server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "ana@example.com", "password": NEW_PASSWORD}))
            .await
            .assert_status_ok();

        // The password hash changed, so the link no longer works.
        server
            .post(endpoints::PASSWORD_RESET_CONFIRM)
            .json(&json!({"uid": uid, "token": token, "password": TEST_PASSWORD}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_email_gets_same_response_without_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let server = get_test_server(get_test_state().with_mailer(mailer.clone()));

        let response = server
            .post(endpoints::PASSWORD_RESET)
            .json(&json!({"email": "nadie@example.com"}))
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({"detail": RESET_REQUESTED_MESSAGE}));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let server = get_test_server(get_test_state());

        let response = server
            .post(endpoints::PASSWORD_RESET)
            .json(&json!({"email": "nadie"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn confirm_rejects_bad_token() {
        let state = get_test_state();
        let user = create_test_user(&state, "ana@example.com");
        let server = get_test_server(state);

        let response = server
            .post(endpoints::PASSWORD_RESET_CONFIRM)
            .json(&json!({
                "uid": super::encode_uid(user.id),
                "token": "abc-123",
                "password": NEW_PASSWORD,
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"detail": "El enlace de recuperación es inválido o ha expirado."}));
    }

    #[tokio::test]
    async fn confirm_rejects_unknown_uid() {
        let server = get_test_server(get_test_state());

        let response = server
            .post(endpoints::PASSWORD_RESET_CONFIRM)
            .json(&json!({"uid": "zz", "token": "abc-123", "password": NEW_PASSWORD}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn confirm_rejects_weak_password() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = get_test_state().with_mailer(mailer.clone());
        create_test_user(&state, "ana@example.com");
        let server = get_test_server(state);

        server
            .post(endpoints::PASSWORD_RESET)
            .json(&json!({"email": "ana@example.com"}))
            .await
            .assert_status_ok();
        let (uid, token) = parse_link(&mailer.sent()[0].body);

        let response = server
            .post(endpoints::PASSWORD_RESET_CONFIRM)
            .json(&json!({"uid": uid, "token": token, "password": "123456"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
