//! Handler for creating a new account with an email address and password.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;

use crate::{
    AppState, Email, Error, PasswordHash,
    auth::{
        log_in::{AuthResponse, log_in_user},
        recaptcha::check_recaptcha,
    },
    db::lock_connection,
    json::ApiJson,
    user::{NewUser, create_user, generate_unique_username},
};

/// The data sent by the client to register a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    /// The email address to log in with.
    pub email: String,
    /// The password to log in with.
    pub password: String,
    /// The user's given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// The user's family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// The user's phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// The response of the client side reCAPTCHA widget.
    #[serde(default)]
    pub recaptcha_token: Option<String>,
}

/// Handler for registration requests.
///
/// On success the new user is logged in and the response has the same body as a log in.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - reCAPTCHA is enabled and the token is missing or does not verify.
/// - The email address is invalid or already registered.
/// - The password is too weak.
/// - An internal error occurred when hashing the password or saving the user.
pub async fn register_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(form): ApiJson<RegisterForm>,
) -> Result<(StatusCode, Json<AuthResponse>), Error> {
    check_recaptcha(&state, form.recaptcha_token.as_deref(), &headers).await?;

    let email = Email::new(&form.email)?;
    let first_name = form.first_name.unwrap_or_default().trim().to_owned();
    let last_name = form.last_name.unwrap_or_default().trim().to_owned();
    let phone = form.phone.unwrap_or_default().trim().to_owned();

    let password_hash = PasswordHash::from_raw_password(
        &form.password,
        &[email.as_ref(), email.local_part(), &first_name, &last_name],
        state.config.password_hash_cost,
    )?;

    let connection = lock_connection(&state.db_connection)?;

    let username = generate_unique_username(email.local_part(), &connection)?;
    let user = create_user(
        NewUser {
            username,
            email,
            password_hash,
            first_name,
            last_name,
            phone,
            google_avatar_url: String::new(),
        },
        &connection,
    )
    .inspect_err(|error| {
        if *error != Error::DuplicateEmail {
            tracing::error!("An unexpected error occurred while creating a user: {error}");
        }
    })?;

    tracing::info!("Registered user {} ({})", user.username, user.id);

    let response = log_in_user(&user, &state, &connection)?;

    Ok((StatusCode::CREATED, Json(response)))
}
