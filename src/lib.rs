//! Finova is a backend for tracking personal finances.
//!
//! This library provides a JSON REST API for managing budget items
//! ("partidas"), expenses ("gastos") and incomes ("ingresos"), a monthly
//! financial summary with savings suggestions, and user accounts with
//! email/password and Google log in.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod auth;
mod budget;
mod config;
mod db;
mod email;
mod endpoints;
mod expense;
mod income;
mod json;
mod logging;
mod mailer;
mod money;
mod month;
mod password;
mod query;
mod routing;
mod summary;
mod timezone;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use config::{AppConfig, ServerConfig, SmtpSettings};
pub use db::initialize as initialize_db;
pub use email::Email;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use mailer::{LogMailer, Mailer, OutgoingEmail, SmtpMailer};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use user::{User, UserID, get_user_by_email, set_password};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
///
/// The messages of client-facing variants are sent to the API client verbatim
/// in the `detail` field of the JSON error body, so they are written in the
/// language of the app's users.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match an account.
    #[error("No se encontró una cuenta activa con las credenciales proporcionadas.")]
    InvalidCredentials,

    /// The request to a protected route did not include a bearer token.
    #[error("No se proporcionaron las credenciales de autenticación.")]
    MissingToken,

    /// The bearer token could not be decoded, has expired, is of the wrong
    /// kind, or refers to a user that no longer exists.
    #[error("El token es inválido o ha expirado.")]
    InvalidToken,

    /// A JSON web token could not be created.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// The user provided a password that is too easy to guess.
    #[error("La contraseña es demasiado débil: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The password given as the user's current password is wrong.
    #[error("La contraseña actual no es correcta.")]
    IncorrectPassword,

    /// The string is not a valid email address.
    #[error("\"{0}\" no es un correo electrónico válido.")]
    InvalidEmail(String),

    /// A user with the email address already exists.
    #[error("Ya existe un usuario con este correo electrónico.")]
    DuplicateEmail,

    /// The password reset link has an unknown user ID, a malformed or expired
    /// token, or a token that has already been used.
    #[error("El enlace de recuperación es inválido o ha expirado.")]
    InvalidResetLink,

    /// Registration requires a reCAPTCHA token but none was provided.
    #[error("Debes completar la verificación reCAPTCHA.")]
    RecaptchaRequired,

    /// The reCAPTCHA token did not pass verification.
    #[error("No pudimos validar el reCAPTCHA. Inténtalo nuevamente.")]
    RecaptchaFailed,

    /// Google log in was requested but no Google client ID is configured.
    #[error("El inicio de sesión con Google no está disponible.")]
    GoogleLoginDisabled,

    /// The Google ID token did not pass verification.
    #[error("No pudimos validar tu cuenta de Google.")]
    InvalidGoogleToken,

    /// An empty (or whitespace only) string was used as a budget item name.
    #[error("El nombre de la partida no puede estar vacío.")]
    EmptyBudgetItemName,

    /// A budget item name was longer than the allowed number of characters.
    #[error("El nombre de la partida no puede superar los {0} caracteres.")]
    BudgetItemNameTooLong(usize),

    /// The user already has a budget item with the name.
    #[error("Ya tienes una partida llamada \"{0}\".")]
    DuplicateBudgetItemName(String),

    /// An expense referred to a budget item that does not exist or belongs
    /// to another user.
    #[error("La partida {0} no existe.")]
    InvalidBudgetItem(i64),

    /// An expense had neither a budget item nor a category.
    #[error("Debes seleccionar una partida o indicar una categoría para el gasto.")]
    MissingExpenseCategory,

    /// A monetary amount was negative, had too many decimal places, or had too many digits.
    #[error("Monto inválido: {0}")]
    InvalidAmount(String),

    /// The request body or query string could not be parsed.
    #[error("Solicitud inválida: {0}")]
    InvalidRequest(String),

    /// A profile field has more characters than allowed.
    #[error("El campo \"{field}\" no puede superar los {max_length} caracteres.")]
    ProfileFieldTooLong {
        /// The name of the field.
        field: &'static str,
        /// The maximum number of characters.
        max_length: usize,
    },

    /// The request body is larger than the server accepts.
    #[error("El cuerpo de la solicitud es demasiado grande.")]
    RequestTooLarge,

    /// The uploaded profile photo could not be read or is not an image.
    #[error("La foto de perfil no es válida: {0}")]
    InvalidUpload(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("No encontrado.")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An email could not be built or delivered.
    #[error("could not send email: {0}")]
    EmailError(String),

    /// A file could not be written to or removed from the media directory.
    #[error("could not access media file: {0}")]
    FileError(String),

    /// The HTTP client for talking to Google could not be created.
    #[error("could not create HTTP client: {0}")]
    HttpClientError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::MissingToken | Error::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Error::TooWeak(_)
            | Error::IncorrectPassword
            | Error::InvalidEmail(_)
            | Error::DuplicateEmail
            | Error::InvalidResetLink
            | Error::RecaptchaRequired
            | Error::RecaptchaFailed
            | Error::GoogleLoginDisabled
            | Error::InvalidGoogleToken
            | Error::EmptyBudgetItemName
            | Error::BudgetItemNameTooLong(_)
            | Error::DuplicateBudgetItemName(_)
            | Error::InvalidBudgetItem(_)
            | Error::MissingExpenseCategory
            | Error::InvalidAmount(_)
            | Error::InvalidRequest(_)
            | Error::InvalidUpload(_)
            | Error::ProfileFieldTooLong { .. } => StatusCode::BAD_REQUEST,
            Error::TokenCreation(_)
            | Error::HashingError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::InvalidTimezoneError(_)
            | Error::EmailError(_)
            | Error::FileError(_)
            | Error::HttpClientError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal errors are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "Ocurrió un error inesperado. Inténtalo más tarde.".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
