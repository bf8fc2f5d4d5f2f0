//! Handler for a logged in user changing their password.

use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error, PasswordHash, UserID,
    db::lock_connection,
    json::ApiJson,
    user::{get_user_by_id, set_password},
};

/// The message sent after the password has been changed.
pub const PASSWORD_CHANGED_MESSAGE: &str = "Contraseña actualizada correctamente.";

/// The current and new password entered by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordForm {
    /// The user's current password.
    pub password_actual: String,
    /// The password to replace it with.
    pub password_nuevo: String,
}

/// Handler for changing the password of the logged in user.
///
/// # Errors
///
/// Returns an [Error::IncorrectPassword] if the current password is wrong, or an
/// [Error::TooWeak] if the new password is too easy to guess.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserID>,
    ApiJson(form): ApiJson<ChangePasswordForm>,
) -> Result<Json<Value>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let user = get_user_by_id(user_id, &connection)?;

    let is_password_correct = user
        .password_hash
        .verify(&form.password_actual)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !is_password_correct {
        return Err(Error::IncorrectPassword);
    }

    let password_hash = PasswordHash::from_raw_password(
        &form.password_nuevo,
        &user.password_user_inputs(),
        state.config.password_hash_cost,
    )?;

    set_password(user.id, &password_hash, &connection)?;

    Ok(Json(json!({ "detail": PASSWORD_CHANGED_MESSAGE })))
}
