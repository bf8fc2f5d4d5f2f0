//! The public settings the web client needs before a user logs in.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::AppState;

/// Which optional log in features are enabled, and the public keys for them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientConfig {
    /// The OAuth client ID for Google log in, `None` if disabled.
    pub google_client_id: Option<String>,
    /// The public reCAPTCHA key, `None` if reCAPTCHA is disabled.
    pub recaptcha_site_key: Option<String>,
}

/// Handler for getting the public log in settings.
pub async fn get_client_config(State(state): State<AppState>) -> Json<ClientConfig> {
    Json(ClientConfig {
        google_client_id: state.config.google_client_id.clone(),
        recaptcha_site_key: state
            .config
            .recaptcha
            .as_ref()
            .and_then(|recaptcha| recaptcha.site_key.clone()),
    })
}
