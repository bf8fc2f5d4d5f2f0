//! Log in with a Google account.
//!
//! The web client signs the user in with Google and sends the resulting ID
//! token here. The token is checked with Google and the account with the
//! same email address is logged in, or created if there is none.

use std::time::Duration;

use async_trait::async_trait;
use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    AppState, Email, Error, PasswordHash,
    auth::log_in::{AuthResponse, log_in_user},
    db::lock_connection,
    json::ApiJson,
    user::{NewUser, create_user, generate_unique_username, get_user_by_email, update_google_profile},
};

const TOKEN_INFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// The verified details of a Google account.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleProfile {
    /// The account's verified email address.
    pub email: String,
    /// The given name, may be empty.
    pub given_name: String,
    /// The family name, may be empty.
    pub family_name: String,
    /// The URL of the profile picture, may be empty.
    pub picture: String,
}

/// Checks Google ID tokens.
#[async_trait]
pub trait GoogleTokenVerifier: Send + Sync {
    /// Verify that `id_token` was issued by Google for the OAuth client `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidGoogleToken] if the token is not valid.
    async fn verify(&self, id_token: &str, client_id: &str) -> Result<GoogleProfile, Error>;
}

/// The response of Google's `tokeninfo` endpoint.
///
/// Boolean claims may be sent as strings, so `email_verified` is kept as raw JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    aud: String,
    #[serde(default)]
    iss: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: Value,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
    #[serde(default)]
    picture: String,
}

impl TokenInfo {
    /// Check the audience, issuer and email claims and extract the profile.
    pub fn into_profile(self, client_id: &str) -> Result<GoogleProfile, Error> {
        if self.aud != client_id {
            tracing::warn!("Google ID token issued for another client: {}", self.aud);
            return Err(Error::InvalidGoogleToken);
        }

        if !GOOGLE_ISSUERS.contains(&self.iss.as_str()) {
            tracing::warn!("Google ID token has an unexpected issuer: {}", self.iss);
            return Err(Error::InvalidGoogleToken);
        }

        let email_verified = match &self.email_verified {
            Value::Bool(verified) => *verified,
            Value::String(verified) => verified == "true",
            _ => false,
        };

        if self.email.is_empty() || !email_verified {
            return Err(Error::InvalidGoogleToken);
        }

        Ok(GoogleProfile {
            email: self.email,
            given_name: self.given_name,
            family_name: self.family_name,
            picture: self.picture,
        })
    }
}

/// Verifies ID tokens with Google's `tokeninfo` endpoint.
pub struct HttpGoogleVerifier {
    client: reqwest::Client,
}

impl HttpGoogleVerifier {
    /// Create a verifier.
    ///
    /// # Errors
    ///
    /// Returns an [Error::HttpClientError] if the HTTP client could not be created.
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|error| Error::HttpClientError(error.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl GoogleTokenVerifier for HttpGoogleVerifier {
    async fn verify(&self, id_token: &str, client_id: &str) -> Result<GoogleProfile, Error> {
        let response = self
            .client
            .get(TOKEN_INFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|error| {
                tracing::warn!("could not reach Google tokeninfo: {error}");
                Error::InvalidGoogleToken
            })?;

        if !response.status().is_success() {
            tracing::debug!("Google rejected ID token with status {}", response.status());
            return Err(Error::InvalidGoogleToken);
        }

        let token_info = response.json::<TokenInfo>().await.map_err(|error| {
            tracing::warn!("could not read Google tokeninfo response: {error}");
            Error::InvalidGoogleToken
        })?;

        token_info.into_profile(client_id)
    }
}

/// The body of a Google log in request.
#[derive(Debug, Deserialize)]
pub struct GoogleLogInData {
    /// The ID token the client received from Google.
    #[serde(default)]
    pub id_token: String,
}

/// Handler for logging in with a Google ID token.
///
/// Users without an account get one with a password that cannot be used to
/// log in until they reset it.
///
/// # Errors
///
/// Returns an [Error::GoogleLoginDisabled] if Google log in is not configured,
/// or an [Error::InvalidGoogleToken] if the ID token is missing or invalid.
pub async fn google_log_in(
    State(state): State<AppState>,
    ApiJson(data): ApiJson<GoogleLogInData>,
) -> Result<Json<AuthResponse>, Error> {
    let (Some(client_id), Some(verifier)) =
        (&state.config.google_client_id, &state.google_verifier)
    else {
        return Err(Error::GoogleLoginDisabled);
    };

    let id_token = data.id_token.trim();
    if id_token.is_empty() {
        return Err(Error::InvalidGoogleToken);
    }

    let profile = verifier.verify(id_token, client_id).await?;
    let email = Email::new(&profile.email).map_err(|_| Error::InvalidGoogleToken)?;

    let connection = lock_connection(&state.db_connection)?;

    let user = match get_user_by_email(&email, &connection) {
        Ok(user) => update_google_profile(
            user.id,
            &profile.picture,
            &profile.given_name,
            &profile.family_name,
            &connection,
        )?,
        Err(Error::NotFound) => {
            let username = generate_unique_username(email.local_part(), &connection)?;
            tracing::info!("Creating account {username} from Google log in");

            create_user(
                NewUser {
                    username,
                    email,
                    password_hash: PasswordHash::unusable(),
                    first_name: profile.given_name,
                    last_name: profile.family_name,
                    phone: String::new(),
                    google_avatar_url: profile.picture,
                },
                &connection,
            )?
        }
        Err(error) => return Err(error),
    };

    log_in_user(&user, &state, &connection).map(Json)
}


#[cfg(test)]
mod google_log_in_tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        UserID, endpoints,
        test_utils::{
            FakeGoogleVerifier, create_test_user, get_test_server, get_test_state, google_state,
            test_google_profile,
        },
        user::{get_user_by_id, update_google_profile},
    };

    #[tokio::test]
    async fn disabled_without_client_id() {
        let server = get_test_server(get_test_state());

        let response = server
            .post(endpoints::GOOGLE_LOG_IN)
            .json(&json!({"id_token": "token"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(
            &json!({"detail": "El inicio de sesión con Google no está disponible."}),
        );
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let server = get_test_server(google_state(None));

        let response = server
            .post(endpoints::GOOGLE_LOG_IN)
            .json(&json!({"id_token": "token"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"detail": "No pudimos validar tu cuenta de Google."}));
    }

    #[tokio::test]
    async fn creates_user_with_unusable_password() {
        let state = google_state(Some(test_google_profile("nueva@example.com")));
        let server = get_test_server(state.clone());

        let response = server
            .post(endpoints::GOOGLE_LOG_IN)
            .json(&json!({"id_token": "token"}))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert!(body["access"].is_string());
        assert!(body["refresh"].is_string());
        assert_eq!(body["user"]["username"], "nueva");
        assert_eq!(body["user"]["first_name"], "Nueva");
        assert_eq!(body["user"]["avatar_url"], "https://example.com/photo.png");

        let user_id = UserID::new(body["user"]["id"].as_i64().unwrap());
        let user = get_user_by_id(user_id, &state.db_connection.lock().unwrap()).unwrap();
        assert!(!user.password_hash.is_usable());
    }

    #[tokio::test]
    async fn logs_in_existing_user() {
        let state = google_state(Some(test_google_profile("ana@example.com")));
        let existing_user = create_test_user(&state, "ana@example.com");
        let server = get_test_server(state.clone());

        let response = server
            .post(endpoints::GOOGLE_LOG_IN)
            .json(&json!({"id_token": "token"}))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["user"]["id"], existing_user.id.as_i64());

        let user = get_user_by_id(existing_user.id, &state.db_connection.lock().unwrap()).unwrap();
        assert!(user.password_hash.is_usable());
        assert_eq!(user.google_avatar_url, "https://example.com/photo.png");
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn log_in_without_picture_keeps_google_avatar() {
        let mut profile = test_google_profile("ana@example.com");
        let state = google_state(Some(profile.clone()));
        let existing_user = create_test_user(&state, "ana@example.com");
        {
            let connection = state.db_connection.lock().unwrap();
            update_google_profile(existing_user.id, &profile.picture, "", "", &connection)
                .unwrap();
        }
        profile.picture = String::new();
        let state = state.with_google_verifier(Arc::new(FakeGoogleVerifier::new(Some(profile))));
        let server = get_test_server(state);

        let response = server
            .post(endpoints::GOOGLE_LOG_IN)
            .json(&json!({"id_token": "token"}))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>()["user"]["avatar_url"],
            "https://example.com/photo.png"
        );
    }
}
