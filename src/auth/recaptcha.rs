//! Verification of Google reCAPTCHA tokens submitted with registrations.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;

use crate::{AppState, Error, config::RecaptchaSettings};

const SITE_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Checks reCAPTCHA tokens.
#[async_trait]
pub trait RecaptchaVerifier: Send + Sync {
    /// Whether `token` is a valid reCAPTCHA response for a request from `remote_ip`.
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> bool;
}

/// The parts of Google's `siteverify` response that are checked.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SiteVerifyResponse {
    success: bool,
    score: Option<f64>,
}

impl SiteVerifyResponse {
    /// Whether the verification succeeded with a score of at least `min_score`.
    ///
    /// reCAPTCHA v2 responses have no score and only need to succeed.
    pub fn passes(&self, min_score: f64) -> bool {
        self.success && self.score.is_none_or(|score| score >= min_score)
    }
}

/// Verifies tokens with Google's `siteverify` endpoint.
pub struct HttpRecaptchaVerifier {
    client: reqwest::Client,
    secret_key: String,
    min_score: f64,
}

impl HttpRecaptchaVerifier {
    /// Create a verifier with the secret key and minimum score in `settings`.
    ///
    /// # Errors
    ///
    /// Returns an [Error::HttpClientError] if the HTTP client could not be created.
    pub fn new(settings: &RecaptchaSettings) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|error| Error::HttpClientError(error.to_string()))?;

        Ok(Self {
            client,
            secret_key: settings.secret_key.clone(),
            min_score: settings.min_score,
        })
    }
}

#[async_trait]
impl RecaptchaVerifier for HttpRecaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> bool {
        let mut form = vec![("secret", self.secret_key.as_str()), ("response", token)];
        if let Some(remote_ip) = remote_ip {
            form.push(("remoteip", remote_ip));
        }

        let response = match self.client.post(SITE_VERIFY_URL).form(&form).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!("could not reach reCAPTCHA: {error}");
                return false;
            }
        };

        match response.json::<SiteVerifyResponse>().await {
            Ok(verification) => verification.passes(self.min_score),
            Err(error) => {
                tracing::warn!("could not read reCAPTCHA response: {error}");
                false
            }
        }
    }
}

/// The client's IP address from the first `X-Forwarded-For` entry.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
}

/// Check the reCAPTCHA `token` if reCAPTCHA is enabled.
///
/// # Errors
///
/// Returns [Error::RecaptchaRequired] if no token was given, or
/// [Error::RecaptchaFailed] if the token did not verify.
pub async fn check_recaptcha(
    state: &AppState,
    token: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), Error> {
    let Some(verifier) = &state.recaptcha_verifier else {
        return Ok(());
    };

    let token = token
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(Error::RecaptchaRequired)?;

    if verifier.verify(token, client_ip(headers).as_deref()).await {
        Ok(())
    } else {
        Err(Error::RecaptchaFailed)
    }
}
