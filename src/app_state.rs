//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    AppConfig, Error, LogMailer, Mailer,
    auth::{
        GoogleTokenVerifier, HttpGoogleVerifier, HttpRecaptchaVerifier, JwtKeys,
        RecaptchaVerifier,
    },
    db::initialize,
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The settings that control the behaviour of the app.
    pub config: Arc<AppConfig>,

    /// The keys for signing and verifying JSON web tokens.
    pub jwt_keys: JwtKeys,

    /// Delivers password reset emails.
    pub mailer: Arc<dyn Mailer>,

    /// Checks Google ID tokens, `None` if Google log in is disabled.
    pub google_verifier: Option<Arc<dyn GoogleTokenVerifier>>,

    /// Checks reCAPTCHA tokens, `None` if registration does not need reCAPTCHA.
    pub recaptcha_verifier: Option<Arc<dyn RecaptchaVerifier>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// Google log in and reCAPTCHA verification are enabled if `config` has settings for them.
    /// Emails are logged until a mailer is set with [AppState::with_mailer].
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the HTTP
    /// client for the Google APIs cannot be created.
    pub fn new(db_connection: Connection, config: AppConfig) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let google_verifier: Option<Arc<dyn GoogleTokenVerifier>> =
            match &config.google_client_id {
                Some(_) => Some(Arc::new(HttpGoogleVerifier::new()?)),
                None => None,
            };

        let recaptcha_verifier: Option<Arc<dyn RecaptchaVerifier>> = match &config.recaptcha {
            Some(settings) => Some(Arc::new(HttpRecaptchaVerifier::new(settings)?)),
            None => None,
        };

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            jwt_keys: JwtKeys::new(&config.secret_key),
            config: Arc::new(config),
            mailer: Arc::new(LogMailer),
            google_verifier,
            recaptcha_verifier,
        })
    }

    /// Send emails with `mailer`.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Check Google ID tokens with `verifier`.
    pub fn with_google_verifier(mut self, verifier: Arc<dyn GoogleTokenVerifier>) -> Self {
        self.google_verifier = Some(verifier);
        self
    }

    /// Check reCAPTCHA tokens with `verifier`.
    pub fn with_recaptcha_verifier(mut self, verifier: Arc<dyn RecaptchaVerifier>) -> Self {
        self.recaptcha_verifier = Some(verifier);
        self
    }
}
