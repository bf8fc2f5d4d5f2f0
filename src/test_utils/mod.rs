#![allow(missing_docs)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use rusqlite::Connection;

use crate::{
    AppConfig, AppState, Email, Error, Mailer, OutgoingEmail, PasswordHash, User, UserID,
    auth::{GoogleProfile, GoogleTokenVerifier, RecaptchaVerifier, TokenType, create_token},
    build_router,
    db::{initialize, lock_connection},
    user::{NewUser, create_user},
};

/// A password strong enough to pass validation.
pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// Keeps bcrypt fast in tests.
const TEST_HASH_COST: u32 = 4;

pub(crate) fn get_test_config() -> AppConfig {
    let mut config = AppConfig::new("averysecretkey");
    config.password_hash_cost = TEST_HASH_COST;
    let suffix = hex::encode(rand::random::<[u8; 8]>());
    config.media_dir = std::env::temp_dir().join(format!("finova-media-{suffix}"));

    config
}

pub(crate) fn get_test_state() -> AppState {
    AppState::new(
        Connection::open_in_memory().expect("Could not open database in memory."),
        get_test_config(),
    )
    .expect("Could not create app state.")
}

pub(crate) fn get_test_server(state: AppState) -> TestServer {
    TestServer::new(build_router(state)).expect("Could not create test server.")
}

pub(crate) fn get_test_db_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    initialize(&connection).expect("Could not initialize database.");

    connection
}

/// Insert a user that cannot log in with a password.
pub(crate) fn insert_test_user(connection: &Connection, email: &str) -> User {
    let email = Email::new_unchecked(email);
    let username = email.local_part().to_owned();

    create_user(
        NewUser::new(&username, email, PasswordHash::unusable()),
        connection,
    )
    .expect("Could not create test user.")
}

/// Insert a user that logs in with [TEST_PASSWORD].
pub(crate) fn create_test_user(state: &AppState, email: &str) -> User {
    let email = Email::new_unchecked(email);
    let username = email.local_part().to_owned();
    let password_hash = PasswordHash::from_raw_password(TEST_PASSWORD, &[], TEST_HASH_COST)
        .expect("Could not hash password.");

    let connection = lock_connection(&state.db_connection).expect("Could not lock database.");

    create_user(NewUser::new(&username, email, password_hash), &connection)
        .expect("Could not create test user.")
}

/// The value of an `Authorization` header with a valid access token for `user_id`.
pub(crate) fn bearer(state: &AppState, user_id: UserID) -> String {
    let token = create_token(
        user_id,
        TokenType::Access,
        state.config.access_token_lifetime,
        &state.jwt_keys,
    )
    .expect("Could not create access token.");

    format!("Bearer {token}")
}

/// A mailer that keeps the emails instead of sending them.
#[derive(Debug, Default)]
pub(crate) struct RecordingMailer {
    emails: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub(crate) fn sent(&self) -> Vec<OutgoingEmail> {
        self.emails.lock().expect("Could not lock mailer.").clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), Error> {
        self.emails
            .lock()
            .expect("Could not lock mailer.")
            .push(email.clone());

        Ok(())
    }
}

/// Accepts or rejects every reCAPTCHA token.
#[derive(Debug)]
pub(crate) struct FakeRecaptchaVerifier {
    accept: bool,
    remote_ip: Mutex<Option<String>>,
}

impl FakeRecaptchaVerifier {
    pub(crate) fn new(accept: bool) -> Self {
        Self {
            accept,
            remote_ip: Mutex::new(None),
        }
    }

    pub(crate) fn last_remote_ip(&self) -> Option<String> {
        self.remote_ip
            .lock()
            .expect("Could not lock verifier.")
            .clone()
    }
}

#[async_trait]
impl RecaptchaVerifier for FakeRecaptchaVerifier {
    async fn verify(&self, _token: &str, remote_ip: Option<&str>) -> bool {
        *self.remote_ip.lock().expect("Could not lock verifier.") = remote_ip.map(str::to_owned);

        self.accept
    }
}

/// Returns the profile for any ID token, or rejects every token if there is no profile.
#[derive(Debug)]
pub(crate) struct FakeGoogleVerifier(Option<GoogleProfile>);

impl FakeGoogleVerifier {
    pub(crate) fn new(profile: Option<GoogleProfile>) -> Self {
        Self(profile)
    }
}

#[async_trait]
impl GoogleTokenVerifier for FakeGoogleVerifier {
    async fn verify(&self, _id_token: &str, _client_id: &str) -> Result<GoogleProfile, Error> {
        self.0.clone().ok_or(Error::InvalidGoogleToken)
    }
}

/// App state with Google log in enabled and backed by [FakeGoogleVerifier].
pub(crate) fn google_state(profile: Option<GoogleProfile>) -> AppState {
    let mut config = get_test_config();
    config.google_client_id = Some("client-id".to_owned());

    AppState::new(
        Connection::open_in_memory().expect("Could not open database in memory."),
        config,
    )
    .expect("Could not create app state.")
    .with_google_verifier(Arc::new(FakeGoogleVerifier::new(profile)))
}

pub(crate) fn test_google_profile(email: &str) -> GoogleProfile {
    GoogleProfile {
        email: email.to_owned(),
        given_name: "Nueva".to_owned(),
        family_name: String::new(),
        picture: "https://example.com/photo.png".to_owned(),
    }
}
