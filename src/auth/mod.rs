//! User accounts: log in with JSON web tokens, registration, Google log in,
//! password management and the user's profile.

mod change_password;
mod client_config;
mod google;
mod log_in;
mod middleware;
mod password_reset;
mod profile;
mod recaptcha;
mod register;
mod token;

pub use change_password::change_password;
pub use client_config::get_client_config;
pub use google::{GoogleProfile, GoogleTokenVerifier, HttpGoogleVerifier, google_log_in};
pub use log_in::{log_in, refresh_access_token};
pub use middleware::auth_guard;
pub use password_reset::{confirm_password_reset, request_password_reset};
pub use profile::{AVATAR_DIR, get_profile, update_profile_endpoint};
pub use recaptcha::{HttpRecaptchaVerifier, RecaptchaVerifier};
pub use register::register_user;
pub use token::{JwtKeys, TokenType, create_token};
