//! Server settings, read from command line arguments and environment variables.

use std::{net::IpAddr, path::PathBuf};

use clap::Parser;
use time::Duration;

use crate::PasswordHash;

/// The default lifetime of access tokens.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::minutes(5);
/// The default lifetime of refresh tokens.
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::days(1);
/// How long a password reset link stays valid by default.
pub const DEFAULT_PASSWORD_RESET_TIMEOUT: Duration = Duration::days(3);
/// The default minimum reCAPTCHA score for a registration to be accepted.
pub const DEFAULT_RECAPTCHA_MIN_SCORE: f64 = 0.5;

/// The settings for Google reCAPTCHA verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecaptchaSettings {
    /// The public key used by the client side widget.
    pub site_key: Option<String>,
    /// The secret key used to verify tokens with Google.
    pub secret_key: String,
    /// Tokens with a score lower than this are rejected.
    pub min_score: f64,
}

/// The settings that control the behaviour of the app.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// The secret used to sign JSON web tokens and password reset tokens.
    pub secret_key: String,
    /// How long access tokens are valid.
    pub access_token_lifetime: Duration,
    /// How long refresh tokens are valid.
    pub refresh_token_lifetime: Duration,
    /// How long password reset links are valid.
    pub password_reset_timeout: Duration,
    /// The bcrypt cost for hashing passwords.
    pub password_hash_cost: u32,
    /// The base URL of the web client, used to build password reset links.
    pub frontend_url: String,
    /// The base URL this server is reachable at, used to build absolute URLs
    /// for uploaded files. May be empty, which produces relative URLs.
    pub public_url: String,
    /// The directory where uploaded files (profile photos) are stored.
    pub media_dir: PathBuf,
    /// The local timezone as a canonical timezone name, e.g. "America/Santiago".
    pub local_timezone: String,
    /// The OAuth client ID for Google log in. Google log in is disabled if `None`.
    pub google_client_id: Option<String>,
    /// reCAPTCHA settings. Registration does not require reCAPTCHA if `None`.
    pub recaptcha: Option<RecaptchaSettings>,
    /// The sender of emails sent by the app.
    pub default_from_email: String,
}

impl AppConfig {
    /// Create a config with `secret_key` and default values for everything else.
    pub fn new(secret_key: &str) -> Self {
        Self {
            secret_key: secret_key.to_owned(),
            access_token_lifetime: DEFAULT_ACCESS_TOKEN_LIFETIME,
            refresh_token_lifetime: DEFAULT_REFRESH_TOKEN_LIFETIME,
            password_reset_timeout: DEFAULT_PASSWORD_RESET_TIMEOUT,
            password_hash_cost: PasswordHash::DEFAULT_COST,
            frontend_url: "http://localhost:3000".to_owned(),
            public_url: String::new(),
            media_dir: PathBuf::from("media"),
            local_timezone: "Etc/UTC".to_owned(),
            google_client_id: None,
            recaptcha: None,
            default_from_email: "Finova <no-reply@finova.local>".to_owned(),
        }
    }
}

/// The settings for delivering email over SMTP.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    /// The SMTP server's host name.
    pub host: String,
    /// The SMTP server's port.
    pub port: u16,
    /// The user name for SMTP authentication, if any.
    pub username: Option<String>,
    /// The password for SMTP authentication, if any.
    pub password: Option<String>,
    /// Connect without TLS, e.g. for a local mail catcher.
    pub insecure: bool,
}

/// The REST API server for Finova.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ServerConfig {
    /// File path to the application SQLite database.
    #[arg(long, env = "DATABASE_PATH")]
    pub db_path: String,

    /// The address to listen on.
    #[arg(long, env = "ADDRESS", default_value = "127.0.0.1")]
    pub address: IpAddr,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// The secret used to sign tokens.
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// How many minutes access tokens are valid for.
    #[arg(long, env = "JWT_ACCESS_MINUTES", default_value_t = 5)]
    pub jwt_access_minutes: i64,

    /// How many days refresh tokens are valid for.
    #[arg(long, env = "JWT_REFRESH_DAYS", default_value_t = 1)]
    pub jwt_refresh_days: i64,

    /// How many seconds password reset links are valid for.
    #[arg(long, env = "PASSWORD_RESET_TIMEOUT", default_value_t = 259_200)]
    pub password_reset_timeout: i64,

    /// The base URL of the web client.
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: String,

    /// The base URL this server is reachable at.
    #[arg(long, env = "PUBLIC_URL", default_value = "")]
    pub public_url: String,

    /// The directory for uploaded files.
    #[arg(long, env = "MEDIA_DIR", default_value = "media")]
    pub media_dir: PathBuf,

    /// The local timezone as a canonical timezone name.
    #[arg(long, env = "TIME_ZONE", default_value = "Etc/UTC")]
    pub timezone: String,

    /// The OAuth client ID for Google log in.
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// The public reCAPTCHA key for the client side widget.
    #[arg(long, env = "GOOGLE_RECAPTCHA_SITE_KEY")]
    pub recaptcha_site_key: Option<String>,

    /// The secret reCAPTCHA key. Enables reCAPTCHA checks on registration.
    #[arg(long, env = "GOOGLE_RECAPTCHA_SECRET_KEY", hide_env_values = true)]
    pub recaptcha_secret_key: Option<String>,

    /// The minimum reCAPTCHA score for a registration to be accepted.
    #[arg(long, env = "GOOGLE_RECAPTCHA_MIN_SCORE", default_value_t = DEFAULT_RECAPTCHA_MIN_SCORE)]
    pub recaptcha_min_score: f64,

    /// The SMTP server for outgoing email. Emails are only logged if not set.
    #[arg(long, env = "EMAIL_HOST")]
    pub smtp_host: Option<String>,

    /// The SMTP server port.
    #[arg(long, env = "EMAIL_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    /// The SMTP user name.
    #[arg(long, env = "EMAIL_HOST_USER")]
    pub smtp_username: Option<String>,

    /// The SMTP password.
    #[arg(long, env = "EMAIL_HOST_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Connect to the SMTP server without TLS.
    #[arg(long, env = "EMAIL_INSECURE")]
    pub smtp_insecure: bool,

    /// The sender of emails sent by the app.
    #[arg(
        long,
        env = "DEFAULT_FROM_EMAIL",
        default_value = "Finova <no-reply@finova.local>"
    )]
    pub default_from_email: String,
}

impl ServerConfig {
    /// The app settings described by the arguments.
    pub fn app_config(&self) -> AppConfig {
        let recaptcha = self
            .recaptcha_secret_key
            .as_ref()
            .filter(|secret| !secret.is_empty())
            .map(|secret_key| RecaptchaSettings {
                site_key: self.recaptcha_site_key.clone(),
                secret_key: secret_key.clone(),
                min_score: self.recaptcha_min_score,
            });

        AppConfig {
            secret_key: self.secret_key.clone(),
            access_token_lifetime: Duration::minutes(self.jwt_access_minutes),
            refresh_token_lifetime: Duration::days(self.jwt_refresh_days),
            password_reset_timeout: Duration::seconds(self.password_reset_timeout),
            password_hash_cost: PasswordHash::DEFAULT_COST,
            frontend_url: self.frontend_url.clone(),
            public_url: self.public_url.clone(),
            media_dir: self.media_dir.clone(),
            local_timezone: self.timezone.clone(),
            google_client_id: self
                .google_client_id
                .clone()
                .filter(|client_id| !client_id.is_empty()),
            recaptcha,
            default_from_email: self.default_from_email.clone(),
        }
    }

    /// The SMTP settings, or `None` if no SMTP host was given.
    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        self.smtp_host
            .as_ref()
            .filter(|host| !host.is_empty())
            .map(|host| SmtpSettings {
                host: host.clone(),
                port: self.smtp_port,
                username: self.smtp_username.clone(),
                password: self.smtp_password.clone(),
                insecure: self.smtp_insecure,
            })
    }
}

#[cfg(test)]
mod server_config_tests {
    use clap::Parser;
    use time::Duration;

    use super::{RecaptchaSettings, ServerConfig};

    fn parse(extra_args: &[&str]) -> ServerConfig {
        let mut args = vec![
            "server",
            "--db-path",
            "test.db",
            "--secret-key",
            "averysecretkey",
        ];
        args.extend_from_slice(extra_args);

        ServerConfig::try_parse_from(args).expect("Could not parse arguments")
    }

    #[test]
    fn defaults_match_token_lifetimes() {
        let config = parse(&[]).app_config();

        assert_eq!(config.access_token_lifetime, Duration::minutes(5));
        assert_eq!(config.refresh_token_lifetime, Duration::days(1));
        assert_eq!(config.password_reset_timeout, Duration::days(3));
        assert_eq!(config.google_client_id, None);
        assert_eq!(config.recaptcha, None);
    }

    #[test]
    fn recaptcha_enabled_by_secret_key() {
        let config = parse(&[
            "--recaptcha-site-key",
            "site",
            "--recaptcha-secret-key",
            "secret",
            "--recaptcha-min-score",
            "0.7",
        ])
        .app_config();

        assert_eq!(
            config.recaptcha,
            Some(RecaptchaSettings {
                site_key: Some("site".to_owned()),
                secret_key: "secret".to_owned(),
                min_score: 0.7,
            })
        );
    }

    #[test]
    fn smtp_settings_require_host() {
        assert_eq!(parse(&[]).smtp_settings(), None);

        let settings = parse(&["--smtp-host", "smtp.example.com", "--smtp-port", "2525"])
            .smtp_settings()
            .expect("Want SMTP settings when a host is given");

        assert_eq!(settings.host, "smtp.example.com");
        assert_eq!(settings.port, 2525);
        assert!(!settings.insecure);
    }

    #[test]
    fn missing_secret_key_is_an_error() {
        let result = ServerConfig::try_parse_from(["server", "--db-path", "test.db"]);

        assert!(result.is_err());
    }
}
