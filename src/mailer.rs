//! Delivery of the emails the app sends, e.g. password reset links.

use std::sync::Arc;

use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::{Error, SmtpSettings};

/// A plain text email.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    /// The sender, e.g. "Finova <no-reply@example.com>".
    pub from: String,
    /// The recipient's address.
    pub to: String,
    /// The subject line.
    pub subject: String,
    /// The plain text body.
    pub body: String,
}

/// Something that can deliver emails.
///
/// Sending may block, so async code should go through [deliver].
pub trait Mailer: Send + Sync {
    /// Send `email`.
    ///
    /// # Errors
    ///
    /// Returns an [Error::EmailError] if the email could not be built or delivered.
    fn send(&self, email: &OutgoingEmail) -> Result<(), Error>;
}

/// Send `email` with `mailer` on a thread where blocking is acceptable.
pub async fn deliver(mailer: Arc<dyn Mailer>, email: OutgoingEmail) -> Result<(), Error> {
    tokio::task::spawn_blocking(move || mailer.send(&email))
        .await
        .map_err(|error| Error::EmailError(error.to_string()))?
}

/// Sends emails through an SMTP server.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// Create a mailer for the server described by `settings`.
    ///
    /// STARTTLS is used unless `settings.insecure` is set. Credentials are
    /// only sent when both a user name and password are given.
    ///
    /// # Errors
    ///
    /// Returns an [Error::EmailError] if the TLS parameters for the host could not be created.
    pub fn new(settings: &SmtpSettings) -> Result<Self, Error> {
        let mut builder = if settings.insecure {
            SmtpTransport::builder_dangerous(&settings.host)
        } else {
            SmtpTransport::starttls_relay(&settings.host)
                .map_err(|error| Error::EmailError(format!("invalid SMTP host: {error}")))?
        }
        .port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), Error> {
        let message = build_message(email)?;

        self.transport.send(&message).map_err(|error| {
            tracing::error!("could not send email to {}: {error}", email.to);
            Error::EmailError(error.to_string())
        })?;

        Ok(())
    }
}

/// Writes emails to the log instead of sending them.
///
/// Used when no SMTP server is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), Error> {
        // Build the message anyway so bad addresses show up in development.
        build_message(email)?;

        tracing::info!(
            "Email to {} with subject \"{}\":\n{}",
            email.to,
            email.subject,
            email.body
        );

        Ok(())
    }
}

fn build_message(email: &OutgoingEmail) -> Result<Message, Error> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|error| Error::EmailError(format!("invalid sender {}: {error}", email.from)))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|error| Error::EmailError(format!("invalid recipient {}: {error}", email.to)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(&email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|error| Error::EmailError(format!("could not build email: {error}")))
}
