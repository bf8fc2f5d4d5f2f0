//! Creating and checking the JSON web tokens used for authentication.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{AppConfig, Error, UserID};

/// The keys for signing and verifying tokens, derived from the app's secret key.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Create HS256 keys from `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short lived token sent with each request to a protected route.
    Access,
    /// Longer lived token that can only be exchanged for a new access token.
    Refresh,
}

/// The contents of a JSON web token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub user_id: i64,
    /// What the token may be used for.
    pub token_type: TokenType,
    /// The time the token was issued as a unix timestamp.
    pub iat: i64,
    /// The expiry time of the token as a unix timestamp.
    pub exp: i64,
}

/// An access and refresh token issued together at log in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenPair {
    /// See [TokenType::Access].
    pub access: String,
    /// See [TokenType::Refresh].
    pub refresh: String,
}

/// Create a signed token of `token_type` for `user_id` that expires after `lifetime`.
///
/// # Errors
///
/// Returns an [Error::TokenCreation] if the token could not be signed.
pub fn create_token(
    user_id: UserID,
    token_type: TokenType,
    lifetime: Duration,
    keys: &JwtKeys,
) -> Result<String, Error> {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        user_id: user_id.as_i64(),
        token_type,
        iat: now.unix_timestamp(),
        exp: (now + lifetime).unix_timestamp(),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
        .map_err(|error| Error::TokenCreation(error.to_string()))
}

/// Create an access and a refresh token for `user_id` with the lifetimes in `config`.
pub fn create_token_pair(
    user_id: UserID,
    config: &AppConfig,
    keys: &JwtKeys,
) -> Result<TokenPair, Error> {
    Ok(TokenPair {
        access: create_token(
            user_id,
            TokenType::Access,
            config.access_token_lifetime,
            keys,
        )?,
        refresh: create_token(
            user_id,
            TokenType::Refresh,
            config.refresh_token_lifetime,
            keys,
        )?,
    })
}

/// Check the signature and expiry of `token` and that it is a `expected_type` token.
///
/// # Errors
///
/// Returns an [Error::InvalidToken] if any of the checks fail.
pub fn decode_token(
    token: &str,
    expected_type: TokenType,
    keys: &JwtKeys,
) -> Result<UserID, Error> {
    let validation = Validation::new(Algorithm::HS256);

    let claims = decode::<Claims>(token, &keys.decoding, &validation)
        .map_err(|error| {
            tracing::debug!("rejected token: {error}");
            Error::InvalidToken
        })?
        .claims;

    if claims.token_type != expected_type {
        tracing::debug!(
            "rejected {:?} token where a {:?} token was expected",
            claims.token_type,
            expected_type
        );
        return Err(Error::InvalidToken);
    }

    Ok(UserID::new(claims.user_id))
}
