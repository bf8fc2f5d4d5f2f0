//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization;

use crate::{Email, Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// A unique handle derived from the user's email address.
    pub username: String,
    /// The email address the user logs in with.
    pub email: Email,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's given name, may be empty.
    pub first_name: String,
    /// The user's family name, may be empty.
    pub last_name: String,
    /// The user's phone number, may be empty.
    pub phone: String,
    /// Path of the uploaded profile photo, relative to the media directory.
    pub avatar_path: Option<String>,
    /// The profile picture from the user's Google account, may be empty.
    pub google_avatar_url: String,
    /// When the user registered.
    pub date_joined: OffsetDateTime,
    /// When the user last logged in.
    pub last_login: Option<OffsetDateTime>,
}

impl User {
    /// The user's first and last name, or their username if both are empty.
    pub fn full_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name, self.last_name);
        let full_name = full_name.trim();

        if full_name.is_empty() {
            self.username.clone()
        } else {
            full_name.to_owned()
        }
    }

    /// Strings that describe the user and should not be guessable from their password.
    pub fn password_user_inputs(&self) -> Vec<&str> {
        vec![
            self.email.as_ref(),
            self.email.local_part(),
            &self.username,
            &self.first_name,
            &self.last_name,
        ]
    }
}

/// The data needed to create a new user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// A unique username, see [generate_unique_username].
    pub username: String,
    /// The email address the user logs in with.
    pub email: Email,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// The user's phone number.
    pub phone: String,
    /// The profile picture from the user's Google account.
    pub google_avatar_url: String,
}

impl NewUser {
    /// Create the data for a new user with empty profile fields.
    pub fn new(username: &str, email: Email, password_hash: PasswordHash) -> Self {
        Self {
            username: username.to_owned(),
            email,
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            phone: String::new(),
            google_avatar_url: String::new(),
        }
    }
}

/// Changes to the editable parts of a user's profile.
///
/// Fields set to `None` are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileUpdate {
    /// The new given name.
    pub first_name: Option<String>,
    /// The new family name.
    pub last_name: Option<String>,
    /// The new phone number.
    pub phone: Option<String>,
}

/// The maximum number of characters in a given or family name.
pub const MAX_NAME_LENGTH: usize = 150;
/// The maximum number of characters in a phone number.
pub const MAX_PHONE_LENGTH: usize = 30;

impl ProfileUpdate {
    /// Check the length of each field, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an [Error::ProfileFieldTooLong] naming the first field that is too long.
    pub fn validate(&self) -> Result<(), Error> {
        let fields = [
            ("first_name", &self.first_name, MAX_NAME_LENGTH),
            ("last_name", &self.last_name, MAX_NAME_LENGTH),
            ("phone", &self.phone, MAX_PHONE_LENGTH),
        ];

        for (field, value, max_length) in fields {
            let too_long = value
                .as_deref()
                .is_some_and(|value| value.trim().chars().count() > max_length);

            if too_long {
                return Err(Error::ProfileFieldTooLong { field, max_length });
            }
        }

        Ok(())
    }
}

/// The JSON representation of a user sent to API clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    /// The user's ID.
    pub id: i64,
    /// The user's username.
    pub username: String,
    /// The user's email address.
    pub email: String,
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// See [User::full_name].
    pub full_name: String,
    /// The phone number, `None` if empty.
    pub phone: Option<String>,
    /// The uploaded photo, falling back to the Google profile picture.
    pub avatar_url: Option<String>,
    /// When the user registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UserView {
    /// Create the JSON view of `user`.
    ///
    /// Uploaded photos are served from `{public_url}/media/`.
    pub fn new(user: &User, public_url: &str) -> Self {
        let avatar_url = match &user.avatar_path {
            Some(path) => Some(format!("{}/media/{path}", public_url.trim_end_matches('/'))),
            None if !user.google_avatar_url.is_empty() => Some(user.google_avatar_url.clone()),
            None => None,
        };

        let phone = if user.phone.is_empty() {
            None
        } else {
            Some(user.phone.clone())
        };

        Self {
            id: user.id.as_i64(),
            username: user.username.clone(),
            email: user.email.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            phone,
            avatar_url,
            created_at: user.date_joined,
        }
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                avatar_path TEXT,
                google_avatar_url TEXT NOT NULL DEFAULT '',
                date_joined TEXT NOT NULL,
                last_login TEXT
                )",
        (),
    )?;

    Ok(())
}

const SELECT_USER: &str = "SELECT id, username, email, password, first_name, last_name, phone, \
    avatar_path, google_avatar_url, date_joined, last_login FROM user";

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a [Error::DuplicateEmail] if the email is already registered, or
/// [Error::SqlError] if another SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let date_joined = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO user (username, email, password, first_name, last_name, phone, google_avatar_url, date_joined)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            &new_user.username,
            new_user.email.as_ref(),
            new_user.password_hash.as_ref(),
            &new_user.first_name,
            &new_user.last_name,
            &new_user.phone,
            &new_user.google_avatar_url,
            date_joined,
        ),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        username: new_user.username,
        email: new_user.email,
        password_hash: new_user.password_hash,
        first_name: new_user.first_name,
        last_name: new_user.last_name,
        phone: new_user.phone,
        avatar_path: None,
        google_avatar_url: new_user.google_avatar_url,
        date_joined,
        last_login: None,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare(&format!("{SELECT_USER} WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_row)
        .map_err(|error| error.into())
}

/// Get the user with the email address `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the email address.
pub fn get_user_by_email(email: &Email, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare(&format!("{SELECT_USER} WHERE email = :email"))?
        .query_row(&[(":email", email.as_ref())], map_row)
        .map_err(|error| error.into())
}

/// Whether a user with `username` exists.
pub fn username_exists(username: &str, db_connection: &Connection) -> Result<bool, Error> {
    let id: Option<i64> = db_connection
        .query_row(
            "SELECT id FROM user WHERE username = ?1",
            [username],
            |row| row.get(0),
        )
        .optional()?;

    Ok(id.is_some())
}

/// Replace the password hash of the user `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn set_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    db_connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = db_connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Set the last log in time of the user `user_id` to `logged_in_at`.
pub fn record_login(
    user_id: UserID,
    logged_in_at: OffsetDateTime,
    db_connection: &Connection,
) -> Result<(), Error> {
    db_connection.execute(
        "UPDATE user SET last_login = ?1 WHERE id = ?2",
        (logged_in_at, user_id.as_i64()),
    )?;

    Ok(())
}

/// Apply `update` to the profile of the user `user_id` and return the updated user.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn update_profile(
    user_id: UserID,
    update: &ProfileUpdate,
    db_connection: &Connection,
) -> Result<User, Error> {
    db_connection.execute(
        "UPDATE user SET
            first_name = COALESCE(?1, first_name),
            last_name = COALESCE(?2, last_name),
            phone = COALESCE(?3, phone)
         WHERE id = ?4",
        (
            update.first_name.as_deref().map(str::trim),
            update.last_name.as_deref().map(str::trim),
            update.phone.as_deref().map(str::trim),
            user_id.as_i64(),
        ),
    )?;

    get_user_by_id(user_id, db_connection)
}

/// Set or clear the uploaded profile photo of the user `user_id`.
pub fn set_avatar_path(
    user_id: UserID,
    avatar_path: Option<&str>,
    db_connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = db_connection.execute(
        "UPDATE user SET avatar_path = ?1 WHERE id = ?2",
        (avatar_path, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Store the Google profile picture of the user `user_id` and fill in their
/// names if they have not set them yet.
///
/// An empty `google_avatar_url` keeps the stored picture.
pub fn update_google_profile(
    user_id: UserID,
    google_avatar_url: &str,
    first_name: &str,
    last_name: &str,
    db_connection: &Connection,
) -> Result<User, Error> {
    db_connection.execute(
        "UPDATE user SET
            google_avatar_url = CASE WHEN ?1 = '' THEN google_avatar_url ELSE ?1 END,
            first_name = CASE WHEN first_name = '' THEN ?2 ELSE first_name END,
            last_name = CASE WHEN last_name = '' THEN ?3 ELSE last_name END
         WHERE id = ?4",
        (google_avatar_url, first_name, last_name, user_id.as_i64()),
    )?;

    get_user_by_id(user_id, db_connection)
}

/// Turn `value` into a string that only contains lowercase ASCII letters,
/// digits and underscores.
///
/// Accents are removed ("José" becomes "jose") and other characters are
/// replaced with underscores. If nothing is left, a random string is returned.
pub fn slugify_username(value: &str) -> String {
    let ascii: String = value
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| c.to_ascii_lowercase())
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let slug = ascii.trim_matches('_');

    if slug.is_empty() {
        let random_bytes: [u8; 4] = rand::random();
        hex::encode(random_bytes)
    } else {
        slug.to_owned()
    }
}

/// Create a username from `seed` that is not used by any other user.
///
/// Numbers are appended to the slug of `seed` until an unused username is found,
/// e.g. "maria", "maria1", "maria2".
pub fn generate_unique_username(seed: &str, connection: &Connection) -> Result<String, Error> {
    let base_username = slugify_username(seed);
    let mut username = base_username.clone();
    let mut counter = 1;

    while username_exists(&username, connection)? {
        username = format!("{base_username}{counter}");
        counter += 1;
    }

    Ok(username)
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_id = row.get(0)?;
    let raw_email: String = row.get(2)?;
    let raw_password_hash: String = row.get(3)?;

    Ok(User {
        id: UserID::new(raw_id),
        username: row.get(1)?,
        email: Email::new_unchecked(&raw_email),
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        phone: row.get(6)?,
        avatar_path: row.get(7)?,
        google_avatar_url: row.get(8)?,
        date_joined: row.get(9)?,
        last_login: row.get(10)?,
    })
}


#[cfg(test)]
mod username_tests {
    use rusqlite::Connection;

    use crate::{
        Email, PasswordHash,
        user::{
            NewUser, create_user, create_user_table, generate_unique_username, slugify_username,
        },
    };

    #[test]
    fn slugify_removes_accents_and_symbols() {
        assert_eq!(slugify_username("José.Pérez"), "jose_perez");
        assert_eq!(slugify_username("__Ñandú 2024__"), "nandu_2024");
    }

    #[test]
    fn slugify_falls_back_to_random_string() {
        let slug = slugify_username("!!!");

        assert_eq!(slug.len(), 8);
        assert!(slug.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn unique_username_appends_counter() {
        let connection = Connection::open_in_memory().unwrap();
        create_user_table(&connection).unwrap();

        for (i, want) in ["maria", "maria1", "maria2"].into_iter().enumerate() {
            let username = generate_unique_username("maria", &connection).unwrap();
            assert_eq!(username, want);

            create_user(
                NewUser::new(
                    &username,
                    Email::new(&format!("maria{i}@example.com")).unwrap(),
                    PasswordHash::new_unchecked("hunter2"),
                ),
                &connection,
            )
            .unwrap();
        }
    }
}
