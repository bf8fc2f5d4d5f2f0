//! Parsing of path and query string parameters.
//!
//! Query parameters are extracted as plain strings and parsed here, so that
//! empty values are ignored and malformed ones are reported with the app's
//! error format.

use axum::extract::{
    FromRequestParts,
    rejection::{PathRejection, QueryRejection},
};
use serde::Deserialize;
use time::{Date, macros::format_description};

use crate::{Error, month::MonthRange};

/// Like [axum::extract::Query], but a query string that cannot be parsed is
/// rejected with an [Error::InvalidRequest].
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Error))]
pub struct ApiQuery<T>(pub T);

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

/// Like [axum::extract::Path], but a path parameter that cannot be parsed,
/// e.g. a non-numeric ID, is rejected with an [Error::NotFound].
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct ApiPath<T>(pub T);

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("rejected path parameters: {}", rejection.body_text());
        Error::NotFound
    }
}

/// Parse a date in the format `YYYY-MM-DD`.
///
/// # Errors
///
/// Returns an [Error::InvalidRequest] naming `parameter` if `value` is not a valid date.
pub fn parse_date(parameter: &str, value: &str) -> Result<Date, Error> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        Error::InvalidRequest(format!(
            "\"{parameter}\" debe ser una fecha con el formato AAAA-MM-DD."
        ))
    })
}

/// Parse an optional date parameter, treating an empty string as missing.
pub fn parse_optional_date(parameter: &str, value: Option<&str>) -> Result<Option<Date>, Error> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(parameter, value).map(Some),
    }
}

/// Parse an optional ID parameter, treating an empty string as missing.
pub fn parse_optional_id(parameter: &str, value: Option<&str>) -> Result<Option<i64>, Error> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            Error::InvalidRequest(format!("\"{parameter}\" debe ser un número entero."))
        }),
    }
}

/// The raw `desde`/`hasta` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    /// Only include records on or after this date.
    pub desde: Option<String>,
    /// Only include records on or before this date.
    pub hasta: Option<String>,
}

/// An inclusive date range where either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// The earliest date to include.
    pub from: Option<Date>,
    /// The latest date to include.
    pub to: Option<Date>,
}

impl From<MonthRange> for DateRange {
    fn from(month: MonthRange) -> Self {
        Self {
            from: Some(month.start),
            to: Some(month.last_day()),
        }
    }
}

impl TryFrom<&DateRangeQuery> for DateRange {
    type Error = Error;

    fn try_from(query: &DateRangeQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            from: parse_optional_date("desde", query.desde.as_deref())?,
            to: parse_optional_date("hasta", query.hasta.as_deref())?,
        })
    }
}
