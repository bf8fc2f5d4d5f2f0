//! A JSON extractor that rejects bad request bodies with the app's error format.

use axum::{
    extract::{FromRequest, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// Like [axum::Json], but a body that cannot be parsed is rejected with an
/// [Error::InvalidRequest] so the client gets a `{"detail": ...}` body.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Deserialize a field that may be missing, `null` or set.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on a field
/// of type `Option<Option<T>>`: a missing field is `None`, `null` is
/// `Some(None)` and a value is `Some(Some(value))`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
