//! Viewing and editing the logged in user's profile, including the profile photo.

use std::path::Path;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
};
use rusqlite::Connection;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error, User, UserID,
    db::lock_connection,
    json::ApiJson,
    user::{ProfileUpdate, UserView, get_user_by_id, set_avatar_path, update_profile},
};

/// The directory under the media directory where profile photos are stored.
pub const AVATAR_DIR: &str = "avatars";

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Handler for getting the logged in user.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<UserView>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let user = get_user_by_id(user_id, &connection)?;

    Ok(Json(UserView::new(&user, &state.config.public_url)))
}

/// The JSON body of a profile update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    /// The new given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// The new family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// The new phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Whether to delete the uploaded profile photo.
    #[serde(default)]
    pub remove_photo: bool,
}

/// A profile photo uploaded by the user.
#[derive(Debug, Clone, PartialEq)]
struct UploadedPhoto {
    extension: String,
    bytes: Bytes,
}

impl UploadedPhoto {
    fn new(file_name: &str, bytes: Bytes) -> Result<Self, Error> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_lowercase)
            .filter(|extension| IMAGE_EXTENSIONS.contains(&extension.as_str()))
            .ok_or_else(|| {
                Error::InvalidUpload("solo se permiten imágenes JPG, PNG, GIF o WEBP.".to_owned())
            })?;

        if bytes.is_empty() {
            return Err(Error::InvalidUpload("el archivo está vacío.".to_owned()));
        }

        Ok(Self { extension, bytes })
    }
}

#[derive(Debug, Default)]
struct ProfileChanges {
    update: ProfileUpdate,
    photo: Option<UploadedPhoto>,
    remove_photo: bool,
}

impl From<ProfileForm> for ProfileChanges {
    fn from(form: ProfileForm) -> Self {
        Self {
            update: ProfileUpdate {
                first_name: form.first_name,
                last_name: form.last_name,
                phone: form.phone,
            },
            photo: None,
            remove_photo: form.remove_photo,
        }
    }
}

/// Handler for editing the logged in user's profile.
///
/// Accepts a JSON body, or a `multipart/form-data` body when uploading a new
/// profile photo in the `photo` field. A replaced or removed photo is deleted
/// from the media directory.
///
/// # Errors
///
/// Returns an [Error::InvalidUpload] if the photo is not an image, an
/// [Error::ProfileFieldTooLong] if a field is too long, or an
/// [Error::InvalidRequest] if the body cannot be parsed.
pub async fn update_profile_endpoint(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserID>,
    request: Request,
) -> Result<Json<UserView>, Error> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("multipart/form-data"));

    let changes = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;

        parse_multipart(multipart).await?
    } else {
        let ApiJson(form) = ApiJson::<ProfileForm>::from_request(request, &state).await?;

        form.into()
    };

    changes.update.validate()?;

    let media_dir = state.config.media_dir.as_path();

    // Removing the photo wins over uploading a new one.
    let new_avatar_path = match &changes.photo {
        Some(photo) if !changes.remove_photo => {
            Some(save_photo(media_dir, user_id, photo).await?)
        }
        _ => None,
    };

    let result = {
        let connection = lock_connection(&state.db_connection)?;
        apply_changes(user_id, &changes, new_avatar_path.as_deref(), &connection)
    };

    match result {
        Ok((user, replaced_avatar_path)) => {
            if let Some(replaced_avatar_path) = replaced_avatar_path {
                remove_photo(media_dir, &replaced_avatar_path).await;
            }

            Ok(Json(UserView::new(&user, &state.config.public_url)))
        }
        Err(error) => {
            if let Some(new_avatar_path) = new_avatar_path {
                remove_photo(media_dir, &new_avatar_path).await;
            }

            Err(error)
        }
    }
}

/// Update the user and return them with the path of the photo that is no longer used.
fn apply_changes(
    user_id: UserID,
    changes: &ProfileChanges,
    new_avatar_path: Option<&str>,
    connection: &Connection,
) -> Result<(User, Option<String>), Error> {
    let transaction = connection.unchecked_transaction()?;
    let old_avatar_path = get_user_by_id(user_id, &transaction)?.avatar_path;

    let replaced_avatar_path = if new_avatar_path.is_some() {
        set_avatar_path(user_id, new_avatar_path, &transaction)?;
        old_avatar_path
    } else if changes.remove_photo {
        set_avatar_path(user_id, None, &transaction)?;
        old_avatar_path
    } else {
        None
    };

    let user = update_profile(user_id, &changes.update, &transaction)?;
    transaction.commit()?;

    Ok((user, replaced_avatar_path))
}

async fn parse_multipart(mut multipart: Multipart) -> Result<ProfileChanges, Error> {
    let mut changes = ProfileChanges::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::InvalidRequest(error.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == "photo" {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let bytes = field
                .bytes()
                .await
                .map_err(|error| Error::InvalidRequest(error.body_text()))?;

            // Browsers send an empty part when no file was selected.
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }

            changes.photo = Some(UploadedPhoto::new(&file_name, bytes)?);
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|error| Error::InvalidRequest(error.body_text()))?;

        match name.as_str() {
            "first_name" => changes.update.first_name = Some(value),
            "last_name" => changes.update.last_name = Some(value),
            "phone" => changes.update.phone = Some(value),
            "remove_photo" => {
                changes.remove_photo = matches!(
                    value.trim().to_lowercase().as_str(),
                    "true" | "1" | "on" | "yes"
                )
            }
            _ => tracing::debug!("Ignoring unknown profile field {name}"),
        }
    }

    Ok(changes)
}

async fn save_photo(
    media_dir: &Path,
    user_id: UserID,
    photo: &UploadedPhoto,
) -> Result<String, Error> {
    let relative_path = format!(
        "{AVATAR_DIR}/{user_id}-{}.{}",
        OffsetDateTime::now_utc().unix_timestamp_nanos(),
        photo.extension
    );

    tokio::fs::create_dir_all(media_dir.join(AVATAR_DIR))
        .await
        .map_err(|error| Error::FileError(error.to_string()))?;
    tokio::fs::write(media_dir.join(&relative_path), &photo.bytes)
        .await
        .map_err(|error| Error::FileError(error.to_string()))?;

    tracing::debug!("Saved {} byte profile photo to {relative_path}", photo.bytes.len());

    Ok(relative_path)
}

async fn remove_photo(media_dir: &Path, relative_path: &str) {
    if let Err(error) = tokio::fs::remove_file(media_dir.join(relative_path)).await {
        tracing::warn!("Could not delete profile photo {relative_path}: {error}");
    }
}
