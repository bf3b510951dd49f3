//! Profile editing: full-record updates, birth-date formats and avatar uploads.

use crate::error::{ClientError, Result};
use crate::models::{AvatarUpload, Identity, UserUpdate};
use crate::session::Session;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

const DISPLAY_FORMAT: &str = "%d.%m.%Y";
const SERVER_FORMAT: &str = "%Y-%m-%d";

/// `yyyy-mm-dd` -> `dd.mm.yyyy`
pub fn display_birth_date(server: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(server.trim(), SERVER_FORMAT).map_err(|_| {
        ClientError::ValidationFailed(format!("'{server}' is not a yyyy-mm-dd date"))
    })?;
    Ok(date.format(DISPLAY_FORMAT).to_string())
}

/// `dd.mm.yyyy` -> `yyyy-mm-dd`
pub fn server_birth_date(display: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(display.trim(), DISPLAY_FORMAT).map_err(|_| {
        ClientError::ValidationFailed(format!("'{display}' is not a dd.mm.yyyy date"))
    })?;
    Ok(date.format(SERVER_FORMAT).to_string())
}

/// Rejects non-image content and files over [`MAX_AVATAR_BYTES`].
pub fn validate_avatar(upload: &AvatarUpload) -> Result<()> {
    let content_type = upload.content_type.trim().to_ascii_lowercase();
    if !content_type.starts_with("image/") {
        return Err(ClientError::ValidationFailed(format!(
            "avatar must be an image, got '{}'",
            upload.content_type
        )));
    }
    if upload.bytes.is_empty() {
        return Err(ClientError::ValidationFailed("avatar file is empty".to_string()));
    }
    if upload.bytes.len() > MAX_AVATAR_BYTES {
        return Err(ClientError::ValidationFailed(format!(
            "avatar is {} bytes, the limit is 5 MiB",
            upload.bytes.len()
        )));
    }
    Ok(())
}

/// Edited fields; anything left `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Display form (`dd.mm.yyyy`); an empty string clears the date.
    pub birth_date: Option<String>,
    pub avatar: Option<String>,
}

pub struct ProfileEditor {
    session: Arc<Session>,
}

impl ProfileEditor {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Current birth date in display form, if the identity has one.
    pub fn birth_date_display(&self) -> Option<String> {
        let identity = self.session.identity()?;
        let raw = identity.birth_date?;
        match display_birth_date(&raw) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("Stored birth date is unusable: {}", e);
                None
            }
        }
    }

    /// Re-reads the identity from the server.
    pub async fn load(&self) -> Result<Identity> {
        let auth = self.session.auth();
        if !auth.is_authenticated() {
            return Err(ClientError::Unauthorized);
        }
        let identity = self.session.api().current_user(&auth).await?;
        self.session.update_identity(identity.clone());
        Ok(identity)
    }

    /// Sends a full replacement of the identity with `fields` merged over it.
    pub async fn update_profile(&self, fields: ProfileFields) -> Result<Identity> {
        let (auth, current) = match (self.session.auth(), self.session.identity()) {
            (auth, Some(identity)) if auth.token.is_some() => (auth, identity),
            _ => return Err(ClientError::Unauthorized),
        };

        let update = merge(&current, fields)?;
        let updated = self
            .session
            .api()
            .update_user(&auth, current.id, &update)
            .await?;
        info!("Updated profile of {}", updated.username);
        self.session.update_identity(updated.clone());
        Ok(updated)
    }

    /// Validates locally, uploads, then stores the returned URL as the avatar.
    pub async fn upload_avatar(&self, upload: AvatarUpload) -> Result<Identity> {
        validate_avatar(&upload)?;
        let auth = self.session.auth();
        if !auth.is_authenticated() {
            return Err(ClientError::Unauthorized);
        }

        let avatar_url = self.session.api().upload_avatar(&auth, &upload).await?;
        info!("Uploaded avatar {} -> {}", upload.file_name, avatar_url);
        self.update_profile(ProfileFields {
            avatar: Some(avatar_url),
            ..ProfileFields::default()
        })
        .await
    }
}

fn merge(current: &Identity, fields: ProfileFields) -> Result<UserUpdate> {
    let username = fields
        .username
        .map(|u| u.trim().to_string())
        .unwrap_or_else(|| current.username.clone());
    if username.is_empty() {
        return Err(ClientError::ValidationFailed(
            "username cannot be empty".to_string(),
        ));
    }
    let email = fields
        .email
        .map(|e| e.trim().to_string())
        .unwrap_or_else(|| current.email.clone());
    let birth_date = match fields.birth_date {
        Some(d) if d.trim().is_empty() => None,
        Some(d) => Some(server_birth_date(&d)?),
        None => current.birth_date.clone(),
    };
    Ok(UserUpdate {
        username,
        email,
        birth_date,
        avatar: fields.avatar.or_else(|| current.avatar.clone()),
    })
}
