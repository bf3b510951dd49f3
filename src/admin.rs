//! Series lifecycle for administrators.

use crate::api::RequestAuth;
use crate::error::{ClientError, Result};
use crate::models::{Series, SeriesDraft};
use crate::session::Session;
use std::sync::Arc;
use tracing::{debug, info};

const MAX_RATING: f64 = 10.0;

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trims the draft and rejects what the server would store as garbage.
pub fn normalize_draft(mut draft: SeriesDraft) -> Result<SeriesDraft> {
    draft.title = draft.title.trim().to_string();
    if draft.title.is_empty() {
        return Err(ClientError::ValidationFailed(
            "series title cannot be empty".to_string(),
        ));
    }
    if let Some(rating) = draft.rating {
        if !(0.0..=MAX_RATING).contains(&rating) {
            return Err(ClientError::ValidationFailed(format!(
                "rating must be between 0 and {MAX_RATING}, got {rating}"
            )));
        }
    }
    draft.description = blank_to_none(draft.description);
    draft.age_rating = blank_to_none(draft.age_rating);
    draft.poster_url = blank_to_none(draft.poster_url);
    draft.trailer_url = blank_to_none(draft.trailer_url);
    draft.genres = draft
        .genres
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect();
    Ok(draft)
}

pub struct SeriesEditor {
    session: Arc<Session>,
}

impl SeriesEditor {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Credentials of a signed-in administrator; anyone else gets `Unauthorized`.
    fn admin_auth(&self) -> Result<RequestAuth> {
        let auth = self.session.auth();
        match self.session.identity() {
            Some(identity) if identity.is_admin() && auth.is_authenticated() => Ok(auth),
            Some(identity) => {
                debug!("{} is not an administrator", identity.username);
                Err(ClientError::Unauthorized)
            }
            None => Err(ClientError::Unauthorized),
        }
    }

    pub async fn create(&self, draft: SeriesDraft) -> Result<Series> {
        let auth = self.admin_auth()?;
        let draft = normalize_draft(draft)?;
        let created = self.session.api().create_series(&auth, &draft).await?;
        info!("Created series {} '{}'", created.id, created.title);
        Ok(created)
    }

    /// Replaces every editable field of series `id`.
    pub async fn update(&self, id: i64, draft: SeriesDraft) -> Result<Series> {
        let auth = self.admin_auth()?;
        let draft = normalize_draft(draft)?;
        let updated = self.session.api().update_series(&auth, id, &draft).await?;
        info!("Updated series {} '{}'", updated.id, updated.title);
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let auth = self.admin_auth()?;
        self.session.api().delete_series(&auth, id).await?;
        info!("Deleted series {}", id);
        Ok(())
    }
}
