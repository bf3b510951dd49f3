#![allow(dead_code)]

use siamlacorns::api::{LacornApi, RequestAuth};
use siamlacorns::error::{ClientError, Result};
use siamlacorns::models::{
    Actor, AuthToken, AvatarUpload, Award, Bucket, CollectionDto, Episode, Identity, Page,
    RegisterRequest, Role, Series, SeriesDraft, SeriesStatus, UserUpdate, VoiceTrack,
    WatchProgress,
};
use siamlacorns::session::{MemoryTokenStore, Session};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const ANA_TOKEN: &str = "tok-ana";
pub const ANA_PASSWORD: &str = "secret";

pub fn ana() -> Identity {
    Identity {
        id: 7,
        username: "ana".to_string(),
        email: "ana@example.com".to_string(),
        birth_date: Some("2006-09-12".to_string()),
        avatar: None,
        role: Role::User,
    }
}

pub fn series(id: i64, title: &str) -> Series {
    Series {
        id,
        title: title.to_string(),
        description: None,
        release_year: Some(2020),
        total_episodes: None,
        episode_duration: None,
        age_rating: None,
        rating: None,
        genres: vec!["Drama".to_string()],
        poster_url: None,
        trailer_url: None,
        status: SeriesStatus::Ongoing,
        voice_tracks: vec!["Subbed".to_string()],
        production_countries: Vec::new(),
    }
}

pub fn episode(id: i64, season: i32, number: i32) -> Episode {
    Episode {
        id,
        title: format!("Episode {number}"),
        season_number: Some(season),
        episode_number: Some(number),
        description: None,
        duration: Some(45),
        video_url: Some(format!("/videos/fallback_{id}.mp4")),
        thumbnail_url: None,
        watched: false,
        current_time: None,
        voice_tracks: vec!["subbed".to_string(), "dubbed".to_string()],
    }
}

pub fn actor(id: i64, name: &str) -> Actor {
    Actor {
        id,
        name: name.to_string(),
        photo_url: None,
        nationality: Some("Thai".to_string()),
        birth_date: None,
        biography: None,
        character: None,
        awards: Vec::new(),
        social_links: BTreeMap::new(),
    }
}

pub fn award(year: i32, title: &str) -> Award {
    Award {
        year: Some(year),
        title: title.to_string(),
        category: None,
    }
}

pub fn video_url(episode_id: i64, track: VoiceTrack) -> String {
    format!("/videos/episode_{episode_id}_{track}.mp4")
}

/// In-memory backend that records every call it receives.
#[derive(Default)]
pub struct FakeApi {
    pub identity: Mutex<Option<Identity>>,
    pub series: Mutex<HashMap<i64, Series>>,
    pub episodes: Mutex<HashMap<i64, Vec<Episode>>>,
    pub actors: Mutex<HashMap<i64, Vec<Actor>>>,
    /// Actors by id, for profile, popularity and search lookups.
    pub people: Mutex<BTreeMap<i64, Actor>>,
    pub awards: Mutex<HashMap<i64, Vec<Award>>>,
    pub fail_awards: Mutex<bool>,
    pub collections: Mutex<BTreeMap<Bucket, Vec<i64>>>,
    pub progress: Mutex<Vec<WatchProgress>>,
    pub user_updates: Mutex<Vec<UserUpdate>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_videos: Mutex<bool>,
    pub fail_actors: Mutex<bool>,
    pub fail_mutations: Mutex<bool>,
    pub fail_series: Mutex<Vec<i64>>,
    /// When set, video lookups wait for a notification before answering.
    pub video_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        let api = Self::default();
        *api.identity.lock().unwrap() = Some(ana());
        api
    }

    pub fn with_series(self, series: Series, episodes: Vec<Episode>) -> Self {
        self.episodes.lock().unwrap().insert(series.id, episodes);
        self.series.lock().unwrap().insert(series.id, series);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn progress(&self) -> Vec<WatchProgress> {
        self.progress.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn check_token(&self, auth: &RequestAuth) -> Result<Identity> {
        match (&auth.token, self.identity.lock().unwrap().clone()) {
            (Some(token), Some(identity)) if token == ANA_TOKEN => Ok(identity),
            _ => Err(ClientError::Unauthorized),
        }
    }

    fn check_admin(&self, auth: &RequestAuth) -> Result<()> {
        if self.check_token(auth)?.is_admin() {
            Ok(())
        } else {
            Err(ClientError::Unauthorized)
        }
    }

    /// Promotes the signed-in user to administrator.
    pub fn as_admin(self) -> Self {
        if let Some(identity) = self.identity.lock().unwrap().as_mut() {
            identity.role = Role::Admin;
        }
        self
    }

    fn mutation_result(&self) -> Result<()> {
        if *self.fail_mutations.lock().unwrap() {
            Err(ClientError::fetch(Some(500), "backend down"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl LacornApi for FakeApi {
    async fn login(&self, username: &str, password: &str) -> Result<AuthToken> {
        self.record(format!("login {username}"));
        if username == "ana" && password == ANA_PASSWORD {
            Ok(AuthToken {
                token: ANA_TOKEN.to_string(),
            })
        } else {
            Err(ClientError::InvalidCredentials)
        }
    }

    async fn register(&self, request: &RegisterRequest) -> Result<Identity> {
        self.record(format!("register {} {}", request.username, request.birth_date));
        Ok(Identity {
            username: request.username.clone(),
            email: request.email.clone(),
            ..ana()
        })
    }

    async fn current_user(&self, auth: &RequestAuth) -> Result<Identity> {
        self.record("current_user");
        self.check_token(auth)
    }

    async fn list_series(&self, _auth: &RequestAuth, page: u32, size: u32) -> Result<Page<Series>> {
        self.record(format!("list_series {page} {size}"));
        let mut all: Vec<Series> = self.series.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|s| s.id);
        Ok(Page::single(all))
    }

    async fn search_series(
        &self,
        _auth: &RequestAuth,
        query: &str,
        _page: u32,
        _size: u32,
    ) -> Result<Page<Series>> {
        self.record(format!("search_series {query}"));
        let needle = query.to_lowercase();
        let mut hits: Vec<Series> = self
            .series
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by_key(|s| s.id);
        Ok(Page::single(hits))
    }

    async fn popular_series(&self, _auth: &RequestAuth, size: u32) -> Result<Vec<Series>> {
        self.record(format!("popular_series {size}"));
        Ok(Vec::new())
    }

    async fn series_by_genre(
        &self,
        _auth: &RequestAuth,
        genre: &str,
        _page: u32,
        _size: u32,
    ) -> Result<Page<Series>> {
        self.record(format!("series_by_genre {genre}"));
        Ok(Page::single(Vec::new()))
    }

    async fn series(&self, _auth: &RequestAuth, id: i64) -> Result<Series> {
        self.record(format!("series {id}"));
        if self.fail_series.lock().unwrap().contains(&id) {
            return Err(ClientError::fetch(Some(500), "boom"));
        }
        self.series
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("series {id}")))
    }

    async fn episodes(&self, _auth: &RequestAuth, series_id: i64) -> Result<Vec<Episode>> {
        self.record(format!("episodes {series_id}"));
        Ok(self
            .episodes
            .lock()
            .unwrap()
            .get(&series_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn actors(&self, _auth: &RequestAuth, series_id: i64) -> Result<Vec<Actor>> {
        self.record(format!("actors {series_id}"));
        if *self.fail_actors.lock().unwrap() {
            return Err(ClientError::fetch(Some(503), "actors unavailable"));
        }
        Ok(self
            .actors
            .lock()
            .unwrap()
            .get(&series_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn actor(&self, _auth: &RequestAuth, id: i64) -> Result<Actor> {
        self.record(format!("actor {id}"));
        self.people
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("actor {id}")))
    }

    async fn actor_awards(&self, _auth: &RequestAuth, actor_id: i64) -> Result<Vec<Award>> {
        self.record(format!("actor_awards {actor_id}"));
        if *self.fail_awards.lock().unwrap() {
            return Err(ClientError::fetch(Some(500), "awards unavailable"));
        }
        Ok(self
            .awards
            .lock()
            .unwrap()
            .get(&actor_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn popular_actors(&self, _auth: &RequestAuth, page: u32, size: u32) -> Result<Vec<Actor>> {
        self.record(format!("popular_actors {page} {size}"));
        Ok(self
            .people
            .lock()
            .unwrap()
            .values()
            .take(size as usize)
            .cloned()
            .collect())
    }

    async fn search_actors(&self, _auth: &RequestAuth, query: &str) -> Result<Vec<Actor>> {
        self.record(format!("search_actors {query}"));
        let needle = query.to_lowercase();
        Ok(self
            .people
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn episode_video_url(
        &self,
        _auth: &RequestAuth,
        episode_id: i64,
        track: VoiceTrack,
    ) -> Result<String> {
        self.record(format!("video {episode_id} {track}"));
        let gate = self.video_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if *self.fail_videos.lock().unwrap() {
            return Err(ClientError::fetch(Some(500), "no video"));
        }
        Ok(video_url(episode_id, track))
    }

    async fn update_watch_progress(
        &self,
        auth: &RequestAuth,
        progress: &WatchProgress,
    ) -> Result<()> {
        self.record(format!("progress {}", progress.episode_id));
        self.check_token(auth)?;
        self.progress.lock().unwrap().push(progress.clone());
        Ok(())
    }

    async fn collections(&self, auth: &RequestAuth, user_id: i64) -> Result<Vec<CollectionDto>> {
        self.record(format!("collections {user_id}"));
        self.check_token(auth)?;
        Ok(self
            .collections
            .lock()
            .unwrap()
            .iter()
            .map(|(bucket, ids)| CollectionDto {
                id: None,
                name: bucket.wire_name().to_string(),
                series_ids: ids.clone(),
            })
            .collect())
    }

    async fn collection(&self, auth: &RequestAuth, user_id: i64, bucket: Bucket) -> Result<Vec<i64>> {
        self.record(format!("collection {user_id} {bucket}"));
        self.check_token(auth)?;
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(&bucket)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_to_collection(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        bucket: Bucket,
        series_id: i64,
    ) -> Result<()> {
        self.record(format!("add {user_id} {bucket} {series_id}"));
        self.check_token(auth)?;
        self.mutation_result()?;
        let mut collections = self.collections.lock().unwrap();
        let ids = collections.entry(bucket).or_default();
        if !ids.contains(&series_id) {
            ids.push(series_id);
        }
        Ok(())
    }

    async fn remove_from_collection(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        bucket: Bucket,
        series_id: i64,
    ) -> Result<()> {
        self.record(format!("remove {user_id} {bucket} {series_id}"));
        self.check_token(auth)?;
        self.mutation_result()?;
        if let Some(ids) = self.collections.lock().unwrap().get_mut(&bucket) {
            ids.retain(|id| *id != series_id);
        }
        Ok(())
    }

    async fn update_user(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        update: &UserUpdate,
    ) -> Result<Identity> {
        self.record(format!("update_user {user_id}"));
        let current = self.check_token(auth)?;
        self.mutation_result()?;
        self.user_updates.lock().unwrap().push(update.clone());
        let updated = Identity {
            username: update.username.clone(),
            email: update.email.clone(),
            birth_date: update.birth_date.clone(),
            avatar: update.avatar.clone(),
            ..current
        };
        *self.identity.lock().unwrap() = Some(updated.clone());
        Ok(updated)
    }

    async fn upload_avatar(&self, auth: &RequestAuth, upload: &AvatarUpload) -> Result<String> {
        self.record(format!("upload_avatar {}", upload.file_name));
        self.check_token(auth)?;
        self.mutation_result()?;
        Ok(format!("/uploads/avatars/{}", upload.file_name))
    }

    async fn create_series(&self, auth: &RequestAuth, draft: &SeriesDraft) -> Result<Series> {
        self.record(format!("create_series {}", draft.title));
        self.check_admin(auth)?;
        self.mutation_result()?;
        let mut series = self.series.lock().unwrap();
        let id = series.keys().max().copied().unwrap_or(0) + 1;
        let created = draft_to_series(id, draft);
        series.insert(id, created.clone());
        Ok(created)
    }

    async fn update_series(
        &self,
        auth: &RequestAuth,
        id: i64,
        draft: &SeriesDraft,
    ) -> Result<Series> {
        self.record(format!("update_series {id} {}", draft.title));
        self.check_admin(auth)?;
        self.mutation_result()?;
        let mut series = self.series.lock().unwrap();
        let slot = series
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("series {id}")))?;
        *slot = draft_to_series(id, draft);
        Ok(slot.clone())
    }

    async fn delete_series(&self, auth: &RequestAuth, id: i64) -> Result<()> {
        self.record(format!("delete_series {id}"));
        self.check_admin(auth)?;
        self.mutation_result()?;
        self.series
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(format!("series {id}")))
    }
}

fn draft_to_series(id: i64, draft: &SeriesDraft) -> Series {
    Series {
        id,
        title: draft.title.clone(),
        description: draft.description.clone(),
        release_year: draft.release_year,
        total_episodes: draft.total_episodes,
        episode_duration: draft.episode_duration,
        age_rating: draft.age_rating.clone(),
        rating: draft.rating,
        genres: draft.genres.clone(),
        poster_url: draft.poster_url.clone(),
        trailer_url: draft.trailer_url.clone(),
        status: draft.status,
        voice_tracks: draft.voice_tracks.clone(),
        production_countries: Vec::new(),
    }
}

pub fn anonymous_session(api: Arc<FakeApi>) -> Arc<Session> {
    Arc::new(Session::new(api, Arc::new(MemoryTokenStore::default())))
}

pub async fn signed_in_session(api: Arc<FakeApi>) -> Arc<Session> {
    let session = anonymous_session(api);
    session
        .login("ana", ANA_PASSWORD)
        .await
        .expect("ana can log in");
    session
}
