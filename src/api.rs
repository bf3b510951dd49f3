//! Resource access layer: one method per backend operation, no caching, no retries.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{
    Actor, AuthToken, AvatarUpload, Award, Bucket, CollectionDto, Episode, Identity, LoginRequest,
    Page, RegisterRequest, Series, SeriesDraft, UserUpdate, VoiceTrack, WatchProgress,
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Credentials attached to a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAuth {
    pub token: Option<String>,
    pub user_id: Option<i64>,
}

impl RequestAuth {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            user_id: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user_id.is_some()
    }
}

#[async_trait]
pub trait LacornApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<AuthToken>;
    async fn register(&self, request: &RegisterRequest) -> Result<Identity>;
    async fn current_user(&self, auth: &RequestAuth) -> Result<Identity>;

    async fn list_series(&self, auth: &RequestAuth, page: u32, size: u32) -> Result<Page<Series>>;
    async fn search_series(
        &self,
        auth: &RequestAuth,
        query: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<Series>>;
    async fn popular_series(&self, auth: &RequestAuth, size: u32) -> Result<Vec<Series>>;
    async fn series_by_genre(
        &self,
        auth: &RequestAuth,
        genre: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<Series>>;
    async fn series(&self, auth: &RequestAuth, id: i64) -> Result<Series>;
    async fn episodes(&self, auth: &RequestAuth, series_id: i64) -> Result<Vec<Episode>>;
    async fn actors(&self, auth: &RequestAuth, series_id: i64) -> Result<Vec<Actor>>;
    async fn actor(&self, auth: &RequestAuth, id: i64) -> Result<Actor>;
    async fn actor_awards(&self, auth: &RequestAuth, actor_id: i64) -> Result<Vec<Award>>;
    async fn popular_actors(&self, auth: &RequestAuth, page: u32, size: u32) -> Result<Vec<Actor>>;
    async fn search_actors(&self, auth: &RequestAuth, query: &str) -> Result<Vec<Actor>>;
    async fn episode_video_url(
        &self,
        auth: &RequestAuth,
        episode_id: i64,
        track: VoiceTrack,
    ) -> Result<String>;
    async fn update_watch_progress(
        &self,
        auth: &RequestAuth,
        progress: &WatchProgress,
    ) -> Result<()>;

    async fn collections(&self, auth: &RequestAuth, user_id: i64) -> Result<Vec<CollectionDto>>;
    /// Series ids currently in `bucket`.
    async fn collection(&self, auth: &RequestAuth, user_id: i64, bucket: Bucket)
        -> Result<Vec<i64>>;
    async fn add_to_collection(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        bucket: Bucket,
        series_id: i64,
    ) -> Result<()>;
    async fn remove_from_collection(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        bucket: Bucket,
        series_id: i64,
    ) -> Result<()>;

    async fn update_user(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        update: &UserUpdate,
    ) -> Result<Identity>;
    /// Returns the stored avatar URL.
    async fn upload_avatar(&self, auth: &RequestAuth, upload: &AvatarUpload) -> Result<String>;

    // Admin role only; the server answers 403 to anyone else.
    async fn create_series(&self, auth: &RequestAuth, draft: &SeriesDraft) -> Result<Series>;
    async fn update_series(&self, auth: &RequestAuth, id: i64, draft: &SeriesDraft)
        -> Result<Series>;
    async fn delete_series(&self, auth: &RequestAuth, id: i64) -> Result<()>;
}

/// Awaits a secondary list fetch, degrading to an empty list on failure.
pub async fn best_effort_list<T, F>(what: &str, fut: F) -> Vec<T>
where
    F: Future<Output = Result<Vec<T>>>,
{
    match fut.await {
        Ok(items) => items,
        Err(e) => {
            warn!("Failed to load {} (continuing without): {}", what, e);
            Vec::new()
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpLacornApi {
    client: Client,
    base: String,
}

impl HttpLacornApi {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        let user_agent = format!("siamlacorns/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()
            .context("Failed to build SiamLacorns HTTP client")?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        Self::new(&config.api_base)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        auth: &RequestAuth,
        personalized: bool,
    ) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        debug!("{} {}", method, url);
        let mut builder = self.client.request(method, url);
        if let Some(token) = &auth.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if personalized {
            if let Some(user_id) = auth.user_id {
                builder = builder.header(USER_ID_HEADER, user_id.to_string());
            }
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let res = builder.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        Err(status_error(status, what, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let res = self.send(builder, what).await?;
        let text = res
            .text()
            .await
            .map_err(|e| ClientError::fetch(None, format!("reading {what} failed: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|e| ClientError::fetch(None, format!("{what}: JSON parse failed: {e}")))
    }

    async fn send_empty(&self, builder: RequestBuilder, what: &str) -> Result<()> {
        self.send(builder, what).await.map(|_| ())
    }

    async fn get_page(&self, path: String, auth: &RequestAuth, what: &str) -> Result<Page<Series>> {
        let body: PageBody<Series> = self
            .send_json(self.request(Method::GET, &path, auth, true), what)
            .await?;
        Ok(body.into_page())
    }
}

fn status_error(status: StatusCode, what: &str, body: &str) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized,
        StatusCode::NOT_FOUND => ClientError::NotFound(what.to_string()),
        _ => {
            let message = server_message(body).unwrap_or_else(|| format!("{what} failed"));
            ClientError::fetch(Some(status.as_u16()), message)
        }
    }
}

/// Pulls `message` out of a JSON error body, or uses a short plain-text body as-is.
fn server_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message.or(parsed.error),
        Err(_) if body.len() <= 200 && !body.starts_with('<') => Some(body.to_string()),
        Err(_) => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageBody<T> {
    Page(Page<T>),
    List(Vec<T>),
}

impl<T> PageBody<T> {
    fn into_page(self) -> Page<T> {
        match self {
            PageBody::Page(page) => page,
            PageBody::List(items) => Page::single(items),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CollectionBody {
    Collection(CollectionDto),
    Ids(Vec<i64>),
}

/// The video endpoint answers with either a bare string or a JSON string.
fn parse_video_body(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct UrlBody {
        url: String,
    }

    let body = body.trim();
    let url = serde_json::from_str::<String>(body)
        .or_else(|_| serde_json::from_str::<UrlBody>(body).map(|b| b.url))
        .unwrap_or_else(|_| body.to_string());
    let url = url.trim().to_string();
    (!url.is_empty()).then_some(url)
}

#[async_trait]
impl LacornApi for HttpLacornApi {
    async fn login(&self, username: &str, password: &str) -> Result<AuthToken> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let builder = self
            .request(Method::POST, "/auth/login", &RequestAuth::anonymous(), false)
            .json(&body);
        match self.send_json(builder, "login").await {
            Ok(token) => Ok(token),
            Err(ClientError::Unauthorized)
            | Err(ClientError::FetchFailed {
                status: Some(400), ..
            }) => Err(ClientError::InvalidCredentials),
            Err(e) => Err(e),
        }
    }

    async fn register(&self, request: &RegisterRequest) -> Result<Identity> {
        let builder = self
            .request(Method::POST, "/users/register", &RequestAuth::anonymous(), false)
            .json(request);
        self.send_json(builder, "registration").await
    }

    async fn current_user(&self, auth: &RequestAuth) -> Result<Identity> {
        if auth.token.is_none() {
            return Err(ClientError::Unauthorized);
        }
        self.send_json(self.request(Method::GET, "/users/me", auth, false), "current user")
            .await
    }

    async fn list_series(&self, auth: &RequestAuth, page: u32, size: u32) -> Result<Page<Series>> {
        self.get_page(format!("/lacorns?page={page}&size={size}"), auth, "catalog page")
            .await
    }

    async fn search_series(
        &self,
        auth: &RequestAuth,
        query: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<Series>> {
        let path = format!(
            "/lacorns/search?query={}&page={page}&size={size}",
            urlencoding::encode(query)
        );
        self.get_page(path, auth, "catalog search").await
    }

    async fn popular_series(&self, auth: &RequestAuth, size: u32) -> Result<Vec<Series>> {
        let path = format!("/lacorns/sorted/rating?size={size}");
        let body: PageBody<Series> = self
            .send_json(self.request(Method::GET, &path, auth, true), "popular series")
            .await?;
        Ok(body.into_page().content)
    }

    async fn series_by_genre(
        &self,
        auth: &RequestAuth,
        genre: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<Series>> {
        let path = format!(
            "/lacorns/genre/{}?page={page}&size={size}",
            urlencoding::encode(genre)
        );
        self.get_page(path, auth, "genre listing").await
    }

    async fn series(&self, auth: &RequestAuth, id: i64) -> Result<Series> {
        let path = format!("/lacorns/{id}");
        self.send_json(
            self.request(Method::GET, &path, auth, true),
            &format!("series {id}"),
        )
        .await
    }

    async fn episodes(&self, auth: &RequestAuth, series_id: i64) -> Result<Vec<Episode>> {
        let path = format!("/lacorns/{series_id}/episodes");
        self.send_json(
            self.request(Method::GET, &path, auth, true),
            &format!("episodes of series {series_id}"),
        )
        .await
    }

    async fn actors(&self, auth: &RequestAuth, series_id: i64) -> Result<Vec<Actor>> {
        let path = format!("/lacorns/{series_id}/actors");
        self.send_json(
            self.request(Method::GET, &path, auth, false),
            &format!("actors of series {series_id}"),
        )
        .await
    }

    async fn actor(&self, auth: &RequestAuth, id: i64) -> Result<Actor> {
        let path = format!("/actors/{id}");
        self.send_json(
            self.request(Method::GET, &path, auth, false),
            &format!("actor {id}"),
        )
        .await
    }

    async fn actor_awards(&self, auth: &RequestAuth, actor_id: i64) -> Result<Vec<Award>> {
        let path = format!("/actors/{actor_id}/awards");
        self.send_json(
            self.request(Method::GET, &path, auth, false),
            &format!("awards of actor {actor_id}"),
        )
        .await
    }

    async fn popular_actors(&self, auth: &RequestAuth, page: u32, size: u32) -> Result<Vec<Actor>> {
        let path = format!("/actors/popular?page={page}&size={size}");
        let body: PageBody<Actor> = self
            .send_json(self.request(Method::GET, &path, auth, false), "popular actors")
            .await?;
        Ok(body.into_page().content)
    }

    async fn search_actors(&self, auth: &RequestAuth, query: &str) -> Result<Vec<Actor>> {
        let path = format!("/actors/search?q={}", urlencoding::encode(query));
        let body: PageBody<Actor> = self
            .send_json(self.request(Method::GET, &path, auth, false), "actor search")
            .await?;
        Ok(body.into_page().content)
    }

    async fn episode_video_url(
        &self,
        auth: &RequestAuth,
        episode_id: i64,
        track: VoiceTrack,
    ) -> Result<String> {
        let path = format!(
            "/lacorns/episodes/{episode_id}/video?voicecover={}",
            track.as_query()
        );
        let what = format!("video of episode {episode_id}");
        let res = self
            .send(self.request(Method::GET, &path, auth, false), &what)
            .await?;
        let body = res
            .text()
            .await
            .map_err(|e| ClientError::fetch(None, format!("reading {what} failed: {e}")))?;
        parse_video_body(&body).ok_or_else(|| ClientError::NotFound(what))
    }

    async fn update_watch_progress(
        &self,
        auth: &RequestAuth,
        progress: &WatchProgress,
    ) -> Result<()> {
        let builder = self
            .request(Method::POST, "/lacorns/watch", auth, false)
            .json(progress);
        self.send_empty(builder, "watch progress").await
    }

    async fn collections(&self, auth: &RequestAuth, user_id: i64) -> Result<Vec<CollectionDto>> {
        let path = format!("/users/{user_id}/collections");
        self.send_json(self.request(Method::GET, &path, auth, false), "collections")
            .await
    }

    async fn collection(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        bucket: Bucket,
    ) -> Result<Vec<i64>> {
        let path = format!("/users/{user_id}/collections/{}", bucket.path_segment());
        let body: CollectionBody = self
            .send_json(
                self.request(Method::GET, &path, auth, false),
                &format!("collection {bucket}"),
            )
            .await?;
        Ok(match body {
            CollectionBody::Collection(c) => c.series_ids,
            CollectionBody::Ids(ids) => ids,
        })
    }

    async fn add_to_collection(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        bucket: Bucket,
        series_id: i64,
    ) -> Result<()> {
        let path = format!(
            "/users/{user_id}/collections/{}/series/{series_id}",
            bucket.path_segment()
        );
        self.send_empty(
            self.request(Method::POST, &path, auth, false),
            &format!("adding series {series_id} to {bucket}"),
        )
        .await
    }

    async fn remove_from_collection(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        bucket: Bucket,
        series_id: i64,
    ) -> Result<()> {
        let path = format!(
            "/users/{user_id}/collections/{}/series/{series_id}",
            bucket.path_segment()
        );
        self.send_empty(
            self.request(Method::DELETE, &path, auth, false),
            &format!("removing series {series_id} from {bucket}"),
        )
        .await
    }

    async fn update_user(
        &self,
        auth: &RequestAuth,
        user_id: i64,
        update: &UserUpdate,
    ) -> Result<Identity> {
        let path = format!("/users/{user_id}");
        let builder = self.request(Method::PUT, &path, auth, false).json(update);
        self.send_json(builder, "profile update").await
    }

    async fn upload_avatar(&self, auth: &RequestAuth, upload: &AvatarUpload) -> Result<String> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct AvatarResponse {
            avatar_url: Option<String>,
        }

        let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| ClientError::ValidationFailed(format!("bad content type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let builder = self
            .request(Method::POST, "/users/avatar", auth, false)
            .multipart(form);
        let res: AvatarResponse = self.send_json(builder, "avatar upload").await?;
        res.avatar_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ClientError::fetch(None, "avatar upload returned no URL"))
    }

    async fn create_series(&self, auth: &RequestAuth, draft: &SeriesDraft) -> Result<Series> {
        let builder = self.request(Method::POST, "/lacorns", auth, false).json(draft);
        self.send_json(builder, "series creation").await
    }

    async fn update_series(
        &self,
        auth: &RequestAuth,
        id: i64,
        draft: &SeriesDraft,
    ) -> Result<Series> {
        let path = format!("/lacorns/{id}");
        let builder = self.request(Method::PUT, &path, auth, false).json(draft);
        self.send_json(builder, &format!("series {id}")).await
    }

    async fn delete_series(&self, auth: &RequestAuth, id: i64) -> Result<()> {
        let path = format!("/lacorns/{id}");
        self.send_empty(
            self.request(Method::DELETE, &path, auth, false),
            &format!("series {id}"),
        )
        .await
    }
}
