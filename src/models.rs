use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Accepts `null` wherever the backend may omit a list or flag.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_voice_tracks() -> Vec<String> {
    vec!["subbed".to_string(), "dubbed".to_string()]
}

/// A multi-episode show ("lacorn"), the catalog's browsable unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    pub description: Option<String>,
    pub release_year: Option<i32>,
    pub total_episodes: Option<i32>,
    /// Minutes.
    pub episode_duration: Option<i32>,
    pub age_rating: Option<String>,
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<String>,
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub status: SeriesStatus,
    #[serde(
        default,
        rename = "availableVoiceovers",
        deserialize_with = "nullable"
    )]
    pub voice_tracks: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub production_countries: Vec<String>,
}

impl Series {
    /// Trailer URL, ignoring blank values the admin form leaves behind.
    pub fn trailer(&self) -> Option<&str> {
        self.trailer_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SeriesStatus {
    #[default]
    Ongoing,
    Completed,
    Upcoming,
}

impl SeriesStatus {
    pub const ALL: [SeriesStatus; 3] = [Self::Ongoing, Self::Completed, Self::Upcoming];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "Ongoing",
            Self::Completed => "Completed",
            Self::Upcoming => "Upcoming",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(input.trim()))
    }
}

impl fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SeriesStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str().to_ascii_uppercase())
    }
}

impl<'de> Deserialize<'de> for SeriesStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // The backend reports a missing status as ONGOING; do the same for unknown names.
        Ok(Self::parse(&raw).unwrap_or_default())
    }
}

/// Audio/subtitle variant requested for an episode source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VoiceTrack {
    #[default]
    Subbed,
    Dubbed,
    Raw,
}

impl VoiceTrack {
    pub const ALL: [VoiceTrack; 3] = [Self::Subbed, Self::Dubbed, Self::Raw];

    /// Value of the `voicecover` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::Subbed => "subbed",
            Self::Dubbed => "dubbed",
            Self::Raw => "raw",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_query().eq_ignore_ascii_case(input.trim()))
    }
}

impl fmt::Display for VoiceTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub description: Option<String>,
    /// Minutes.
    pub duration: Option<i32>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub watched: bool,
    /// Last reported position in seconds, present for authenticated reads.
    pub current_time: Option<i64>,
    #[serde(rename = "availableVoiceovers", default = "default_voice_tracks")]
    pub voice_tracks: Vec<String>,
}

impl Episode {
    pub fn season(&self) -> i32 {
        self.season_number.unwrap_or(1)
    }

    pub fn number(&self) -> i32 {
        self.episode_number.unwrap_or(0)
    }

    /// "1x03 - Title"
    pub fn label(&self) -> String {
        format!(
            "{}x{:02} - {}",
            self.season(),
            self.number(),
            self.title
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Award {
    pub year: Option<i32>,
    pub title: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    pub photo_url: Option<String>,
    pub nationality: Option<String>,
    pub birth_date: Option<String>,
    pub biography: Option<String>,
    pub character: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub awards: Vec<Award>,
    #[serde(default, deserialize_with = "nullable")]
    pub social_links: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        })
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim().to_ascii_uppercase();
        Ok(match raw.strip_prefix("ROLE_").unwrap_or(&raw) {
            "ADMIN" => Role::Admin,
            _ => Role::User,
        })
    }
}

/// The signed-in user as the server knows it. Never carries the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: i64,
    pub username: String,
    #[serde(default, deserialize_with = "nullable")]
    pub email: String,
    /// `yyyy-mm-dd`
    pub birth_date: Option<String>,
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// One of the four fixed per-user collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Favourites,
    WatchLater,
    Started,
    Forsaken,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Self::Favourites,
        Self::WatchLater,
        Self::Started,
        Self::Forsaken,
    ];

    /// Collection name as stored server-side.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Favourites => "Favourites",
            Self::WatchLater => "Watch later",
            Self::Started => "Started",
            Self::Forsaken => "Forsaken",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "favourites" | "favorites" => Some(Self::Favourites),
            "watchlater" => Some(Self::WatchLater),
            "started" => Some(Self::Started),
            "forsaken" => Some(Self::Forsaken),
            _ => None,
        }
    }

    pub(crate) fn path_segment(&self) -> String {
        urlencoding::encode(self.wire_name()).into_owned()
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDto {
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub series_ids: Vec<i64>,
}

impl CollectionDto {
    pub fn bucket(&self) -> Option<Bucket> {
        Bucket::from_wire(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WatchProgress {
    pub episode_id: i64,
    /// Seconds.
    pub current_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl WatchProgress {
    pub fn position(episode_id: i64, seconds: f64) -> Self {
        Self {
            episode_id,
            current_time: seconds.max(0.0).floor() as i64,
            completed: None,
        }
    }

    pub fn completed(episode_id: i64) -> Self {
        Self {
            episode_id,
            current_time: 0,
            completed: Some(true),
        }
    }
}

/// Paged envelope returned by the catalog endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

impl<T> Page<T> {
    /// Wraps a bare list as a single page.
    pub fn single(content: Vec<T>) -> Self {
        let len = content.len();
        Self {
            content,
            total_elements: len as u64,
            total_pages: u32::from(len > 0),
            number: 0,
            size: len as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    /// `dd.mm.yyyy`, the format the register endpoint parses.
    pub birth_date: String,
    pub password: String,
}

/// Full replacement body for `PUT /users/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    pub birth_date: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Body of `POST /lacorns` and `PUT /lacorns/{id}`. The server assigns the id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_episodes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailer_url: Option<String>,
    #[serde(default)]
    pub status: SeriesStatus,
    #[serde(default, rename = "availableVoiceovers")]
    pub voice_tracks: Vec<String>,
}

impl From<&Series> for SeriesDraft {
    fn from(series: &Series) -> Self {
        Self {
            title: series.title.clone(),
            description: series.description.clone(),
            release_year: series.release_year,
            total_episodes: series.total_episodes,
            episode_duration: series.episode_duration,
            age_rating: series.age_rating.clone(),
            rating: series.rating,
            genres: series.genres.clone(),
            poster_url: series.poster_url.clone(),
            trailer_url: series.trailer_url.clone(),
            status: series.status,
            voice_tracks: series.voice_tracks.clone(),
        }
    }
}
