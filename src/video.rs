//! Classifies raw video URLs and rewrites third-party watch pages to embeddable players.

use url::Url;

const DIRECT_EXTENSIONS: [&str; 7] = [".mp4", ".m4v", ".webm", ".mov", ".ogv", ".ogg", ".m3u8"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedProvider {
    YouTube,
    Vimeo,
}

impl EmbedProvider {
    fn from_host(host: &str) -> Option<Self> {
        let host = host.trim_start_matches("www.").trim_start_matches("m.");
        if host == "youtu.be"
            || host == "youtube.com"
            || host.ends_with(".youtube.com")
            || host == "youtube-nocookie.com"
        {
            Some(Self::YouTube)
        } else if host == "vimeo.com" || host.ends_with(".vimeo.com") {
            Some(Self::Vimeo)
        } else {
            None
        }
    }

    /// Canonical video id per the provider's URL grammar.
    pub fn video_id(&self, url: &Url) -> Option<String> {
        match self {
            Self::YouTube => youtube_id(url),
            Self::Vimeo => vimeo_id(url),
        }
    }

    pub fn embed_url(&self, id: &str) -> String {
        match self {
            Self::YouTube => {
                format!("https://www.youtube.com/embed/{id}?autoplay=1&rel=0&modestbranding=1")
            }
            Self::Vimeo => format!("https://player.vimeo.com/video/{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    EmbeddableProvider(EmbedProvider),
    DirectFile,
    Unknown,
}

/// A URL ready to hand to a player, with the kind of player it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableSource {
    pub url: String,
    pub kind: VideoKind,
}

impl PlayableSource {
    /// Embedded third-party players need an iframe rather than a media element.
    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, VideoKind::EmbeddableProvider(_))
    }
}

pub fn classify(raw: &str) -> VideoKind {
    let raw = raw.trim();
    if raw.is_empty() {
        return VideoKind::Unknown;
    }
    if let Some(provider) = parse_lenient(raw)
        .as_ref()
        .and_then(Url::host_str)
        .and_then(EmbedProvider::from_host)
    {
        return VideoKind::EmbeddableProvider(provider);
    }
    let path = raw
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if DIRECT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) || raw.contains("video/mp4") {
        return VideoKind::DirectFile;
    }
    VideoKind::Unknown
}

/// Maps a raw source to what the player should load. Embeddable URLs whose
/// id cannot be extracted are passed through unchanged.
pub fn playable_source(raw: &str) -> PlayableSource {
    let raw = raw.trim();
    let kind = classify(raw);
    let url = match kind {
        VideoKind::EmbeddableProvider(provider) => parse_lenient(raw)
            .and_then(|u| provider.video_id(&u))
            .map(|id| provider.embed_url(&id))
            .unwrap_or_else(|| raw.to_string()),
        VideoKind::DirectFile | VideoKind::Unknown => raw.to_string(),
    };
    PlayableSource { url, kind }
}

/// Parses absolute URLs, and scheme-less ones like `youtu.be/abc`.
fn parse_lenient(raw: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(raw) {
        return matches!(url.scheme(), "http" | "https").then_some(url);
    }
    if raw.starts_with('/') || raw.starts_with('.') {
        return None;
    }
    Url::parse(&format!("https://{raw}"))
        .ok()
        .filter(|u| u.host_str().is_some_and(|h| h.contains('.')))
}

fn is_youtube_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn youtube_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_start_matches("www.");
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("embed" | "v" | "e" | "shorts" | "live") => segments.next().map(str::to_string),
            _ => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
        }
    }?;
    is_youtube_id(&candidate).then_some(candidate)
}

fn vimeo_id(url: &Url) -> Option<String> {
    url.path_segments()?
        .find(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}
