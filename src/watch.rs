//! Watch session: episode/season/voice-track selection, trailer preview and
//! periodic progress reporting for one opened series.

use crate::api::best_effort_list;
use crate::error::{ClientError, Result};
use crate::models::{Actor, Episode, Series, VoiceTrack, WatchProgress};
use crate::session::Session;
use crate::video::{playable_source, PlayableSource};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Where the UI should send the user from an error screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEscape {
    Home,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Loading,
    Ready,
    Switching,
    Error {
        message: String,
        escape: WatchEscape,
    },
}

/// Sends `progress` without waiting for the outcome. Anonymous sessions send nothing.
fn dispatch(session: &Session, progress: WatchProgress) {
    let auth = session.auth();
    if !auth.is_authenticated() {
        return;
    }
    let api = session.api();
    tokio::spawn(async move {
        if let Err(e) = api.update_watch_progress(&auth, &progress).await {
            warn!(
                "Failed to report watch progress for episode {}: {}",
                progress.episode_id, e
            );
        }
    });
}

/// Periodic task that forwards the latest unreported playback position.
pub struct ProgressReporter {
    session: Arc<Session>,
    pending: Arc<Mutex<Option<WatchProgress>>>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(session: Arc<Session>, every: Duration) -> Self {
        let every = if every.is_zero() {
            Duration::from_secs(1)
        } else {
            every
        };
        let pending: Arc<Mutex<Option<WatchProgress>>> = Arc::new(Mutex::new(None));
        let handle = tokio::spawn({
            let session = session.clone();
            let pending = pending.clone();
            async move {
                let mut ticker = tokio::time::interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let next = take(&pending);
                    if let Some(progress) = next {
                        debug!(
                            "Reporting episode {} at {}s",
                            progress.episode_id, progress.current_time
                        );
                        dispatch(&session, progress);
                    }
                }
            }
        });
        Self {
            session,
            pending,
            handle,
        }
    }

    /// Replaces the unreported position.
    pub fn record(&self, progress: WatchProgress) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(progress);
    }

    /// Sends the unreported position now instead of at the next tick.
    pub fn flush(&self) {
        if let Some(progress) = take(&self.pending) {
            dispatch(&self.session, progress);
        }
    }

    pub fn discard(&self) {
        take(&self.pending);
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn take(slot: &Mutex<Option<WatchProgress>>) -> Option<WatchProgress> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Publishes `Switching` for its lifetime and `Ready` once dropped, including
/// when the owning future is cancelled.
struct Transition<'a> {
    state: &'a watch::Sender<WatchState>,
}

impl<'a> Transition<'a> {
    fn begin(state: &'a watch::Sender<WatchState>) -> Self {
        state.send_replace(WatchState::Switching);
        Self { state }
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        self.state.send_replace(WatchState::Ready);
    }
}

/// Source for `episode` on `track`, falling back to the episode's own URL.
async fn resolve_source(
    session: &Session,
    episode: &Episode,
    track: VoiceTrack,
) -> Option<PlayableSource> {
    match session
        .api()
        .episode_video_url(&session.auth(), episode.id, track)
        .await
    {
        Ok(url) => Some(playable_source(&url)),
        Err(e) => {
            warn!(
                "Failed to fetch {} source for episode {}, using its stored URL: {}",
                track, episode.id, e
            );
            episode
                .video_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .map(playable_source)
        }
    }
}

pub struct WatchController {
    session: Arc<Session>,
    state: watch::Sender<WatchState>,
    series: Option<Series>,
    episodes: Vec<Episode>,
    actors: Vec<Actor>,
    selected: Option<usize>,
    season: i32,
    voice_track: VoiceTrack,
    trailer_preview: bool,
    trailer_source: Option<PlayableSource>,
    episode_source: Option<PlayableSource>,
    reporter: Option<ProgressReporter>,
    closed: bool,
}

impl WatchController {
    /// Loads the series with its episodes and cast. A failed series fetch
    /// yields a controller in [`WatchState::Error`]; episode and cast failures
    /// leave those lists empty.
    pub async fn open(session: Arc<Session>, series_id: i64, progress_every: Duration) -> Self {
        let (state, _) = watch::channel(WatchState::Loading);
        let mut controller = Self {
            session,
            state,
            series: None,
            episodes: Vec::new(),
            actors: Vec::new(),
            selected: None,
            season: 1,
            voice_track: VoiceTrack::default(),
            trailer_preview: true,
            trailer_source: None,
            episode_source: None,
            reporter: None,
            closed: false,
        };

        let api = controller.session.api();
        let auth = controller.session.auth();
        let (series, episodes, actors) = tokio::join!(
            api.series(&auth, series_id),
            best_effort_list("episodes", api.episodes(&auth, series_id)),
            best_effort_list("actors", api.actors(&auth, series_id)),
        );

        let series = match series {
            Ok(series) => series,
            Err(e) => {
                warn!("Failed to open series {}: {}", series_id, e);
                let message = match e {
                    ClientError::NotFound(_) => "Series not found".to_string(),
                    other => format!("Could not load series: {other}"),
                };
                controller.state.send_replace(WatchState::Error {
                    message,
                    escape: WatchEscape::Home,
                });
                return controller;
            }
        };

        let episode_source = match episodes.first() {
            Some(first) => resolve_source(&controller.session, first, controller.voice_track).await,
            None => None,
        };

        info!(
            "Opened '{}' with {} episodes and {} actors",
            series.title,
            episodes.len(),
            actors.len()
        );
        controller.trailer_source = series.trailer().map(playable_source);
        controller.season = episodes.first().map(Episode::season).unwrap_or(1);
        controller.selected = (!episodes.is_empty()).then_some(0);
        controller.episode_source = episode_source;
        controller.series = Some(series);
        controller.episodes = episodes;
        controller.actors = actors;
        controller.reporter = Some(ProgressReporter::spawn(
            controller.session.clone(),
            progress_every,
        ));
        controller.state.send_replace(WatchState::Ready);
        controller
    }

    pub fn state(&self) -> WatchState {
        self.state.borrow().clone()
    }

    /// Follows state changes, including the transient `Switching`.
    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.state.subscribe()
    }

    pub fn series(&self) -> Option<&Series> {
        self.series.as_ref()
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn selected_episode(&self) -> Option<&Episode> {
        self.selected.and_then(|i| self.episodes.get(i))
    }

    pub fn selected_season(&self) -> i32 {
        self.season
    }

    pub fn voice_track(&self) -> VoiceTrack {
        self.voice_track
    }

    pub fn is_playing_trailer(&self) -> bool {
        self.trailer_preview && self.trailer_source.is_some()
    }

    /// What the player should load right now.
    pub fn video(&self) -> Option<&PlayableSource> {
        if self.is_playing_trailer() {
            self.trailer_source.as_ref()
        } else {
            self.episode_source.as_ref()
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Distinct seasons, ascending; `[1]` when there are no episodes.
    pub fn unique_seasons(&self) -> Vec<i32> {
        let seasons: BTreeSet<i32> = self.episodes.iter().map(Episode::season).collect();
        if seasons.is_empty() {
            return vec![1];
        }
        seasons.into_iter().collect()
    }

    /// Episodes of `season` ordered by episode number.
    pub fn season_episodes(&self, season: i32) -> Vec<&Episode> {
        let mut list: Vec<&Episode> = self
            .episodes
            .iter()
            .filter(|e| e.season() == season)
            .collect();
        list.sort_by_key(|e| e.number());
        list
    }

    /// Switches to another episode, leaving trailer preview.
    pub async fn select_episode(&mut self, episode_id: i64) -> Result<()> {
        if !self.accepts_events() {
            return Ok(());
        }
        let index = self
            .episodes
            .iter()
            .position(|e| e.id == episode_id)
            .ok_or_else(|| ClientError::NotFound(format!("episode {episode_id}")))?;
        self.switch_to(index).await;
        Ok(())
    }

    /// Shows `season` and plays its first episode, if it has any.
    pub async fn select_season(&mut self, season: i32) -> Result<()> {
        if !self.accepts_events() {
            return Ok(());
        }
        self.season = season;
        let first = self.season_episodes(season).first().map(|e| e.id);
        let Some(first) = first else {
            debug!("Season {} has no episodes", season);
            return Ok(());
        };
        if let Some(index) = self.episodes.iter().position(|e| e.id == first) {
            self.switch_to(index).await;
        }
        Ok(())
    }

    pub async fn select_voice_track(&mut self, track: VoiceTrack) -> Result<()> {
        if !self.accepts_events() || track == self.voice_track {
            return Ok(());
        }
        let Some(episode) = self.selected_episode().cloned() else {
            self.voice_track = track;
            return Ok(());
        };
        let source = {
            let _switching = Transition::begin(&self.state);
            resolve_source(&self.session, &episode, track).await
        };
        self.voice_track = track;
        self.episode_source = source;
        info!("Switched episode {} to {}", episode.id, track);
        Ok(())
    }

    /// Returns to the trailer; false when the series has none.
    pub fn play_trailer(&mut self) -> bool {
        if !self.accepts_events() || self.trailer_source.is_none() {
            return false;
        }
        if let Some(reporter) = &self.reporter {
            reporter.flush();
        }
        self.trailer_preview = true;
        true
    }

    /// Records the player's position for the next progress report.
    pub fn on_time_update(&self, seconds: f64) {
        if self.closed || self.is_playing_trailer() || !self.session.is_authenticated() {
            return;
        }
        if let (Some(reporter), Some(episode)) = (&self.reporter, self.selected_episode()) {
            reporter.record(WatchProgress::position(episode.id, seconds));
        }
    }

    /// Marks the episode completed and moves to the next one in its season.
    pub async fn on_ended(&mut self) -> Result<()> {
        if !self.accepts_events() || self.is_playing_trailer() {
            return Ok(());
        }
        let Some(current) = self.selected_episode().cloned() else {
            return Ok(());
        };
        if let Some(reporter) = &self.reporter {
            reporter.discard();
        }
        dispatch(&self.session, WatchProgress::completed(current.id));

        let next = {
            let order = self.season_episodes(current.season());
            order
                .iter()
                .position(|e| e.id == current.id)
                .and_then(|i| order.get(i + 1))
                .map(|e| e.id)
        };
        match next.and_then(|id| self.episodes.iter().position(|e| e.id == id)) {
            Some(index) => self.switch_to(index).await,
            None => debug!("Episode {} is the last of its season", current.id),
        }
        Ok(())
    }

    /// Stops progress reporting; later events are ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.reporter = None;
        if let Some(series) = &self.series {
            debug!("Closed watch session for '{}'", series.title);
        }
    }

    fn accepts_events(&self) -> bool {
        !self.closed && self.series.is_some()
    }

    /// Selects the episode at `index`, leaving trailer preview.
    async fn switch_to(&mut self, index: usize) {
        let Some(episode) = self.episodes.get(index).cloned() else {
            return;
        };
        if let Some(reporter) = &self.reporter {
            reporter.flush();
        }
        let source = {
            let _switching = Transition::begin(&self.state);
            resolve_source(&self.session, &episode, self.voice_track).await
        };
        self.selected = Some(index);
        self.season = episode.season();
        self.episode_source = source;
        self.trailer_preview = false;
        info!("Now playing {}", episode.label());
    }
}

impl Drop for WatchController {
    fn drop(&mut self) {
        self.close();
    }
}
