use crate::error::Result;
use crate::models::{Page, Series};
use crate::session::Session;
use std::sync::Arc;
use tracing::{debug, info};

/// Facet values offered by the browse screen.
pub const GENRES: [&str; 8] = [
    "Action",
    "Adventure",
    "Comedy",
    "Drama",
    "Fantasy",
    "Horror",
    "Romance",
    "Sci-Fi",
];
pub const STATUSES: [&str; 3] = ["Ongoing", "Completed", "Upcoming"];
pub const VOICE_TRACKS: [&str; 4] = ["Subbed", "Dubbed", "Raw", "None"];

/// Client-side facets; blank values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilters {
    pub genre: Option<String>,
    pub year: Option<String>,
    pub status: Option<String>,
    pub voice_track: Option<String>,
    pub title_query: Option<String>,
}

impl CatalogFilters {
    pub fn is_empty(&self) -> bool {
        [
            &self.genre,
            &self.year,
            &self.status,
            &self.voice_track,
            &self.title_query,
        ]
        .into_iter()
        .all(|f| active(f).is_none())
    }

    pub fn matches(&self, series: &Series) -> bool {
        if let Some(genre) = active(&self.genre) {
            let genre = genre.to_lowercase();
            if !series.genres.iter().any(|g| g.to_lowercase() == genre) {
                return false;
            }
        }
        if let Some(year) = active(&self.year) {
            if series.release_year.map(|y| y.to_string()).as_deref() != Some(year) {
                return false;
            }
        }
        if let Some(status) = active(&self.status) {
            if series.status.as_str().to_lowercase() != status.to_lowercase() {
                return false;
            }
        }
        if let Some(track) = active(&self.voice_track) {
            let needle = track.to_lowercase();
            if !series
                .voice_tracks
                .iter()
                .any(|t| t.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        if let Some(query) = active(&self.title_query) {
            if !series.title.to_lowercase().contains(&query.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

fn active(filter: &Option<String>) -> Option<&str> {
    filter.as_deref().map(str::trim).filter(|f| !f.is_empty())
}

/// Keeps the items passing every active filter, in their original order.
pub fn apply_local_filters(items: &[Series], filters: &CatalogFilters) -> Vec<Series> {
    if filters.is_empty() {
        return items.to_vec();
    }
    let kept: Vec<Series> = items
        .iter()
        .filter(|s| filters.matches(s))
        .cloned()
        .collect();
    debug!("Local filters kept {} of {} series", kept.len(), items.len());
    kept
}

pub struct Catalog {
    session: Arc<Session>,
}

impl Catalog {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub async fn load_catalog(&self, page: u32, page_size: u32) -> Result<Page<Series>> {
        let result = self
            .session
            .api()
            .list_series(&self.session.auth(), page, page_size)
            .await?;
        info!(
            "Loaded catalog page {} ({} of {} series)",
            page,
            result.content.len(),
            result.total_elements
        );
        Ok(result)
    }

    /// Server-side title search; a blank query lists the catalog instead.
    pub async fn search(&self, query: &str, page: u32, page_size: u32) -> Result<Page<Series>> {
        let query = query.trim();
        if query.is_empty() {
            return self.load_catalog(page, page_size).await;
        }
        let result = self
            .session
            .api()
            .search_series(&self.session.auth(), query, page, page_size)
            .await?;
        info!("Search '{}' matched {} series", query, result.total_elements);
        Ok(result)
    }

    /// Highest-rated series, the landing page's batch.
    pub async fn load_popular(&self, size: u32) -> Result<Vec<Series>> {
        self.session
            .api()
            .popular_series(&self.session.auth(), size)
            .await
    }

    pub async fn by_genre(&self, genre: &str, page: u32, page_size: u32) -> Result<Page<Series>> {
        self.session
            .api()
            .series_by_genre(&self.session.auth(), genre.trim(), page, page_size)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeriesStatus;

    fn series(id: i64, title: &str, genres: &[&str], year: i32, status: SeriesStatus) -> Series {
        Series {
            id,
            title: title.to_string(),
            description: None,
            release_year: Some(year),
            total_episodes: None,
            episode_duration: None,
            age_rating: None,
            rating: None,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            poster_url: None,
            trailer_url: None,
            status,
            voice_tracks: vec!["Subbed".to_string()],
            production_countries: Vec::new(),
        }
    }

    fn batch() -> Vec<Series> {
        vec![
            series(1, "Love Destiny", &["Romance", "Fantasy"], 2018, SeriesStatus::Completed),
            series(2, "The Gifted", &["Drama", "Sci-Fi"], 2018, SeriesStatus::Completed),
            series(3, "Destiny Rising", &["romance"], 2024, SeriesStatus::Ongoing),
            series(4, "Untitled", &[], 2025, SeriesStatus::Upcoming),
        ]
    }

    fn ids(items: &[Series]) -> Vec<i64> {
        items.iter().map(|s| s.id).collect()
    }

    #[test]
    fn empty_filters_are_identity() {
        let items = batch();
        let blank = CatalogFilters {
            genre: Some("  ".to_string()),
            ..CatalogFilters::default()
        };
        assert!(blank.is_empty());
        assert_eq!(apply_local_filters(&items, &CatalogFilters::default()), items);
        assert_eq!(apply_local_filters(&items, &blank), items);
    }

    #[test]
    fn genre_filter_is_case_insensitive_membership() {
        let items = batch();
        let filters = CatalogFilters {
            genre: Some("ROMANCE".to_string()),
            ..CatalogFilters::default()
        };
        let kept = apply_local_filters(&items, &filters);
        assert_eq!(ids(&kept), vec![1, 3]);
        for item in &items {
            let member = item.genres.iter().any(|g| g.eq_ignore_ascii_case("romance"));
            assert_eq!(kept.iter().any(|k| k.id == item.id), member);
        }
    }

    #[test]
    fn genre_filter_folds_cyrillic_case() {
        let mut items = batch();
        items[1].genres = vec!["Драма".to_string()];
        let filters = CatalogFilters {
            genre: Some("драма".to_string()),
            ..CatalogFilters::default()
        };
        assert_eq!(ids(&apply_local_filters(&items, &filters)), vec![2]);

        let shouting = CatalogFilters {
            genre: Some("ДРАМА".to_string()),
            ..CatalogFilters::default()
        };
        assert_eq!(ids(&apply_local_filters(&items, &shouting)), vec![2]);
    }

    #[test]
    fn combined_filters_must_all_match_and_keep_order() {
        let items = batch();
        let filters = CatalogFilters {
            year: Some("2018".to_string()),
            status: Some("completed".to_string()),
            title_query: Some("the".to_string()),
            ..CatalogFilters::default()
        };
        assert_eq!(ids(&apply_local_filters(&items, &filters)), vec![2]);

        let by_year = CatalogFilters {
            year: Some("2018".to_string()),
            ..CatalogFilters::default()
        };
        assert_eq!(ids(&apply_local_filters(&items, &by_year)), vec![1, 2]);
    }

    #[test]
    fn voice_track_uses_substring_match() {
        let mut items = batch();
        items[1].voice_tracks = vec!["Dubbed (TH)".to_string()];
        let filters = CatalogFilters {
            voice_track: Some("dub".to_string()),
            ..CatalogFilters::default()
        };
        assert_eq!(ids(&apply_local_filters(&items, &filters)), vec![2]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let items = batch();
        let filters = CatalogFilters {
            title_query: Some("destiny".to_string()),
            ..CatalogFilters::default()
        };
        let once = apply_local_filters(&items, &filters);
        let twice = apply_local_filters(&once, &filters);
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec![1, 3]);
    }
}
